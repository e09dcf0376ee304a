//! Remote-control session: the protocol state machine run by the session
//! thread.
//!
//! # States
//!
//! ```text
//!            ┌────────────── connection accepted ──────────────┐
//!            │                                                 ▼
//!      ┌───────────┐                                   ┌─────────────────┐
//!      │ Listening │ ◀──── Disconnected ◀── failure ── │ AwaitingCommand │ ◀─┐
//!      └───────────┘                                   └─────────────────┘   │
//!                                                        │ command           │ done
//!                                                        ▼                   │
//!                                                   ┌──────────────────┐     │
//!                                                   │ Handling(cmd)    │ ────┘
//!                                                   └──────────────────┘
//! ```
//!
//! Any channel or protocol failure drops the client and goes back to
//! listening. Only a quit request stops the loop; it is observed between
//! steps, so an in-flight transfer always completes first and the exit
//! latency is bounded by the poll timeout.

use crate::camera::{CAMERA_STATE_SIZE, CameraState};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::handoff::ExportHandoff;
use crate::protocol::Command;
use crate::scene::ExportKind;
use crate::transport::{CommandChannel, ServerSocket};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Counters kept by the session thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Client connections accepted
    pub connections: u64,
    /// Commands received and handled
    pub commands: u64,
    /// Camera states received
    pub camera_updates: u64,
    /// Scene exports sent to clients
    pub exports: u64,
}

/// Protocol state of the session thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No client; polling the listener
    Listening,
    /// Client connected and idle
    AwaitingCommand,
    /// Serving one command
    Handling(Command),
    /// Client dropped after a failure
    Disconnected,
}

/// Latest camera state plus its unread flag
#[derive(Debug, Default)]
struct CameraSlot {
    state: CameraState,
    unread: bool,
}

/// State shared between the session thread and the owner thread
#[derive(Debug, Default)]
pub(crate) struct SessionShared {
    camera: Mutex<CameraSlot>,
    quit: AtomicBool,
    server_open: AtomicBool,
    client_connected: AtomicBool,
    stats: Mutex<SessionStats>,
    pub(crate) handoff: ExportHandoff,
}

impl SessionShared {
    /// Set the quit flag and release a session blocked on an export.
    pub(crate) fn request_quit(&self) {
        if !self.quit.swap(true, Ordering::SeqCst) {
            info!("Remote-control quit requested");
        }
        self.handoff.close();
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    pub(crate) fn server_open(&self) -> bool {
        self.server_open.load(Ordering::SeqCst)
    }

    pub(crate) fn client_connected(&self) -> bool {
        self.client_connected.load(Ordering::SeqCst)
    }

    /// Replace the latest camera state (last write wins).
    pub(crate) fn store_camera(&self, state: CameraState) {
        let mut slot = self.camera.lock();
        slot.state = state;
        slot.unread = true;
    }

    /// Latest camera state; clears the unread flag in the same critical section.
    pub(crate) fn take_camera(&self) -> CameraState {
        let mut slot = self.camera.lock();
        slot.unread = false;
        slot.state
    }

    /// Latest camera state if it has not been read yet.
    pub(crate) fn take_new_camera(&self) -> Option<CameraState> {
        let mut slot = self.camera.lock();
        if slot.unread {
            slot.unread = false;
            Some(slot.state)
        } else {
            None
        }
    }

    pub(crate) fn has_new_camera(&self) -> bool {
        self.camera.lock().unread
    }

    pub(crate) fn stats(&self) -> SessionStats {
        *self.stats.lock()
    }

    fn update_stats(&self, f: impl FnOnce(&mut SessionStats)) {
        f(&mut self.stats.lock());
    }
}

/// Session-thread state: the sockets are owned here and never shared.
#[derive(Debug)]
pub(crate) struct Session {
    config: SessionConfig,
    server: ServerSocket,
    client: Option<CommandChannel>,
    shared: Arc<SessionShared>,
}

impl Session {
    pub(crate) fn new(config: SessionConfig, shared: Arc<SessionShared>) -> Self {
        Self {
            config,
            server: ServerSocket::new(),
            client: None,
            shared,
        }
    }

    pub(crate) fn create_server(&mut self, addr: &str) -> Result<SocketAddr> {
        let local_addr = self.server.create(addr)?;
        self.shared.server_open.store(true, Ordering::SeqCst);
        Ok(local_addr)
    }

    pub(crate) fn server_is_open(&self) -> bool {
        self.server.is_open()
    }

    /// Bounded accept poll. True when a new client became the connection.
    pub(crate) fn check_for_connection(&mut self) -> bool {
        self.accept_within(self.config.accept_timeout())
    }

    /// Release the client and listening sockets.
    pub(crate) fn close(&mut self) {
        self.drop_client_quietly();
        self.server.close();
        self.shared.server_open.store(false, Ordering::SeqCst);
    }

    /// Session thread body. Returns once a quit request is observed.
    pub(crate) fn run(mut self) {
        info!("Remote-control session thread started");

        let mut state = if self.client.is_some() {
            SessionState::AwaitingCommand
        } else {
            SessionState::Listening
        };

        while !self.shared.quit_requested() {
            state = self.step(state);
        }

        self.close();
        let stats = self.shared.stats();
        info!(
            "Remote-control session thread stopped ({} connections, {} commands, {} camera updates, {} exports)",
            stats.connections, stats.commands, stats.camera_updates, stats.exports
        );
    }

    /// Advance the state machine by one transition.
    pub(crate) fn step(&mut self, state: SessionState) -> SessionState {
        match state {
            SessionState::Listening => {
                if self.check_for_connection() {
                    SessionState::AwaitingCommand
                } else {
                    // Give up the rest of the quantum between accept polls
                    thread::yield_now();
                    SessionState::Listening
                }
            }
            SessionState::AwaitingCommand => {
                // A newer client supersedes the current one, busy or idle
                self.accept_within(Duration::ZERO);
                match self.wait_for_command() {
                    Ok(Some(cmd)) => SessionState::Handling(cmd),
                    Ok(None) => SessionState::AwaitingCommand,
                    Err(e) => self.disconnect(&e),
                }
            }
            SessionState::Handling(cmd) => match self.handle_command(cmd) {
                Ok(()) => {
                    self.shared.update_stats(|s| s.commands += 1);
                    SessionState::AwaitingCommand
                }
                Err(e) => self.disconnect(&e),
            },
            SessionState::Disconnected => SessionState::Listening,
        }
    }

    /// Wait one poll interval for a command.
    fn wait_for_command(&mut self) -> Result<Option<Command>> {
        let timeout = self.config.poll_timeout();
        let client = self.client.as_mut().ok_or(Error::Disconnected)?;
        if client.wait_for_activity(timeout)? {
            client.receive_command().map(Some)
        } else {
            Ok(None)
        }
    }

    fn handle_command(&mut self, cmd: Command) -> Result<()> {
        debug!("Handling {}", cmd);
        match cmd {
            Command::Ready => Ok(()),
            Command::SendMetadata => self.send_export(ExportKind::Metadata),
            Command::SendObjects => self.send_export(ExportKind::Objects),
            Command::ReceiveCameraState => self.receive_camera_state(),
            Command::Heartbeat => self.client_mut()?.send_command(Command::Heartbeat),
        }
    }

    /// Export on the owner thread, then transmit.
    fn send_export(&mut self, kind: ExportKind) -> Result<()> {
        let export = self.shared.handoff.request(kind)?;
        debug!("Sending {:?} export ({} bytes)", kind, export.byte_len());
        self.client_mut()?.send_export(&export)?;
        self.shared.update_stats(|s| s.exports += 1);
        Ok(())
    }

    fn receive_camera_state(&mut self) -> Result<()> {
        let mut buf = [0u8; CAMERA_STATE_SIZE];
        self.client_mut()?.receive_exact(&mut buf)?;
        let state = CameraState::decode(&buf);
        debug!("Camera state received: {:?}", state);
        self.shared.store_camera(state);
        self.shared.update_stats(|s| s.camera_updates += 1);
        Ok(())
    }

    /// Accept a pending connection within `timeout`; it replaces any
    /// current client.
    fn accept_within(&mut self, timeout: Duration) -> bool {
        let (stream, addr) = match self.server.accept_within(timeout) {
            Ok(Some(accepted)) => accepted,
            Ok(None) => return false,
            Err(e) => {
                warn!("Accept poll failed: {}", e);
                return false;
            }
        };

        let channel = match CommandChannel::new(stream) {
            Ok(channel) => channel,
            Err(e) => {
                warn!("Failed to set up connection from {}: {}", addr, e);
                return false;
            }
        };

        if let Some(previous) = self.client.replace(channel) {
            info!(
                "Client {} superseded by new connection from {}",
                previous.peer_addr(),
                addr
            );
            previous.shutdown();
        } else {
            info!("Client connected: {}", addr);
        }
        self.shared.client_connected.store(true, Ordering::SeqCst);
        self.shared.update_stats(|s| s.connections += 1);
        true
    }

    fn disconnect(&mut self, err: &Error) -> SessionState {
        let peer = self.client.as_ref().map(CommandChannel::peer_addr);
        if err.is_disconnect() {
            info!("Client {:?} disconnected, listening again", peer);
        } else {
            warn!("Dropping client {:?}: {}", peer, err);
        }
        self.drop_client_quietly();
        SessionState::Disconnected
    }

    fn drop_client_quietly(&mut self) {
        if let Some(client) = self.client.take() {
            client.shutdown();
        }
        self.shared.client_connected.store(false, Ordering::SeqCst);
    }

    fn client_mut(&mut self) -> Result<&mut CommandChannel> {
        self.client.as_mut().ok_or(Error::Disconnected)
    }
}
