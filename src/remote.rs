//! Embedder-facing handle for the remote-control server.
//!
//! # Lifecycle
//!
//! ```text
//! new() → create_server(port) → start() ─ session thread runs ─
//!       → should_quit() → wait() → drop
//! ```
//!
//! Before `start()` the embedder owns the sockets and may call
//! `check_for_connection()` / `close()` itself. Once started, the session
//! thread owns them and closes them on exit.
//!
//! # Owner thread duties
//!
//! The thread that owns the [`Scene`] must keep calling
//! [`RemoteControl::export_scene`] when an export is pending (poll
//! [`RemoteControl::has_pending_export`] or receive from
//! [`RemoteControl::export_requests`]) and may pick up camera updates with
//! [`RemoteControl::apply_camera_update`].

use crate::camera::CameraState;
use crate::config::{RemoteConfig, SessionConfig};
use crate::error::{Error, Result};
use crate::scene::{ExportKind, Scene};
use crate::session::{Session, SessionShared, SessionStats};
use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Name of the session thread
const SESSION_THREAD_NAME: &str = "remote-control";

/// Remote-control server handle, owned by the rendering thread
pub struct RemoteControl {
    bind_address: String,
    shared: Arc<SessionShared>,
    /// Present until the session thread takes it
    session: Option<Session>,
    thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl RemoteControl {
    /// Handle listening on all interfaces with default session settings.
    pub fn new() -> Self {
        Self::with_settings("0.0.0.0", SessionConfig::default())
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::with_settings(&config.server.bind_address, config.session.clone())
    }

    pub fn with_settings(bind_address: &str, session: SessionConfig) -> Self {
        let shared = Arc::new(SessionShared::default());
        Self {
            bind_address: bind_address.to_string(),
            session: Some(Session::new(session, Arc::clone(&shared))),
            shared,
            thread: None,
            local_addr: None,
        }
    }

    /// Open the listening socket on `port` (0 picks a free port).
    ///
    /// No retry is attempted; a bind failure is returned to the caller.
    pub fn create_server(&mut self, port: u16) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.bind_address, port);
        let session = self.idle_session()?;
        let local_addr = session.create_server(&addr)?;
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bounded (1 ms by default) accept poll. True exactly when a new client
    /// connection was established by this call.
    ///
    /// Once the session thread runs it does the polling itself and this
    /// returns false.
    pub fn check_for_connection(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) => session.check_for_connection(),
            None => {
                debug!("check_for_connection ignored: sockets owned by session thread");
                false
            }
        }
    }

    /// Close the client and listening sockets.
    ///
    /// Only valid while the session thread is not running; a running thread
    /// closes its sockets itself after [`should_quit`](Self::should_quit).
    pub fn close(&mut self) {
        match self.session.as_mut() {
            Some(session) => {
                session.close();
                self.local_addr = None;
            }
            None if self.thread.is_some() => {
                warn!("close() ignored while the session thread owns the sockets")
            }
            None => debug!("close() ignored: sockets already closed by the session thread"),
        }
    }

    /// Spawn the session thread. The server must be open.
    pub fn start(&mut self) -> Result<()> {
        if !self.idle_session()?.server_is_open() {
            return Err(Error::ServerNotOpen);
        }
        let session = self.session.take().ok_or(Error::AlreadyRunning)?;

        let handle = thread::Builder::new()
            .name(SESSION_THREAD_NAME.to_string())
            .spawn(move || session.run())
            .map_err(|e| Error::Thread(format!("failed to spawn session thread: {}", e)))?;

        info!("Remote-control session thread spawned");
        self.thread = Some(handle);
        Ok(())
    }

    /// Ask the session thread to stop. It exits at its next checkpoint,
    /// after any in-flight transfer completes. A pending scene export is
    /// abandoned, so [`wait`](Self::wait) never needs the owner thread.
    pub fn should_quit(&self) {
        self.shared.request_quit();
    }

    /// Join the session thread after [`should_quit`](Self::should_quit).
    pub fn wait(&mut self) -> Result<()> {
        let handle = self.thread.take().ok_or(Error::NotRunning)?;
        handle
            .join()
            .map_err(|_| Error::Thread("session thread panicked".to_string()))?;
        self.local_addr = None;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// True while the listening socket is open.
    pub fn server_is_open(&self) -> bool {
        self.shared.server_open()
    }

    /// True while a client is connected.
    pub fn client_is_connected(&self) -> bool {
        self.shared.client_connected()
    }

    /// Latest camera state received; clears the new-state flag.
    pub fn camera_state(&self) -> CameraState {
        self.shared.take_camera()
    }

    /// True when a camera state arrived since the last [`camera_state`](Self::camera_state).
    pub fn has_new_camera_state(&self) -> bool {
        self.shared.has_new_camera()
    }

    /// Apply a newly received camera state to `scene` and request a redraw.
    ///
    /// Owner thread only. Returns false when no update was pending.
    pub fn apply_camera_update<S: Scene + ?Sized>(&self, scene: &mut S) -> bool {
        match self.shared.take_new_camera() {
            Some(state) => {
                scene.apply_camera_state(&state);
                scene.request_redraw();
                true
            }
            None => false,
        }
    }

    /// Run a pending export on this (owner) thread and hand it to the
    /// session thread. Returns false when nothing was requested.
    pub fn export_scene<S: Scene + ?Sized>(&self, scene: &mut S) -> bool {
        self.shared.handoff.service(scene)
    }

    pub fn has_pending_export(&self) -> bool {
        self.shared.handoff.pending().is_some()
    }

    /// Receiver yielding one item per export request.
    pub fn export_requests(&self) -> Receiver<ExportKind> {
        self.shared.handoff.signals()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.stats()
    }

    /// Session not yet handed to its thread
    fn idle_session(&mut self) -> Result<&mut Session> {
        if self.thread.is_some() {
            return Err(Error::AlreadyRunning);
        }
        if self.shared.quit_requested() {
            return Err(Error::Cancelled);
        }
        self.session.as_mut().ok_or(Error::AlreadyRunning)
    }
}

impl Default for RemoteControl {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RemoteControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteControl")
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .field("server_open", &self.server_is_open())
            .field("client_connected", &self.client_is_connected())
            .finish()
    }
}

impl Drop for RemoteControl {
    fn drop(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.should_quit();
            if handle.join().is_err() {
                error!("Remote-control session thread panicked");
            }
        }
    }
}
