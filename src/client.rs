//! Mobile-side peer of the remote-control protocol.
//!
//! # Example
//!
//! ```no_run
//! use mobile_remote::{CameraState, RemoteClient};
//! use std::time::Duration;
//!
//! let mut client = RemoteClient::connect("192.168.1.20:40000")?;
//! client.set_timeout(Some(Duration::from_secs(5)))?;
//! client.ready()?;
//!
//! let metadata = client.request_metadata()?;
//! let objects = client.request_objects()?;
//! println!("{} bytes of metadata, {} objects", metadata.len(), objects.len());
//!
//! client.send_camera_state(&CameraState::new([0.0, 0.0, 5.0], [0.0; 3], [0.0, 1.0, 0.0]))?;
//! # Ok::<(), mobile_remote::Error>(())
//! ```

use crate::camera::CameraState;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::protocol::Command;
use crate::transport::CommandChannel;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Client connection to a remote-control server
#[derive(Debug)]
pub struct RemoteClient {
    channel: CommandChannel,
    max_payload: usize,
}

impl RemoteClient {
    /// Connect to the server at `addr`.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self {
            channel: CommandChannel::new(stream)?,
            max_payload: SessionConfig::default().max_payload_bytes,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.channel.peer_addr()
    }

    /// Fail any exchange that stalls longer than `timeout` (`None` blocks).
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.channel.set_io_timeout(timeout)
    }

    /// Largest metadata frame / summed object size accepted from the server
    pub fn set_max_payload(&mut self, max_payload: usize) {
        self.max_payload = max_payload;
    }

    /// Handshake. The server sends nothing back.
    pub fn ready(&mut self) -> Result<()> {
        self.channel.send_command(Command::Ready)
    }

    /// Heartbeat round trip; returns the time to the echo.
    pub fn heartbeat(&mut self) -> Result<Duration> {
        let start = Instant::now();
        self.channel.send_command(Command::Heartbeat)?;
        self.expect_command(Command::Heartbeat)?;
        Ok(start.elapsed())
    }

    /// Fetch a fresh scene description.
    pub fn request_metadata(&mut self) -> Result<Vec<u8>> {
        self.channel.send_command(Command::SendMetadata)?;
        self.channel.receive_frame(self.max_payload)
    }

    /// Fetch freshly serialized scene objects.
    pub fn request_objects(&mut self) -> Result<Vec<Vec<u8>>> {
        self.channel.send_command(Command::SendObjects)?;
        self.channel.receive_objects(self.max_payload)
    }

    /// Send a camera pose for the server's view.
    pub fn send_camera_state(&mut self, state: &CameraState) -> Result<()> {
        let mut message = Vec::with_capacity(4 + crate::camera::CAMERA_STATE_SIZE);
        message.extend_from_slice(&Command::ReceiveCameraState.to_bytes());
        message.extend_from_slice(&state.encode());
        self.channel.send_exact(&message)
    }

    /// Send an arbitrary integer as a command tag.
    pub fn send_raw_command(&mut self, tag: i32) -> Result<()> {
        self.channel.send_raw_tag(tag)
    }

    /// Send arbitrary bytes without framing.
    pub fn send_raw_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.channel.send_exact(bytes)
    }

    /// Wait up to `timeout` for the server to close the connection.
    pub fn wait_for_close(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            match self.channel.wait_for_activity(deadline - now) {
                Ok(true) => {
                    // Unsolicited bytes: drain them and keep waiting
                    let mut sink = [0u8; 1];
                    match self.channel.receive_exact(&mut sink) {
                        Ok(()) => {}
                        Err(e) if e.is_disconnect() => return Ok(true),
                        Err(e) => return Err(e),
                    }
                }
                Ok(false) => {}
                Err(e) if e.is_disconnect() => return Ok(true),
                Err(e) => return Err(e),
            }
        }
    }

    fn expect_command(&mut self, expected: Command) -> Result<()> {
        let actual = self.channel.receive_command()?;
        if actual != expected {
            return Err(Error::UnexpectedCommand { expected, actual });
        }
        Ok(())
    }
}
