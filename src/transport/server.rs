//! Listening socket with bounded-wait accept polling.
//!
//! The listener runs in non-blocking mode so the session thread can poll for
//! a client for a millisecond, then get on with its other work.

use crate::error::{Error, Result};
use log::{debug, info};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

/// Sleep between accept attempts inside one bounded poll
const ACCEPT_RETRY_INTERVAL: Duration = Duration::from_micros(250);

/// Owner of the listening socket
#[derive(Debug, Default)]
pub struct ServerSocket {
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
}

impl ServerSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind and listen on `addr`.
    ///
    /// Fails with [`Error::ServerAlreadyOpen`] if a listener exists; call
    /// [`close`](Self::close) first.
    pub fn create(&mut self, addr: &str) -> Result<SocketAddr> {
        if self.listener.is_some() {
            return Err(Error::ServerAlreadyOpen);
        }

        let listener = TcpListener::bind(addr).map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        info!("Remote-control server listening on {}", local_addr);
        self.listener = Some(listener);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    pub fn is_open(&self) -> bool {
        self.listener.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Poll for a pending connection for at most `timeout`.
    ///
    /// Returns `Ok(None)` when no client connected within the bound. A zero
    /// timeout makes a single attempt.
    pub fn accept_within(&self, timeout: Duration) -> Result<Option<(TcpStream, SocketAddr)>> {
        let listener = self.listener.as_ref().ok_or(Error::ServerNotOpen)?;
        let deadline = Instant::now() + timeout;

        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    debug!("Accepted connection from {}", addr);
                    return Ok(Some((stream, addr)));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    thread::sleep(ACCEPT_RETRY_INTERVAL.min(deadline - now));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Release the listening socket.
    pub fn close(&mut self) {
        if let Some(addr) = self.local_addr.take() {
            info!("Remote-control server on {} closed", addr);
        }
        self.listener = None;
    }
}
