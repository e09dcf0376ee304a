//! Command channel over a connected TCP stream.
//!
//! Every operation transfers an exact number of bytes or fails; a failed
//! transfer leaves the stream at an unknown alignment, so callers drop the
//! connection instead of reading on.
//!
//! Socket read timeouts only bound [`CommandChannel::wait_for_activity`].
//! Exact transfers keep their partial progress across timeouts and carry on
//! until complete, unless an I/O timeout has been configured with
//! [`CommandChannel::set_io_timeout`] (client side).

use crate::error::{Error, Result};
use crate::protocol::{COMMAND_SIZE, Command, LENGTH_SIZE};
use crate::scene::SceneExport;
use log::trace;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

/// Initial capacity of the reusable frame buffer
const INITIAL_BUFFER_CAPACITY: usize = 4096;

/// Smallest timeout accepted by the socket API
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(1);

/// Integer-tagged command channel over a duplex TCP stream
pub struct CommandChannel {
    stream: TcpStream,
    peer: SocketAddr,
    /// Read timeout currently installed on the socket
    read_timeout: Option<Duration>,
    /// Bound on a transfer making no progress (`None` = unbounded)
    io_timeout: Option<Duration>,
    /// Reusable buffer for outgoing frames
    write_buffer: Vec<u8>,
}

impl CommandChannel {
    /// Wrap a connected stream.
    pub fn new(stream: TcpStream) -> Result<Self> {
        // Accepted sockets may inherit non-blocking mode from the listener
        stream.set_nonblocking(false)?;
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to disable Nagle on client socket: {}", e);
        }
        let peer = stream.peer_addr()?;

        Ok(Self {
            stream,
            peer,
            read_timeout: None,
            io_timeout: None,
            write_buffer: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Bound every exact transfer: fail with `TimedOut` when no byte moves
    /// for `timeout`. `None` restores unbounded transfers.
    pub fn set_io_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.map(|t| t.max(MIN_SOCKET_TIMEOUT));
        self.stream.set_write_timeout(timeout)?;
        self.set_read_timeout(timeout)?;
        self.io_timeout = timeout;
        Ok(())
    }

    /// Block until bytes are readable or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when data is pending, `Ok(false)` on timeout and an
    /// error when the connection is gone.
    pub fn wait_for_activity(&mut self, timeout: Duration) -> Result<bool> {
        self.set_read_timeout(Some(timeout.max(MIN_SOCKET_TIMEOUT)))?;

        let mut probe = [0u8; 1];
        let result = match self.stream.peek(&mut probe) {
            Ok(0) => Err(Error::Disconnected),
            Ok(_) => Ok(true),
            Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(Error::Io(e)),
        };

        // Restore the transfer bound for the exact reads that follow
        if self.io_timeout.is_some() {
            self.set_read_timeout(self.io_timeout)?;
        }
        result
    }

    /// Read one command tag. Unknown tags are an error.
    pub fn receive_command(&mut self) -> Result<Command> {
        let mut buf = [0u8; COMMAND_SIZE];
        self.receive_exact(&mut buf)?;
        let cmd = Command::from_bytes(buf)?;
        trace!("Received {} from {}", cmd, self.peer);
        Ok(cmd)
    }

    /// Write one command tag.
    pub fn send_command(&mut self, cmd: Command) -> Result<()> {
        trace!("Sending {} to {}", cmd, self.peer);
        self.send_exact(&cmd.to_bytes())
    }

    /// Write a raw integer where a command tag is expected.
    pub fn send_raw_tag(&mut self, tag: i32) -> Result<()> {
        self.send_exact(&tag.to_le_bytes())
    }

    /// Fill `buf` completely.
    pub fn receive_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        let mut last_progress = Instant::now();

        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(Error::Disconnected),
                Ok(n) => {
                    filled += n;
                    last_progress = Instant::now();
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if is_timeout(&e) => {
                    if let Some(limit) = self.io_timeout
                        && last_progress.elapsed() >= limit
                    {
                        return Err(Error::Io(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("read stalled after {} of {} bytes", filled, buf.len()),
                        )));
                    }
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }

    /// Write all of `bytes`.
    pub fn send_exact(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read a little-endian `u32` length or count.
    pub fn receive_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; LENGTH_SIZE];
        self.receive_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Send `payload` behind a `u32` length prefix.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.reserve(LENGTH_SIZE + payload.len());
        push_frame(&mut self.write_buffer, payload)?;
        self.flush_write_buffer()
    }

    /// Receive a length-prefixed frame of at most `max_len` bytes.
    pub fn receive_frame(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let len = self.receive_u32()? as usize;
        if len > max_len {
            return Err(Error::PayloadTooLarge { len, max: max_len });
        }
        let mut payload = vec![0u8; len];
        self.receive_exact(&mut payload)?;
        Ok(payload)
    }

    /// Send an object count followed by each object as a frame.
    pub fn send_objects(&mut self, objects: &[Vec<u8>]) -> Result<()> {
        let total: usize = objects.iter().map(|o| LENGTH_SIZE + o.len()).sum();
        self.write_buffer.clear();
        self.write_buffer.reserve(LENGTH_SIZE + total);

        let count = u32::try_from(objects.len()).map_err(|_| Error::PayloadTooLarge {
            len: objects.len(),
            max: u32::MAX as usize,
        })?;
        self.write_buffer.extend_from_slice(&count.to_le_bytes());
        for object in objects {
            push_frame(&mut self.write_buffer, object)?;
        }
        self.flush_write_buffer()
    }

    /// Receive the object list written by [`send_objects`](Self::send_objects).
    /// `max_total` bounds the summed object size.
    pub fn receive_objects(&mut self, max_total: usize) -> Result<Vec<Vec<u8>>> {
        let count = self.receive_u32()? as usize;
        // Each object carries at least its length prefix
        if count.saturating_mul(LENGTH_SIZE) > max_total {
            return Err(Error::PayloadTooLarge {
                len: count.saturating_mul(LENGTH_SIZE),
                max: max_total,
            });
        }

        // Grown as objects arrive; the count is peer-supplied
        let mut objects = Vec::new();
        let mut remaining = max_total;
        for _ in 0..count {
            let object = self.receive_frame(remaining)?;
            remaining -= object.len();
            objects.push(object);
        }
        Ok(objects)
    }

    /// Send a scene export in the framing of its kind.
    pub fn send_export(&mut self, export: &SceneExport) -> Result<()> {
        match export {
            SceneExport::Metadata(bytes) => self.send_frame(bytes),
            SceneExport::Objects(objects) => self.send_objects(objects),
        }
    }

    /// Shut down both directions. Further operations fail.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn flush_write_buffer(&mut self) -> Result<()> {
        self.stream.write_all(&self.write_buffer)?;
        self.stream.flush()?;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        if self.read_timeout != timeout {
            self.stream.set_read_timeout(timeout)?;
            self.read_timeout = timeout;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("peer", &self.peer)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

fn push_frame(buffer: &mut Vec<u8>, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(payload);
    Ok(())
}

/// Read timeouts surface as `WouldBlock` on Unix and `TimedOut` on Windows.
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
