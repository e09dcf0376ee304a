//! Error types for the mobile remote-control server

use std::io;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Remote-control error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on a socket or file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Listening socket could not be bound
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// Peer closed the connection
    #[error("Connection closed by peer")]
    Disconnected,

    /// Integer on the wire is not a known command tag
    #[error("Unknown command tag: {0}")]
    UnknownCommand(i32),

    /// Peer answered with a different command than the exchange expects
    #[error("Unexpected command: expected {expected}, got {actual}")]
    UnexpectedCommand {
        /// Command the exchange expects
        expected: crate::protocol::Command,
        /// Command actually received
        actual: crate::protocol::Command,
    },

    /// Length-prefixed payload exceeds the configured limit
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Announced payload length
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// `create_server` called while a server socket is already open
    #[error("Server socket already open")]
    ServerAlreadyOpen,

    /// Operation needs an open server socket
    #[error("Server socket not open")]
    ServerNotOpen,

    /// Session thread already started
    #[error("Session thread already running")]
    AlreadyRunning,

    /// Session thread has not been started
    #[error("Session thread not running")]
    NotRunning,

    /// Quit was requested while waiting
    #[error("Cancelled by quit request")]
    Cancelled,

    /// Export handoff was closed by the owner thread
    #[error("Scene export handoff closed")]
    HandoffClosed,

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session thread could not be spawned or panicked
    #[error("Thread error: {0}")]
    Thread(String),
}

impl Error {
    /// True when the error means the peer went away rather than misbehaved.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Disconnected => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_classification() {
        assert!(Error::Disconnected.is_disconnect());
        assert!(Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof)).is_disconnect());
        assert!(Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_disconnect());
        assert!(!Error::UnknownCommand(42).is_disconnect());
        assert!(!Error::Io(io::Error::from(io::ErrorKind::PermissionDenied)).is_disconnect());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::UnknownCommand(9).to_string(),
            "Unknown command tag: 9"
        );
        let err = Error::PayloadTooLarge { len: 10, max: 4 };
        assert_eq!(err.to_string(), "Payload too large: 10 bytes (max 4)");
    }
}
