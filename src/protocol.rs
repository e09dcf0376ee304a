//! Remote-control wire protocol
//!
//! # Protocol
//!
//! A single persistent TCP connection, one client at a time. Every exchange
//! starts with a command tag sent by the client:
//!
//! ```text
//! ┌────────────────────┐
//! │ Command (4 bytes)  │
//! │ Little-endian i32  │
//! └────────────────────┘
//! ```
//!
//! | Tag | Command                | Request payload       | Response                              |
//! |-----|------------------------|-----------------------|---------------------------------------|
//! | 1   | `Ready`                | none                  | none                                  |
//! | 2   | `SendMetadata`         | none                  | `u32` length + metadata bytes         |
//! | 3   | `SendObjects`          | none                  | `u32` count, then per object `u32` length + bytes |
//! | 4   | `ReceiveCameraState`   | 36-byte camera state  | none                                  |
//! | 5   | `Heartbeat`            | none                  | `Heartbeat` tag echoed                |
//!
//! All lengths are little-endian `u32`. A tag outside this table is a
//! protocol error: the server drops the connection, since the stream can no
//! longer be realigned.

use crate::error::Error;
use std::fmt;

/// Size of a command tag on the wire
pub const COMMAND_SIZE: usize = 4;

/// Size of a frame length or object count on the wire
pub const LENGTH_SIZE: usize = 4;

/// Integer command tags. Values are fixed by the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Command {
    /// Client handshake / keep-alive, no reply
    Ready = 1,
    /// Request scene metadata
    SendMetadata = 2,
    /// Request serialized scene objects
    SendObjects = 3,
    /// Camera state follows (36 bytes)
    ReceiveCameraState = 4,
    /// Liveness probe, echoed back
    Heartbeat = 5,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Ready,
        Command::SendMetadata,
        Command::SendObjects,
        Command::ReceiveCameraState,
        Command::Heartbeat,
    ];

    /// Wire value of this command
    pub fn tag(self) -> i32 {
        self as i32
    }

    pub fn to_bytes(self) -> [u8; COMMAND_SIZE] {
        self.tag().to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; COMMAND_SIZE]) -> Result<Self, Error> {
        Self::try_from(i32::from_le_bytes(bytes))
    }
}

impl TryFrom<i32> for Command {
    type Error = Error;

    fn try_from(tag: i32) -> Result<Self, Error> {
        match tag {
            1 => Ok(Command::Ready),
            2 => Ok(Command::SendMetadata),
            3 => Ok(Command::SendObjects),
            4 => Ok(Command::ReceiveCameraState),
            5 => Ok(Command::Heartbeat),
            other => Err(Error::UnknownCommand(other)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Ready => "READY",
            Command::SendMetadata => "SEND_METADATA",
            Command::SendObjects => "SEND_OBJECTS",
            Command::ReceiveCameraState => "RECEIVE_CAMERA_STATE",
            Command::Heartbeat => "HEARTBEAT",
        };
        write!(f, "{}({})", name, self.tag())
    }
}
