//! Socket plumbing: the command channel over a connected stream and the
//! listening socket that produces those streams.

pub mod channel;
pub mod server;

pub use channel::CommandChannel;
pub use server::ServerSocket;
