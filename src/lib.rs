//! Mobile remote control - lets a mobile client view and steer a 3D scene
//! owned by a separate rendering thread.
//!
//! ## Threads
//!
//! - **Session thread**: spawned by [`RemoteControl::start`], owns the
//!   sockets and runs the command protocol.
//! - **Owner thread**: the embedder's rendering thread. It alone touches the
//!   [`Scene`]; it services export requests and applies camera updates.
//!
//! ## Modules
//!
//! - [`camera`]: camera pose and its 36-byte encoding
//! - [`protocol`]: command tags
//! - [`transport`]: command channel and listening socket
//! - [`handoff`]: cross-thread scene export rendezvous
//! - [`session`]: protocol state machine
//! - [`remote`]: embedder handle
//! - [`client`]: mobile-side peer

pub mod camera;
pub mod client;
pub mod config;
pub mod demo;
pub mod error;
pub mod handoff;
pub mod protocol;
pub mod remote;
pub mod scene;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use camera::{CAMERA_STATE_SIZE, CameraState};
pub use client::RemoteClient;
pub use config::RemoteConfig;
pub use error::{Error, Result};
pub use protocol::Command;
pub use remote::RemoteControl;
pub use scene::{ExportKind, Scene, SceneExport};
pub use session::{SessionState, SessionStats};
