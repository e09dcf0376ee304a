//! Rendering-engine collaborator.
//!
//! A [`Scene`] lives on the owner (rendering) thread and is never handed to
//! the session thread. The session only sees the [`SceneExport`] values the
//! owner publishes through the export handoff.

use crate::camera::CameraState;

/// Which part of the scene the client asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Metadata,
    Objects,
}

/// Result of one scene export
#[derive(Debug, Clone, PartialEq)]
pub enum SceneExport {
    /// Scene description
    Metadata(Vec<u8>),
    /// Serialized geometry, one buffer per object
    Objects(Vec<Vec<u8>>),
}

impl SceneExport {
    pub fn kind(&self) -> ExportKind {
        match self {
            SceneExport::Metadata(_) => ExportKind::Metadata,
            SceneExport::Objects(_) => ExportKind::Objects,
        }
    }

    /// Payload size in bytes, excluding framing
    pub fn byte_len(&self) -> usize {
        match self {
            SceneExport::Metadata(bytes) => bytes.len(),
            SceneExport::Objects(objects) => objects.iter().map(Vec::len).sum(),
        }
    }
}

/// Scene owned by the rendering thread.
///
/// All methods run on the owner thread only.
pub trait Scene {
    /// Serialize the scene description.
    fn export_metadata(&mut self) -> Vec<u8>;

    /// Serialize the scene geometry.
    fn export_objects(&mut self) -> Vec<Vec<u8>>;

    /// Move the active camera.
    fn apply_camera_state(&mut self, state: &CameraState);

    /// Schedule a redraw of the view.
    fn request_redraw(&mut self);

    /// Run the export the client asked for.
    fn export(&mut self, kind: ExportKind) -> SceneExport {
        match kind {
            ExportKind::Metadata => SceneExport::Metadata(self.export_metadata()),
            ExportKind::Objects => SceneExport::Objects(self.export_objects()),
        }
    }
}
