//! In-memory scene served by the `mobile-remote` daemon.
//!
//! Metadata is a JSON document describing the camera and objects; each
//! object is exported as its triangle vertices, little-endian `f32` xyz.

use crate::camera::CameraState;
use crate::scene::Scene;
use serde::Serialize;

/// Named triangle soup
#[derive(Debug, Clone, PartialEq)]
pub struct DemoObject {
    pub name: String,
    /// Triangle vertices, three per triangle
    pub vertices: Vec<[f32; 3]>,
}

impl DemoObject {
    fn to_bytes(&self) -> Vec<u8> {
        self.vertices
            .iter()
            .flat_map(|v| v.iter().flat_map(|c| c.to_le_bytes()))
            .collect()
    }
}

#[derive(Serialize)]
struct ObjectInfo<'a> {
    id: usize,
    name: &'a str,
    vertex_count: usize,
    byte_length: usize,
}

#[derive(Serialize)]
struct SceneMetadata<'a> {
    revision: u64,
    camera: &'a CameraState,
    objects: Vec<ObjectInfo<'a>>,
}

/// Scene with a camera, some geometry and counters for observed activity
#[derive(Debug, Clone)]
pub struct DemoScene {
    pub camera: CameraState,
    pub objects: Vec<DemoObject>,
    /// Incremented on every export
    pub revision: u64,
    pub redraw_requests: u64,
}

impl Default for DemoScene {
    fn default() -> Self {
        Self::with_cube()
    }
}

impl DemoScene {
    pub fn empty() -> Self {
        Self {
            camera: CameraState::new([0.0, 0.0, 5.0], [0.0; 3], [0.0, 1.0, 0.0]),
            objects: Vec::new(),
            revision: 0,
            redraw_requests: 0,
        }
    }

    /// Unit cube over a ground quad
    pub fn with_cube() -> Self {
        let mut scene = Self::empty();
        scene.objects.push(DemoObject {
            name: "cube".to_string(),
            vertices: cube_vertices(0.5),
        });
        scene.objects.push(DemoObject {
            name: "ground".to_string(),
            vertices: vec![
                [-2.0, -0.5, -2.0],
                [2.0, -0.5, -2.0],
                [2.0, -0.5, 2.0],
                [-2.0, -0.5, -2.0],
                [2.0, -0.5, 2.0],
                [-2.0, -0.5, 2.0],
            ],
        });
        scene
    }
}

impl Scene for DemoScene {
    fn export_metadata(&mut self) -> Vec<u8> {
        self.revision += 1;
        let metadata = SceneMetadata {
            revision: self.revision,
            camera: &self.camera,
            objects: self
                .objects
                .iter()
                .enumerate()
                .map(|(id, o)| ObjectInfo {
                    id,
                    name: &o.name,
                    vertex_count: o.vertices.len(),
                    byte_length: o.vertices.len() * 12,
                })
                .collect(),
        };
        match serde_json::to_vec(&metadata) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("Failed to serialize scene metadata: {}", e);
                Vec::new()
            }
        }
    }

    fn export_objects(&mut self) -> Vec<Vec<u8>> {
        self.revision += 1;
        self.objects.iter().map(DemoObject::to_bytes).collect()
    }

    fn apply_camera_state(&mut self, state: &CameraState) {
        self.camera = *state;
    }

    fn request_redraw(&mut self) {
        self.redraw_requests += 1;
    }
}

fn cube_vertices(h: f32) -> Vec<[f32; 3]> {
    let corners = [
        [-h, -h, -h],
        [h, -h, -h],
        [h, h, -h],
        [-h, h, -h],
        [-h, -h, h],
        [h, -h, h],
        [h, h, h],
        [-h, h, h],
    ];
    // Two triangles per face
    const FACES: [[usize; 4]; 6] = [
        [0, 1, 2, 3],
        [5, 4, 7, 6],
        [4, 0, 3, 7],
        [1, 5, 6, 2],
        [3, 2, 6, 7],
        [4, 5, 1, 0],
    ];
    FACES
        .iter()
        .flat_map(|f| [f[0], f[1], f[2], f[0], f[2], f[3]])
        .map(|i| corners[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_describes_objects() {
        let mut scene = DemoScene::with_cube();
        let metadata: serde_json::Value =
            serde_json::from_slice(&scene.export_metadata()).unwrap();

        assert_eq!(metadata["revision"], 1);
        let objects = metadata["objects"].as_array().unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0]["name"], "cube");
        assert_eq!(objects[0]["vertex_count"], 36);
        assert_eq!(objects[0]["byte_length"], 36 * 12);
    }

    #[test]
    fn test_objects_match_metadata_sizes() {
        let mut scene = DemoScene::with_cube();
        let objects = scene.export_objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].len(), 36 * 12);
        assert_eq!(objects[1].len(), 6 * 12);
        assert_eq!(&objects[1][0..4], &(-2.0f32).to_le_bytes());
    }

    #[test]
    fn test_every_export_bumps_revision() {
        let mut scene = DemoScene::empty();
        scene.export_metadata();
        scene.export_objects();
        assert_eq!(scene.revision, 2);
    }

    #[test]
    fn test_camera_and_redraw() {
        let mut scene = DemoScene::empty();
        let state = CameraState::new([1.0, 2.0, 3.0], [0.0; 3], [0.0, 0.0, 1.0]);
        scene.apply_camera_state(&state);
        scene.request_redraw();
        assert_eq!(scene.camera, state);
        assert_eq!(scene.redraw_requests, 1);
    }
}
