//! Camera pose and its fixed-layout wire encoding.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┐
//! │ position     │ focal point  │ view-up      │
//! │ 3 × f32 LE   │ 3 × f32 LE   │ 3 × f32 LE   │
//! └──────────────┴──────────────┴──────────────┘
//!   bytes 0..12    bytes 12..24   bytes 24..36
//! ```

use serde::{Deserialize, Serialize};

/// Encoded size of a [`CameraState`] in bytes (nine 4-byte floats)
pub const CAMERA_STATE_SIZE: usize = 9 * 4;

/// Camera pose sent by the mobile client.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraState {
    pub position: [f32; 3],
    pub focal_point: [f32; 3],
    pub view_up: [f32; 3],
}

impl CameraState {
    pub fn new(position: [f32; 3], focal_point: [f32; 3], view_up: [f32; 3]) -> Self {
        Self {
            position,
            focal_point,
            view_up,
        }
    }

    /// Encode into the 36-byte wire layout.
    pub fn encode(&self) -> [u8; CAMERA_STATE_SIZE] {
        let mut buf = [0u8; CAMERA_STATE_SIZE];
        let values = self
            .position
            .iter()
            .chain(&self.focal_point)
            .chain(&self.view_up);
        for (chunk, value) in buf.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        buf
    }

    /// Decode from the 36-byte wire layout.
    pub fn decode(buf: &[u8; CAMERA_STATE_SIZE]) -> Self {
        let mut values = [0f32; 9];
        for (value, chunk) in values.iter_mut().zip(buf.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self {
            position: [values[0], values[1], values[2]],
            focal_point: [values[3], values[4], values[5]],
            view_up: [values[6], values[7], values[8]],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CameraState {
        CameraState::new([1.5, -2.0, 10.25], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0])
    }

    #[test]
    fn test_roundtrip_exact() {
        let states = [
            sample(),
            CameraState::default(),
            CameraState::new(
                [f32::MAX, f32::MIN_POSITIVE, -0.0],
                [1e-30, -1e30, 3.14159],
                [f32::EPSILON, 0.5, -0.5],
            ),
        ];
        for state in states {
            assert_eq!(CameraState::decode(&state.encode()), state);
        }
    }

    #[test]
    fn test_layout_is_position_focal_up() {
        let bytes = sample().encode();
        assert_eq!(&bytes[0..4], &1.5f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &10.25f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0.0f32.to_le_bytes());
        assert_eq!(&bytes[28..32], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_decode_known_bytes() {
        let mut bytes = [0u8; CAMERA_STATE_SIZE];
        bytes[32..36].copy_from_slice(&7.0f32.to_le_bytes());
        let state = CameraState::decode(&bytes);
        assert_eq!(state.view_up, [0.0, 0.0, 7.0]);
        assert_eq!(state.position, [0.0; 3]);
    }
}
