// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::constants::camera::{IDEAL_HEIGHT, IDEAL_WIDTH};
use std::sync::Arc;
use std::time::Instant;

/// Which way the requested camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    /// Facing the user (selfie)
    User,
    /// Facing away from the user
    #[default]
    Environment,
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::User => write!(f, "front"),
            FacingMode::Environment => write!(f, "rear"),
        }
    }
}

/// What the caller asks of a camera stream
///
/// Width and height are ideals: providers pick the closest mode they have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl StreamConstraints {
    /// Rear camera at 1280x720, the fingertip measurement setup
    pub fn rear_hd() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: IDEAL_WIDTH,
            ideal_height: IDEAL_HEIGHT,
        }
    }
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self::rear_hd()
    }
}

/// A camera device discovered on the system
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Human-readable name (V4L2 card)
    pub name: String,
    /// Device path (e.g., /dev/video0)
    pub path: String,
    /// Device index from enumeration
    pub index: usize,
}

/// One decoded video frame in RGBA
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels, `stride` bytes per row
    pub data: Arc<[u8]>,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a frame from tightly packed RGBA data
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data),
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }

    /// Frame filled with a single colour
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = (width * height) as usize;
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Self::from_rgba(width, height, data)
    }

    /// Whether the pixel buffer is fully populated for the declared dimensions
    pub fn has_pixel_data(&self) -> bool {
        if self.width == 0 || self.height == 0 || self.stride < self.width * 4 {
            return false;
        }
        let required = (self.height as usize - 1) * self.stride as usize + self.width as usize * 4;
        self.data.len() >= required
    }

    /// RGBA bytes of one row, without stride padding
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        &self.data[start..start + self.width as usize * 4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_frame_layout() {
        let frame = CameraFrame::solid(3, 2, [10, 20, 30]);
        assert_eq!(frame.stride, 12);
        assert_eq!(frame.data.len(), 24);
        assert_eq!(&frame.row(1)[4..8], &[10, 20, 30, 255]);
        assert!(frame.has_pixel_data());
    }

    #[test]
    fn test_truncated_frame_has_no_pixel_data() {
        let frame = CameraFrame::from_rgba(4, 4, vec![0; 20]);
        assert!(!frame.has_pixel_data());

        let empty = CameraFrame::from_rgba(0, 0, Vec::new());
        assert!(!empty.has_pixel_data());
    }

    #[test]
    fn test_row_skips_stride_padding() {
        let data: Vec<u8> = vec![
            255, 0, 0, 255, // Red pixel
            0, 0, // stride padding
            0, 0, 255, 255, // Blue pixel
            0, 0, // stride padding
        ];
        let frame = CameraFrame {
            width: 1,
            height: 2,
            data: Arc::from(data.as_slice()),
            stride: 6,
            captured_at: Instant::now(),
        };
        assert!(frame.has_pixel_data());
        assert_eq!(frame.row(1), &[0, 0, 255, 255]);
    }
}
