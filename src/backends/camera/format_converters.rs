// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for V4L2 capture buffers
//!
//! Webcams usually offer packed YUYV at low resolutions and MJPEG at HD.
//! Both are converted to tightly packed RGBA for the region sampler.

use crate::errors::{CameraError, CameraResult};

/// Capture formats we know how to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    /// Packed YUV 4:2:2: Y0 U Y1 V
    Yuyv,
    /// Motion JPEG, one JPEG image per buffer
    Mjpeg,
}

impl CaptureFormat {
    /// Preference order when negotiating with a device
    ///
    /// MJPEG first: most UVC devices only reach HD at a usable rate with it.
    pub const PREFERRED: [CaptureFormat; 2] = [CaptureFormat::Mjpeg, CaptureFormat::Yuyv];

    /// V4L2 FourCC code
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            CaptureFormat::Yuyv => *b"YUYV",
            CaptureFormat::Mjpeg => *b"MJPG",
        }
    }

    /// Match a FourCC reported by the device
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"YUYV" => Some(CaptureFormat::Yuyv),
            b"MJPG" => Some(CaptureFormat::Mjpeg),
            _ => None,
        }
    }

    /// Decode one capture buffer to RGBA
    pub fn to_rgba(&self, data: &[u8], width: u32, height: u32) -> CameraResult<Vec<u8>> {
        match self {
            CaptureFormat::Yuyv => {
                let expected = (width * height * 2) as usize;
                if data.len() < expected {
                    return Err(CameraError::FormatNotSupported(format!(
                        "short YUYV buffer: {} of {} bytes",
                        data.len(),
                        expected
                    )));
                }
                Ok(yuyv_to_rgba(data, width, height))
            }
            CaptureFormat::Mjpeg => mjpeg_to_rgba(data, width, height),
        }
    }
}

/// Convert YUYV (YUV 4:2:2) to RGBA
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgba = Vec::with_capacity(pixel_count * 4);

    for chunk in data.chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        for y in [y0, y1] {
            if rgba.len() >= pixel_count * 4 {
                break;
            }
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
    }

    rgba
}

/// Decode an MJPEG buffer to RGBA
///
/// Some UVC devices pad buffers or change size on the fly, so the decoded
/// dimensions are checked against the negotiated format.
pub fn mjpeg_to_rgba(data: &[u8], width: u32, height: u32) -> CameraResult<Vec<u8>> {
    let image = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| CameraError::FormatNotSupported(format!("MJPEG decode failed: {}", e)))?;
    let rgba = image.to_rgba8();
    if rgba.width() != width || rgba.height() != height {
        return Err(CameraError::FormatNotSupported(format!(
            "MJPEG frame is {}x{}, expected {}x{}",
            rgba.width(),
            rgba.height(),
            width,
            height
        )));
    }
    Ok(rgba.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgba_white_and_black() {
        // White then black pixel pair sharing neutral chroma
        let yuyv = vec![255u8, 128, 0, 128];
        let rgba = yuyv_to_rgba(&yuyv, 2, 1);

        assert_eq!(rgba.len(), 8);
        assert!(rgba[0] > 250 && rgba[1] > 250 && rgba[2] > 250);
        assert_eq!(&rgba[4..7], &[0, 0, 0]);
        assert_eq!(rgba[3], 255);
        assert_eq!(rgba[7], 255);
    }

    #[test]
    fn test_yuyv_red_chroma_raises_red() {
        // Strong V pushes red up and green down
        let yuyv = vec![100u8, 128, 100, 220];
        let rgba = yuyv_to_rgba(&yuyv, 2, 1);
        assert!(rgba[0] > rgba[1]);
        assert!(rgba[0] > rgba[2]);
    }

    #[test]
    fn test_short_yuyv_buffer_rejected() {
        let result = CaptureFormat::Yuyv.to_rgba(&[0u8; 6], 2, 2);
        assert!(matches!(result, Err(CameraError::FormatNotSupported(_))));
    }

    #[test]
    fn test_mjpeg_roundtrip_through_encoder() {
        let source = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 40, 40]));
        let mut jpeg = Vec::new();
        image::DynamicImage::ImageRgb8(source)
            .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let rgba = mjpeg_to_rgba(&jpeg, 8, 8).unwrap();
        assert_eq!(rgba.len(), 8 * 8 * 4);
        assert!(rgba[0] > 150);

        assert!(mjpeg_to_rgba(&jpeg, 16, 16).is_err());
    }

    #[test]
    fn test_fourcc_lookup() {
        assert_eq!(CaptureFormat::from_fourcc(b"YUYV"), Some(CaptureFormat::Yuyv));
        assert_eq!(CaptureFormat::from_fourcc(b"MJPG"), Some(CaptureFormat::Mjpeg));
        assert_eq!(CaptureFormat::from_fourcc(b"NV12"), None);
    }
}
