// SPDX-License-Identifier: GPL-3.0-only

//! Central-region colour sampling with a finger-contact gate

use super::buffer::Sample;
use crate::backends::camera::CameraFrame;
use crate::constants::sampling::{MAX_BRIGHTNESS, MIN_BRIGHTNESS, REGION_DIVISOR};

/// Mean colour of the sampling region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub mean_red: f64,
    pub mean_green: f64,
    pub mean_blue: f64,
    /// Mean of the three channel means
    pub brightness: f64,
    /// Region side length in pixels
    pub side: u32,
}

/// Why a frame produced no sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// No frame yet, or a frame without usable pixels
    NotReady,
    /// No finger contact (too dark) or sensor saturation (too bright)
    BrightnessOutOfRange { brightness: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    Accepted(Sample),
    Rejected(RejectReason),
}

/// Measures the centred square of a frame
///
/// The square's side is a third of the shorter frame dimension. Its mean
/// brightness must lie strictly between the contact and saturation bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSampler {
    min_brightness: f64,
    max_brightness: f64,
}

impl Default for RegionSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionSampler {
    pub fn new() -> Self {
        Self {
            min_brightness: MIN_BRIGHTNESS,
            max_brightness: MAX_BRIGHTNESS,
        }
    }

    /// Top-left corner and side of the sampling square
    pub fn region(width: u32, height: u32) -> Option<(u32, u32, u32)> {
        let side = width.min(height) / REGION_DIVISOR;
        if side == 0 {
            return None;
        }
        Some(((width - side) / 2, (height - side) / 2, side))
    }

    /// Channel means over the sampling square
    pub fn measure(&self, frame: &CameraFrame) -> Option<RegionStats> {
        if !frame.has_pixel_data() {
            return None;
        }
        let (x, y, side) = Self::region(frame.width, frame.height)?;

        let mut sums = [0u64; 3];
        for row in y..y + side {
            let pixels = &frame.row(row)[x as usize * 4..(x + side) as usize * 4];
            for px in pixels.chunks_exact(4) {
                sums[0] += u64::from(px[0]);
                sums[1] += u64::from(px[1]);
                sums[2] += u64::from(px[2]);
            }
        }

        let count = f64::from(side) * f64::from(side);
        let mean_red = sums[0] as f64 / count;
        let mean_green = sums[1] as f64 / count;
        let mean_blue = sums[2] as f64 / count;
        Some(RegionStats {
            mean_red,
            mean_green,
            mean_blue,
            brightness: (mean_red + mean_green + mean_blue) / 3.0,
            side,
        })
    }

    /// Sample the current frame, or say why it was skipped
    pub fn sample(&self, frame: Option<&CameraFrame>, now_ms: u64) -> SampleOutcome {
        let Some(stats) = frame.and_then(|f| self.measure(f)) else {
            return SampleOutcome::Rejected(RejectReason::NotReady);
        };

        if stats.brightness <= self.min_brightness || stats.brightness >= self.max_brightness {
            return SampleOutcome::Rejected(RejectReason::BrightnessOutOfRange {
                brightness: stats.brightness,
            });
        }

        SampleOutcome::Accepted(Sample {
            average_red: stats.mean_red,
            timestamp_ms: now_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(level: u8) -> CameraFrame {
        CameraFrame::solid(30, 30, [level, level, level])
    }

    #[test]
    fn test_region_is_centred_third_of_short_side() {
        assert_eq!(RegionSampler::region(1280, 720), Some((520, 240, 240)));
        assert_eq!(RegionSampler::region(2, 2), None);
    }

    #[test]
    fn test_brightness_bounds_are_exclusive() {
        let sampler = RegionSampler::new();
        let accepted = |level| matches!(sampler.sample(Some(&gray(level)), 0), SampleOutcome::Accepted(_));

        assert!(!accepted(80));
        assert!(accepted(81));
        assert!(accepted(239));
        assert!(!accepted(240));
    }

    #[test]
    fn test_only_region_pixels_count() {
        // 9x9 frame: region is the 3x3 centre starting at (3, 3)
        let mut data = Vec::new();
        for y in 0..9u32 {
            for x in 0..9u32 {
                let inside = (3..6).contains(&x) && (3..6).contains(&y);
                let px = if inside { [200, 100, 60, 255] } else { [0, 0, 0, 255] };
                data.extend_from_slice(&px);
            }
        }
        let frame = CameraFrame::from_rgba(9, 9, data);

        let stats = RegionSampler::new().measure(&frame).unwrap();
        assert_eq!(stats.side, 3);
        assert_eq!(stats.mean_red, 200.0);
        assert_eq!(stats.brightness, 120.0);

        match RegionSampler::new().sample(Some(&frame), 42) {
            SampleOutcome::Accepted(sample) => {
                assert_eq!(sample.average_red, 200.0);
                assert_eq!(sample.timestamp_ms, 42);
            }
            other => panic!("expected a sample, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_or_empty_frame_is_not_ready() {
        let sampler = RegionSampler::new();
        assert_eq!(sampler.sample(None, 0), SampleOutcome::Rejected(RejectReason::NotReady));

        let empty = CameraFrame::from_rgba(0, 0, Vec::new());
        assert_eq!(
            sampler.sample(Some(&empty), 0),
            SampleOutcome::Rejected(RejectReason::NotReady)
        );

        let truncated = CameraFrame::from_rgba(10, 10, vec![0; 16]);
        assert_eq!(
            sampler.sample(Some(&truncated), 0),
            SampleOutcome::Rejected(RejectReason::NotReady)
        );
    }
}
