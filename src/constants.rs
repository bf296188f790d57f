// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Signal buffer and estimator constants
pub mod signal {
    /// Sliding window capacity (oldest sample evicted beyond this)
    pub const MAX_SAMPLES: usize = 450;

    /// Samples required before an estimate is attempted
    pub const MIN_SAMPLES: usize = 60;

    /// Minimum spacing between two accepted peaks (200 BPM ceiling)
    pub const MIN_PEAK_SPACING_MS: u64 = 300;

    /// Neighbours on each side a peak must strictly exceed
    pub const PEAK_HALF_WINDOW: usize = 2;

    /// Accepted peaks needed for one interval
    pub const MIN_PEAKS: usize = 2;

    /// Lower physiological bound (exclusive)
    pub const MIN_PLAUSIBLE_BPM: f64 = 40.0;

    /// Upper physiological bound (exclusive)
    pub const MAX_PLAUSIBLE_BPM: f64 = 200.0;
}

/// Region sampler constants
pub mod sampling {
    /// Region side as a divisor of the shorter frame dimension
    pub const REGION_DIVISOR: u32 = 3;

    /// Brightness at or below this means no finger contact
    pub const MIN_BRIGHTNESS: f64 = 80.0;

    /// Brightness at or above this means the sensor is saturated
    pub const MAX_BRIGHTNESS: f64 = 240.0;
}

/// Camera acquisition constants
pub mod camera {
    /// Ideal capture width
    pub const IDEAL_WIDTH: u32 = 1280;

    /// Ideal capture height
    pub const IDEAL_HEIGHT: u32 = 720;

    /// Default V4L2 device
    pub const DEFAULT_DEVICE: &str = "/dev/video0";

    /// Number of mmap buffers for V4L2 streaming (keep small for low latency)
    pub const STREAM_BUFFERS: u32 = 4;

    /// How long to wait for the first frame before giving up
    pub const PLAYBACK_TIMEOUT_SECS: u64 = 5;

    /// Poll interval while waiting for the first frame
    pub const PLAYBACK_POLL_MS: u64 = 10;

    /// Torch intensity used during measurement (0.0 - 1.0)
    pub const TORCH_INTENSITY: f32 = 1.0;
}

/// Session timing constants
pub mod timing {
    use super::Duration;

    /// Default measurement duration
    pub const DEFAULT_DURATION_SECS: u32 = 30;

    /// Default frame loop rate
    pub const DEFAULT_FRAME_RATE: u32 = 30;

    /// Progress timer period
    pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

    /// Delay before sampling starts, lets exposure and focus settle
    pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

    /// Elapsed detection time before live BPM is published
    pub const PUBLISH_WARMUP: Duration = Duration::from_millis(3000);

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Frame interval for a given frame rate
pub fn frame_interval(frame_rate: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(frame_rate.max(1)))
}

/// Whether a BPM value lies inside the physiological bound
pub fn is_plausible_bpm(bpm: f64) -> bool {
    bpm > signal::MIN_PLAUSIBLE_BPM && bpm < signal::MAX_PLAUSIBLE_BPM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(30), Duration::from_millis(33));
        assert_eq!(frame_interval(60), Duration::from_millis(16));
        assert_eq!(frame_interval(0), Duration::from_millis(1000));
    }

    #[test]
    fn test_plausible_bounds_are_exclusive() {
        assert!(!is_plausible_bpm(40.0));
        assert!(is_plausible_bpm(40.5));
        assert!(is_plausible_bpm(199.9));
        assert!(!is_plausible_bpm(200.0));
    }
}
