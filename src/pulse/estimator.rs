// SPDX-License-Identifier: GPL-3.0-only

//! Heart-rate estimation from the red-channel signal
//!
//! The signal is mean-centred, then scanned for strict local maxima over a
//! five-sample window. Maxima closer than the minimum spacing to the previous
//! accepted peak are dropped. The rate is derived from the mean interval
//! between the surviving peaks.

use super::buffer::SignalBuffer;
use crate::constants::signal::{MIN_PEAK_SPACING_MS, MIN_PEAKS, MIN_SAMPLES, PEAK_HALF_WINDOW};
use tracing::trace;

/// Peak-interval BPM estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpmEstimator {
    min_samples: usize,
    min_peak_spacing_ms: u64,
}

impl Default for BpmEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl BpmEstimator {
    pub fn new() -> Self {
        Self {
            min_samples: MIN_SAMPLES,
            min_peak_spacing_ms: MIN_PEAK_SPACING_MS,
        }
    }

    /// Estimated BPM, or 0.0 when there is too little signal
    ///
    /// Pure: the buffer is only read.
    pub fn estimate(&self, buffer: &SignalBuffer) -> f64 {
        if buffer.len() < self.min_samples {
            return 0.0;
        }
        let values = buffer.values();
        let timestamps = buffer.timestamps();
        let peaks = detect_peaks(&values, &timestamps, self.min_peak_spacing_ms);
        let bpm = bpm_from_peaks(&peaks);
        trace!(samples = values.len(), peaks = peaks.len(), bpm, "Estimated heart rate");
        bpm
    }
}

/// Timestamps of accepted peaks in the mean-centred signal
///
/// `values` and `timestamps` must have the same length.
pub fn detect_peaks(values: &[f64], timestamps: &[u64], min_spacing_ms: u64) -> Vec<u64> {
    let n = values.len().min(timestamps.len());
    let w = PEAK_HALF_WINDOW;
    if n < 2 * w + 1 {
        return Vec::new();
    }

    let mean = values[..n].iter().sum::<f64>() / n as f64;
    let centred: Vec<f64> = values[..n].iter().map(|v| v - mean).collect();

    let mut peaks: Vec<u64> = Vec::new();
    for i in w..n - w {
        let v = centred[i];
        if v <= 0.0 {
            continue;
        }
        let is_max = (1..=w).all(|d| v > centred[i - d] && v > centred[i + d]);
        if !is_max {
            continue;
        }

        let t = timestamps[i];
        match peaks.last() {
            Some(&last) if t.saturating_sub(last) < min_spacing_ms => {}
            _ => peaks.push(t),
        }
    }
    peaks
}

/// 60000 over the mean peak interval; 0.0 with fewer than two peaks
pub fn bpm_from_peaks(peaks: &[u64]) -> f64 {
    if peaks.len() < MIN_PEAKS {
        return 0.0;
    }
    let (first, last) = (peaks[0], peaks[peaks.len() - 1]);
    let mean_interval = last.saturating_sub(first) as f64 / (peaks.len() - 1) as f64;
    if mean_interval <= 0.0 {
        return 0.0;
    }
    60_000.0 / mean_interval
}
