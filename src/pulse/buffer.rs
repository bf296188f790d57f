// SPDX-License-Identifier: GPL-3.0-only

//! Bounded sliding window of red-channel samples

use crate::constants::signal::MAX_SAMPLES;
use std::collections::VecDeque;
use tracing::warn;

/// One accepted measurement from the sampling region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Mean red channel over the region
    pub average_red: f64,
    /// Clock time the frame was sampled at
    pub timestamp_ms: u64,
}

/// FIFO of samples with a fixed capacity
///
/// Values and timestamps live in the same entry, so eviction always removes
/// both together.
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for SignalBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SAMPLES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full
    ///
    /// Timestamps never go backwards: an out-of-order sample is clamped to
    /// the newest timestamp already held.
    pub fn append(&mut self, mut sample: Sample) -> Option<Sample> {
        if let Some(last) = self.samples.back() {
            if sample.timestamp_ms < last.timestamp_ms {
                warn!(
                    timestamp = sample.timestamp_ms,
                    newest = last.timestamp_ms,
                    "Sample timestamp went backwards, clamping"
                );
                sample.timestamp_ms = last.timestamp_ms;
            }
        }

        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Red values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.average_red).collect()
    }

    /// Timestamps, oldest first
    pub fn timestamps(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.timestamp_ms).collect()
    }

    pub fn oldest(&self) -> Option<&Sample> {
        self.samples.front()
    }

    pub fn newest(&self) -> Option<&Sample> {
        self.samples.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(average_red: f64, timestamp_ms: u64) -> Sample {
        Sample {
            average_red,
            timestamp_ms,
        }
    }

    #[test]
    fn test_evicts_oldest_past_capacity() {
        let mut buffer = SignalBuffer::new();
        for i in 0..MAX_SAMPLES as u64 {
            assert!(buffer.append(sample(i as f64, i * 33)).is_none());
        }
        assert_eq!(buffer.len(), 450);

        let evicted = buffer.append(sample(1000.0, 450 * 33));
        assert_eq!(evicted, Some(sample(0.0, 0)));
        assert_eq!(buffer.len(), 450);
        assert_eq!(buffer.oldest(), Some(&sample(1.0, 33)));
        assert_eq!(buffer.newest(), Some(&sample(1000.0, 450 * 33)));
        assert_eq!(buffer.values().len(), buffer.timestamps().len());
    }

    #[test]
    fn test_backwards_timestamp_is_clamped() {
        let mut buffer = SignalBuffer::with_capacity(4);
        buffer.append(sample(1.0, 100));
        buffer.append(sample(2.0, 90));
        assert_eq!(buffer.timestamps(), vec![100, 100]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = SignalBuffer::with_capacity(2);
        buffer.append(sample(1.0, 1));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 2);
    }
}
