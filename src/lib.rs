// SPDX-License-Identifier: GPL-3.0-only

//! Fingertip Pulse - heart-rate measurement from a fingertip on the camera
//!
//! A finger pressed over the rear camera, lit by the torch, changes colour
//! slightly with every heartbeat. This crate samples that colour, finds the
//! beat interval and runs a timed measurement session around it.
//!
//! # Architecture
//!
//! - [`backends`]: Camera providers (V4L2, synthetic) and stream acquisition
//! - [`pulse`]: Region sampler, signal buffer, BPM estimator and the
//!   detection session state machine
//! - [`flash`]: Torch LED control
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let clock = SystemClock::new();
//! let (scheduler, mut events) = TokioScheduler::new(config.frame_interval);
//! let mut detector = PulseDetector::new(camera, scheduler, clock, config);
//! detector.start_detection().await?;
//! detector.run_until_stopped(&mut events, |_| {}).await;
//! println!("{:?}", detector.snapshot().final_bpm);
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flash;
pub mod pulse;

// Re-export commonly used types
pub use config::{Config, SessionConfig};
pub use errors::{CameraError, PulseError, PulseResult};
pub use pulse::{DetectionSnapshot, PulseDetector, SessionEvent, SessionStatus};
