// SPDX-License-Identifier: GPL-3.0-only

//! Photoplethysmographic pulse detection
//!
//! A fingertip pressed over the lens, lit by the torch, modulates the red
//! channel with every heartbeat. [`sampler`] turns frames into red samples,
//! [`buffer`] keeps the recent window, [`estimator`] finds the beat interval
//! and [`session`] runs the timed measurement around them.

pub mod buffer;
pub mod estimator;
pub mod sampler;
pub mod scheduler;
pub mod session;

pub use buffer::{Sample, SignalBuffer};
pub use estimator::BpmEstimator;
pub use sampler::{RegionSampler, RegionStats, RejectReason, SampleOutcome};
pub use scheduler::{
    Clock, ManualClock, ManualScheduler, Scheduler, SystemClock, TimerId, TimerKind,
    TokioScheduler,
};
pub use session::{DetectionSnapshot, PulseDetector, SessionEvent, SessionStatus};
