// SPDX-License-Identifier: GPL-3.0-only
//! Capture thread lifecycle and latest-frame hand-off
//!
//! Device backends decode frames on their own thread and publish only the
//! newest one into a [`FrameSlot`]. The detector reads the slot once per
//! frame tick; older frames are simply overwritten.

use super::types::CameraFrame;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Newest decoded frame, shared between a capture thread and its reader
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    frame: Arc<Mutex<Option<CameraFrame>>>,
    published: Arc<AtomicU64>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame
    pub fn publish(&self, frame: CameraFrame) {
        let mut slot = self.frame.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(frame);
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Clone of the current frame
    pub fn latest(&self) -> Option<CameraFrame> {
        self.frame
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Frames published since creation
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Drop the current frame
    pub fn clear(&self) {
        *self.frame.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

/// Controller for a capture loop running in a separate thread
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Start a capture loop with initialization
    ///
    /// `init_fn` runs once on the new thread to set up resources (e.g. map
    /// device buffers). If it fails the thread exits immediately. `loop_fn`
    /// then runs until it returns [`LoopAction::Stop`] or [`stop`](Self::stop)
    /// is called.
    pub fn start_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Self
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            let mut state = match init_fn() {
                Ok(s) => s,
                Err(e) => {
                    warn!(name = %name_clone, error = %e, "Capture loop initialization failed");
                    return;
                }
            };

            while !stop_signal_clone.load(Ordering::SeqCst) {
                if loop_fn(&mut state) == LoopAction::Stop {
                    debug!(name = %name_clone, "Loop requested stop");
                    break;
                }
            }

            info!(name = %name_clone, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!(name = %self.name, "Capture loop thread panicked");
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_loop_publishes_until_stopped() {
        let slot = FrameSlot::new();
        let writer = slot.clone();

        let mut controller = CaptureLoopController::start_with_init(
            "test-publish",
            || Ok(0u8),
            move |shade| {
                *shade = shade.wrapping_add(1);
                writer.publish(CameraFrame::solid(2, 2, [*shade, 0, 0]));
                thread::sleep(Duration::from_millis(5));
                LoopAction::Continue
            },
        );

        thread::sleep(Duration::from_millis(40));
        controller.stop();

        assert!(!controller.is_running());
        assert!(slot.published() > 0);
        assert!(slot.latest().is_some());
    }

    #[test]
    fn test_init_failure_never_runs_loop() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let mut controller = CaptureLoopController::start_with_init(
            "test-fail-init",
            || Err::<(), _>("device busy".to_string()),
            move |_: &mut ()| {
                ran_clone.store(true, Ordering::SeqCst);
                LoopAction::Stop
            },
        );

        controller.stop();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_clear_empties_slot() {
        let slot = FrameSlot::new();
        slot.publish(CameraFrame::solid(1, 1, [1, 2, 3]));
        slot.clear();
        assert!(slot.latest().is_none());
        assert_eq!(slot.published(), 1);
    }
}
