// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │    PulseDetector    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraAcquisition  │  ← open/close, best-effort torch
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraProvider Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴──────┐
//!       ▼           ▼
//!   ┌──────┐   ┌─────────┐
//!   │ V4L2 │   │Synthetic│
//!   └──────┘   └─────────┘
//! ```

pub mod format_converters;
pub mod frame_loop;
pub mod synthetic;
pub mod types;
pub mod v4l2;

pub use synthetic::SyntheticPulseCamera;
pub use types::*;
pub use v4l2::V4l2Camera;

use crate::errors::CameraResult;
use std::future::Future;
use tracing::{info, warn};

/// A live video stream opened by a [`CameraProvider`]
pub trait CameraStream {
    /// Resolve once the stream is delivering frames
    fn wait_until_playing(&mut self) -> impl Future<Output = CameraResult<()>>;

    /// The most recent frame, or `None` if nothing has been decoded yet
    fn current_frame(&self) -> Option<CameraFrame>;

    /// Whether the device has a constant-illumination (torch) capability
    fn supports_torch(&self) -> bool;

    /// Switch the torch on or off
    fn set_torch(&mut self, on: bool) -> CameraResult<()>;

    /// Stop all tracks and release the device
    fn stop(&mut self);
}

/// Source of camera streams
pub trait CameraProvider {
    type Stream: CameraStream;

    /// Open a stream matching `constraints`
    ///
    /// Fails with [`CameraError::PermissionDenied`](crate::errors::CameraError)
    /// when access is refused and `NoCameraFound` when no device exists.
    fn open(
        &mut self,
        constraints: &StreamConstraints,
    ) -> impl Future<Output = CameraResult<Self::Stream>>;

    /// Short name for logging
    fn name(&self) -> &str;
}

/// An open stream plus whether we switched its torch on
pub struct StreamHandle<S> {
    stream: S,
    torch_enabled: bool,
}

impl<S: CameraStream> StreamHandle<S> {
    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn torch_enabled(&self) -> bool {
        self.torch_enabled
    }

    /// Current frame of the underlying stream
    pub fn current_frame(&self) -> Option<CameraFrame> {
        self.stream.current_frame()
    }
}

/// Opens and closes camera streams for detection sessions
///
/// Illumination is an enhancement: failing to toggle the torch never
/// fails `open` or `close`.
pub struct CameraAcquisition<P> {
    provider: P,
    constraints: StreamConstraints,
    torch: bool,
}

impl<P: CameraProvider> CameraAcquisition<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            constraints: StreamConstraints::rear_hd(),
            torch: true,
        }
    }

    /// Enable or disable the torch attempt
    pub fn with_torch(mut self, torch: bool) -> Self {
        self.torch = torch;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Open a stream and, if supported, switch its torch on
    pub async fn open(&mut self) -> CameraResult<StreamHandle<P::Stream>> {
        info!(
            provider = self.provider.name(),
            facing = %self.constraints.facing,
            width = self.constraints.ideal_width,
            height = self.constraints.ideal_height,
            "Opening camera stream"
        );

        let mut stream = self.provider.open(&self.constraints).await?;

        let mut torch_enabled = false;
        if self.torch && stream.supports_torch() {
            match stream.set_torch(true) {
                Ok(()) => {
                    info!("Torch enabled");
                    torch_enabled = true;
                }
                Err(e) => warn!(error = %e, "Torch not enabled, continuing without illumination"),
            }
        }

        Ok(StreamHandle {
            stream,
            torch_enabled,
        })
    }

    /// Switch the torch off (if we enabled it) and stop the stream
    pub fn close(&mut self, mut handle: StreamHandle<P::Stream>) {
        if handle.torch_enabled {
            if let Err(e) = handle.stream.set_torch(false) {
                warn!(error = %e, "Failed to switch torch off, releasing stream anyway");
            }
            handle.torch_enabled = false;
        }
        handle.stream.stop();
        info!(provider = self.provider.name(), "Camera stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CameraError;

    struct FlakyTorchStream {
        torch_calls: Vec<bool>,
        stopped: bool,
    }

    impl CameraStream for FlakyTorchStream {
        async fn wait_until_playing(&mut self) -> CameraResult<()> {
            Ok(())
        }

        fn current_frame(&self) -> Option<CameraFrame> {
            None
        }

        fn supports_torch(&self) -> bool {
            true
        }

        fn set_torch(&mut self, on: bool) -> CameraResult<()> {
            self.torch_calls.push(on);
            Err(CameraError::InitializationFailed("torch busy".into()))
        }

        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    struct FlakyTorchCamera;

    impl CameraProvider for FlakyTorchCamera {
        type Stream = FlakyTorchStream;

        async fn open(&mut self, _constraints: &StreamConstraints) -> CameraResult<FlakyTorchStream> {
            Ok(FlakyTorchStream {
                torch_calls: Vec::new(),
                stopped: false,
            })
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_torch_failure_does_not_fail_open() {
        let mut acquisition = CameraAcquisition::new(FlakyTorchCamera);
        let handle = acquisition.open().await.expect("open should succeed");
        assert!(!handle.torch_enabled());
        assert_eq!(handle.stream().torch_calls, vec![true]);
    }

    #[tokio::test]
    async fn test_torch_not_attempted_when_disabled() {
        let mut acquisition = CameraAcquisition::new(FlakyTorchCamera).with_torch(false);
        let handle = acquisition.open().await.expect("open should succeed");
        assert!(handle.stream().torch_calls.is_empty());
        acquisition.close(handle);
    }

    #[test]
    fn test_default_constraints_are_rear_hd() {
        let constraints = StreamConstraints::default();
        assert_eq!(constraints.facing, FacingMode::Environment);
        assert_eq!((constraints.ideal_width, constraints.ideal_height), (1280, 720));
    }
}
