// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic pulse camera
//!
//! Renders a uniform fingertip-coloured frame whose red channel carries a
//! triangular pulse train at a fixed heart rate. Frames are computed from the
//! injected clock at the moment they are read, so a manual clock gives fully
//! reproducible sessions without hardware.

use super::types::*;
use super::{CameraProvider, CameraStream};
use crate::errors::{CameraError, CameraResult};
use crate::pulse::scheduler::Clock;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Red-channel rise per millisecond towards a pulse peak
const PULSE_SLOPE_PER_MS: f64 = 1.0;

/// Shared device state, visible from the camera and all of its streams
#[derive(Debug, Default)]
struct DeviceState {
    open_streams: usize,
    streams_opened: usize,
    torch_on: bool,
}

/// Virtual camera producing a known pulse
#[derive(Clone)]
pub struct SyntheticPulseCamera<C> {
    clock: C,
    bpm: f64,
    base_rgb: [u8; 3],
    amplitude: f64,
    width: u32,
    height: u32,
    has_torch: bool,
    state: Arc<Mutex<DeviceState>>,
}

impl<C: Clock + Clone> SyntheticPulseCamera<C> {
    /// Pulse at `bpm` on a mid-brightness red background
    pub fn new(bpm: f64, clock: C) -> Self {
        Self {
            clock,
            bpm,
            base_rgb: [120, 80, 80],
            amplitude: 100.0,
            width: 320,
            height: 240,
            has_torch: true,
            state: Arc::new(Mutex::new(DeviceState::default())),
        }
    }

    /// Background colour between pulses
    pub fn with_base_color(mut self, rgb: [u8; 3]) -> Self {
        self.base_rgb = rgb;
        self
    }

    /// Peak red-channel rise above the background
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude.max(0.0);
        self
    }

    /// Native frame size
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Whether the virtual device advertises a torch
    pub fn with_torch(mut self, has_torch: bool) -> Self {
        self.has_torch = has_torch;
        self
    }

    /// Streams currently open
    pub fn open_streams(&self) -> usize {
        lock(&self.state).open_streams
    }

    /// Streams opened over the camera's lifetime
    pub fn streams_opened(&self) -> usize {
        lock(&self.state).streams_opened
    }

    /// Whether the virtual torch is lit
    pub fn torch_on(&self) -> bool {
        lock(&self.state).torch_on
    }

    /// Red channel value at time `t_ms`
    pub fn red_at(&self, t_ms: u64) -> f64 {
        let base = f64::from(self.base_rgb[0]);
        if self.bpm <= 0.0 {
            return base;
        }
        let period = 60_000.0 / self.bpm;
        let offset = (t_ms as f64 % period) - period / 2.0;
        let rise = (self.amplitude - offset.abs() * PULSE_SLOPE_PER_MS).max(0.0);
        base + rise
    }

    fn render(&self, t_ms: u64) -> CameraFrame {
        let red = self.red_at(t_ms).round().clamp(0.0, 255.0) as u8;
        CameraFrame::solid(
            self.width,
            self.height,
            [red, self.base_rgb[1], self.base_rgb[2]],
        )
    }
}

impl<C: Clock + Clone> CameraProvider for SyntheticPulseCamera<C> {
    type Stream = SyntheticStream<C>;

    async fn open(&mut self, constraints: &StreamConstraints) -> CameraResult<SyntheticStream<C>> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::FormatNotSupported(format!(
                "synthetic camera has no frame size ({}x{})",
                self.width, self.height
            )));
        }

        {
            let mut state = lock(&self.state);
            state.open_streams += 1;
            state.streams_opened += 1;
        }

        info!(
            bpm = self.bpm,
            width = self.width,
            height = self.height,
            requested_width = constraints.ideal_width,
            requested_height = constraints.ideal_height,
            "Opened synthetic pulse stream"
        );

        Ok(SyntheticStream {
            camera: self.clone(),
            stopped: false,
        })
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Stream of a [`SyntheticPulseCamera`]
pub struct SyntheticStream<C> {
    camera: SyntheticPulseCamera<C>,
    stopped: bool,
}

impl<C: Clock + Clone> CameraStream for SyntheticStream<C> {
    async fn wait_until_playing(&mut self) -> CameraResult<()> {
        if self.stopped {
            return Err(CameraError::Disconnected);
        }
        Ok(())
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        if self.stopped {
            return None;
        }
        Some(self.camera.render(self.camera.clock.now_millis()))
    }

    fn supports_torch(&self) -> bool {
        self.camera.has_torch
    }

    fn set_torch(&mut self, on: bool) -> CameraResult<()> {
        if !self.camera.has_torch {
            return Err(CameraError::InitializationFailed(
                "synthetic camera has no torch".to_string(),
            ));
        }
        lock(&self.camera.state).torch_on = on;
        debug!(on, "Synthetic torch toggled");
        Ok(())
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let mut state = lock(&self.camera.state);
        state.open_streams = state.open_streams.saturating_sub(1);
        debug!("Synthetic stream stopped");
    }
}

impl<C> Drop for SyntheticStream<C> {
    fn drop(&mut self) {
        if !self.stopped {
            let mut state = lock(&self.camera.state);
            state.open_streams = state.open_streams.saturating_sub(1);
        }
    }
}

fn lock(state: &Mutex<DeviceState>) -> MutexGuard<'_, DeviceState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::scheduler::ManualClock;

    #[test]
    fn test_pulse_peaks_mid_period() {
        let camera = SyntheticPulseCamera::new(75.0, ManualClock::new(0));
        // 75 BPM => 800 ms period, peak at 400 ms
        assert_eq!(camera.red_at(400), 220.0);
        assert_eq!(camera.red_at(350), 170.0);
        assert_eq!(camera.red_at(100), 120.0);
        assert_eq!(camera.red_at(1200), 220.0);
    }

    #[tokio::test]
    async fn test_stream_tracks_device_state() {
        let clock = ManualClock::new(400);
        let mut camera = SyntheticPulseCamera::new(75.0, clock.clone()).with_resolution(6, 6);
        let observer = camera.clone();

        let mut stream = camera.open(&StreamConstraints::rear_hd()).await.unwrap();
        assert_eq!(observer.open_streams(), 1);

        stream.set_torch(true).unwrap();
        assert!(observer.torch_on());

        let frame = stream.current_frame().unwrap();
        assert_eq!(&frame.row(0)[0..3], &[220, 80, 80]);

        stream.stop();
        stream.stop();
        assert_eq!(observer.open_streams(), 0);
        assert!(stream.current_frame().is_none());
    }
}
