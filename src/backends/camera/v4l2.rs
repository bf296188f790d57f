// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera provider
//!
//! Opens a capture device with the v4l crate, negotiates the format closest
//! to the requested resolution (MJPEG preferred, YUYV fallback) and decodes
//! frames to RGBA on a capture thread. Only the newest frame is kept.
//!
//! V4L2 has no notion of facing: the configured device is used as the rear
//! camera.

use super::format_converters::CaptureFormat;
use super::frame_loop::{CaptureLoopController, FrameSlot, LoopAction};
use super::types::*;
use super::{CameraProvider, CameraStream};
use crate::constants::camera::{
    PLAYBACK_POLL_MS, PLAYBACK_TIMEOUT_SECS, STREAM_BUFFERS, TORCH_INTENSITY,
};
use crate::constants::timing::FRAME_LOG_INTERVAL;
use crate::errors::{CameraError, CameraResult};
use crate::flash::Torch;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// List V4L2 capture devices
pub fn enumerate_devices() -> Vec<CameraDevice> {
    let mut devices: Vec<CameraDevice> = v4l::context::enum_devices()
        .into_iter()
        .map(|node| CameraDevice {
            name: node.name().unwrap_or_else(|| "Unknown camera".to_string()),
            path: node.path().to_string_lossy().to_string(),
            index: node.index(),
        })
        .collect();
    devices.sort_by_key(|d| d.index);
    devices
}

/// Camera provider backed by a V4L2 device node
pub struct V4l2Camera {
    device_path: String,
}

impl V4l2Camera {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }

    /// Open the node and set the best supported format
    fn open_device(
        &self,
        constraints: &StreamConstraints,
    ) -> CameraResult<(Device, u32, u32, CaptureFormat)> {
        let dev = Device::with_path(&self.device_path)?;

        let supported: Vec<[u8; 4]> = dev
            .enum_formats()
            .map_err(|e| CameraError::InitializationFailed(e.to_string()))?
            .into_iter()
            .map(|desc| desc.fourcc.repr)
            .collect();

        let capture_format = CaptureFormat::PREFERRED
            .into_iter()
            .find(|f| supported.contains(&f.fourcc()))
            .ok_or_else(|| {
                CameraError::FormatNotSupported(format!(
                    "{} offers neither MJPEG nor YUYV",
                    self.device_path
                ))
            })?;

        let requested = Format::new(
            constraints.ideal_width,
            constraints.ideal_height,
            FourCC::new(&capture_format.fourcc()),
        );
        let actual = dev
            .set_format(&requested)
            .map_err(|e| CameraError::InitializationFailed(format!("set format: {}", e)))?;

        let actual_format = CaptureFormat::from_fourcc(&actual.fourcc.repr).ok_or_else(|| {
            CameraError::FormatNotSupported(format!("device switched to {:?}", actual.fourcc))
        })?;

        info!(
            device = %self.device_path,
            width = actual.width,
            height = actual.height,
            format = ?actual_format,
            "Negotiated V4L2 capture format"
        );

        Ok((dev, actual.width, actual.height, actual_format))
    }
}

impl CameraProvider for V4l2Camera {
    type Stream = V4l2Stream;

    async fn open(&mut self, constraints: &StreamConstraints) -> CameraResult<V4l2Stream> {
        debug!(facing = %constraints.facing, "V4L2 ignores facing, using configured device");

        let (dev, width, height, format) = self.open_device(constraints)?;
        let slot = FrameSlot::new();
        let writer = slot.clone();

        let capture = CaptureLoopController::start_with_init(
            &format!("v4l2-capture {}", self.device_path),
            move || {
                let stream = Stream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS)
                    .map_err(|e| format!("Failed to create buffer stream: {}", e))?;
                Ok((dev, stream, 0u64))
            },
            move |(_dev, stream, frame_count)| {
                capture_one(stream, frame_count, width, height, format, &writer)
            },
        );

        Ok(V4l2Stream {
            slot,
            capture: Some(capture),
            torch: Torch::detect(TORCH_INTENSITY),
        })
    }

    fn name(&self) -> &str {
        "v4l2"
    }
}

/// Dequeue, decode and publish one buffer
fn capture_one(
    stream: &mut Stream<'static>,
    frame_count: &mut u64,
    width: u32,
    height: u32,
    format: CaptureFormat,
    slot: &FrameSlot,
) -> LoopAction {
    let captured_at = Instant::now();
    let (buf, meta) = match stream.next() {
        Ok(next) => next,
        Err(e) => {
            warn!(error = %e, "Failed to dequeue V4L2 buffer");
            std::thread::sleep(Duration::from_millis(10));
            return LoopAction::Continue;
        }
    };

    let used = (meta.bytesused as usize).min(buf.len());
    let payload = if used > 0 { &buf[..used] } else { buf };

    match format.to_rgba(payload, width, height) {
        Ok(rgba) => {
            let mut frame = CameraFrame::from_rgba(width, height, rgba);
            frame.captured_at = captured_at;
            slot.publish(frame);
            *frame_count += 1;
            if *frame_count % FRAME_LOG_INTERVAL == 0 {
                trace!(
                    frame = *frame_count,
                    sequence = meta.sequence,
                    decode_us = captured_at.elapsed().as_micros(),
                    "Captured V4L2 frame"
                );
            }
        }
        Err(e) => debug!(error = %e, "Dropping undecodable frame"),
    }

    LoopAction::Continue
}

/// Live stream from a [`V4l2Camera`]
pub struct V4l2Stream {
    slot: FrameSlot,
    capture: Option<CaptureLoopController>,
    torch: Torch,
}

impl CameraStream for V4l2Stream {
    async fn wait_until_playing(&mut self) -> CameraResult<()> {
        let deadline = Instant::now() + Duration::from_secs(PLAYBACK_TIMEOUT_SECS);
        loop {
            if self.slot.published() > 0 {
                info!("V4L2 stream is playing");
                return Ok(());
            }
            let running = self.capture.as_ref().is_some_and(|c| c.is_running());
            if !running {
                return Err(CameraError::Disconnected);
            }
            if Instant::now() >= deadline {
                return Err(CameraError::PlaybackTimeout);
            }
            tokio::time::sleep(Duration::from_millis(PLAYBACK_POLL_MS)).await;
        }
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        self.slot.latest()
    }

    fn supports_torch(&self) -> bool {
        self.torch.is_available()
    }

    fn set_torch(&mut self, on: bool) -> CameraResult<()> {
        self.torch.set(on).map_err(CameraError::from)
    }

    fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.slot.clear();
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}
