// SPDX-License-Identifier: GPL-3.0-only

//! Detection session state machine
//!
//! ```text
//!            start_detection            PlaybackStarted
//!   Idle ─────────────────────▶ Acquiring ─────────────────▶ Detecting
//!    ▲                              │                            │
//!    │                  AcquisitionFailed              Timeout / Stop
//!    │                              ▼                            ▼
//!    └──────── start_detection ── Stopped ◀──────────────────────┘
//! ```
//!
//! Every input (playback start, acquisition failure, timer firing, stop
//! request) enters through [`PulseDetector::transition`]. A session owns at
//! most three timers: the progress ticker, the overall timeout and the frame
//! loop (first the settling delay, then one frame callback at a time).
//! Teardown cancels all three and releases the stream, and runs on every
//! exit path: timeout, stop, acquisition failure and drop.

use super::buffer::SignalBuffer;
use super::estimator::BpmEstimator;
use super::sampler::{RegionSampler, SampleOutcome};
use super::scheduler::{Clock, ManualClock, ManualScheduler, Scheduler, TimerId, TimerKind};
use crate::backends::camera::{CameraAcquisition, CameraProvider, CameraStream, StreamHandle};
use crate::config::SessionConfig;
use crate::constants::is_plausible_bpm;
use crate::constants::signal::MIN_SAMPLES;
use crate::constants::timing::FRAME_LOG_INTERVAL;
use crate::errors::{CameraError, PulseError, PulseResult};
use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use tracing::{debug, info, trace, warn};

/// Lifecycle state of the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    /// Waiting for the camera to open and start playing
    Acquiring,
    /// Sampling frames
    Detecting,
    /// Session over; the snapshot holds the outcome
    Stopped,
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The stream delivered its first frame
    PlaybackStarted,
    /// The camera could not be opened or never started playing
    AcquisitionFailed(CameraError),
    /// A scheduled timer fired
    Timer { id: TimerId, kind: TimerKind },
    /// The user asked to stop
    Stop,
}

/// Externally observable detector state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionSnapshot {
    pub status: SessionStatus,
    /// Latest plausible live estimate, 0 until one is published
    pub current_bpm: u32,
    /// Set only when a session reaches its timeout with a plausible result
    pub final_bpm: Option<u32>,
    pub is_detecting: bool,
    /// Elapsed share of the measurement, 0 to 100
    pub progress_percent: f64,
    pub error: Option<PulseError>,
    /// Accepted samples currently buffered
    pub samples: usize,
}

/// Resources of one running session
struct DetectionSession<S> {
    start_time_ms: u64,
    stream: Option<StreamHandle<S>>,
    buffer: SignalBuffer,
    progress_timer: Option<TimerId>,
    timeout_timer: Option<TimerId>,
    frame_loop: Option<TimerId>,
    frames: u64,
    rejected: u64,
}

impl<S> DetectionSession<S> {
    fn new(now_ms: u64) -> Self {
        Self {
            start_time_ms: now_ms,
            stream: None,
            buffer: SignalBuffer::new(),
            progress_timer: None,
            timeout_timer: None,
            frame_loop: None,
            frames: 0,
            rejected: 0,
        }
    }
}

/// Fingertip pulse detector
///
/// Generic over where frames come from (`P`), how timers are delivered
/// (`S`) and what time it is (`C`).
pub struct PulseDetector<P, S, C>
where
    P: CameraProvider,
    S: Scheduler,
    C: Clock,
{
    acquisition: CameraAcquisition<P>,
    scheduler: S,
    clock: C,
    config: SessionConfig,
    sampler: RegionSampler,
    estimator: BpmEstimator,
    session: Option<DetectionSession<P::Stream>>,
    snapshot: DetectionSnapshot,
}

impl<P, S, C> PulseDetector<P, S, C>
where
    P: CameraProvider,
    S: Scheduler,
    C: Clock,
{
    pub fn new(provider: P, scheduler: S, clock: C, config: SessionConfig) -> Self {
        let acquisition = CameraAcquisition::new(provider).with_torch(config.torch);
        Self {
            acquisition,
            scheduler,
            clock,
            config,
            sampler: RegionSampler::new(),
            estimator: BpmEstimator::new(),
            session: None,
            snapshot: DetectionSnapshot::default(),
        }
    }

    pub fn snapshot(&self) -> &DetectionSnapshot {
        &self.snapshot
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot.status
    }

    /// Acquiring or detecting
    pub fn is_active(&self) -> bool {
        matches!(
            self.snapshot.status,
            SessionStatus::Acquiring | SessionStatus::Detecting
        )
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Whether the current session holds an open stream
    pub fn has_stream(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.stream.is_some())
    }

    /// Open the camera and begin a measurement
    ///
    /// Resolves once the stream is playing and the timers are armed, or with
    /// the acquisition error. Fails with [`PulseError::SessionActive`] while
    /// another session is running; that session is left untouched.
    pub async fn start_detection(&mut self) -> PulseResult<()> {
        if self.is_active() {
            warn!(status = ?self.snapshot.status, "Detection already running");
            return Err(PulseError::SessionActive);
        }

        self.snapshot = DetectionSnapshot {
            status: SessionStatus::Acquiring,
            is_detecting: true,
            ..DetectionSnapshot::default()
        };
        self.session = Some(DetectionSession::new(self.clock.now_millis()));
        info!(
            duration_ms = self.config.duration_ms(),
            provider = self.acquisition.provider().name(),
            "Starting pulse detection"
        );

        let handle = match self.acquisition.open().await {
            Ok(handle) => handle,
            Err(e) => {
                self.transition(SessionEvent::AcquisitionFailed(e.clone()));
                return Err(PulseError::Permission(e));
            }
        };

        let playing = match self.session.as_mut() {
            Some(session) => {
                let handle = session.stream.insert(handle);
                handle.stream_mut().wait_until_playing().await
            }
            None => Err(CameraError::Disconnected),
        };

        match playing {
            Ok(()) => {
                self.transition(SessionEvent::PlaybackStarted);
                Ok(())
            }
            Err(e) => {
                self.transition(SessionEvent::AcquisitionFailed(e.clone()));
                Err(PulseError::Permission(e))
            }
        }
    }

    /// End the session without a result; a no-op when nothing is running
    pub fn stop_detection(&mut self) {
        if self.session.is_none() {
            return;
        }
        info!(samples = self.snapshot.samples, "Stopping pulse detection");
        self.teardown();
        self.snapshot.status = SessionStatus::Stopped;
        self.snapshot.is_detecting = false;
    }

    /// Feed one event into the state machine
    pub fn transition(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PlaybackStarted => self.on_playback_started(),
            SessionEvent::AcquisitionFailed(error) => self.on_acquisition_failed(error),
            SessionEvent::Timer { id, kind } => self.on_timer(id, kind),
            SessionEvent::Stop => self.stop_detection(),
        }
    }

    /// Pump events until the session ends or the channel closes
    ///
    /// `on_update` sees the snapshot after every event.
    pub async fn run_until_stopped(
        &mut self,
        events: &mut UnboundedReceiver<SessionEvent>,
        mut on_update: impl FnMut(&DetectionSnapshot),
    ) {
        while self.is_active() {
            let Some(event) = events.next().await else {
                debug!("Event channel closed");
                self.stop_detection();
                break;
            };
            self.transition(event);
            on_update(&self.snapshot);
        }
    }

    fn on_playback_started(&mut self) {
        if self.snapshot.status != SessionStatus::Acquiring {
            trace!(status = ?self.snapshot.status, "Ignoring playback start");
            return;
        }
        let now = self.clock.now_millis();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.start_time_ms = now;
        session.progress_timer = Some(
            self.scheduler
                .every(self.config.progress_interval, TimerKind::Progress),
        );
        session.timeout_timer = Some(self.scheduler.after(self.config.duration, TimerKind::Timeout));
        session.frame_loop = Some(
            self.scheduler
                .after(self.config.settle_delay, TimerKind::Settle),
        );

        self.snapshot.status = SessionStatus::Detecting;
        info!(start_ms = now, "Camera playing, detection started");
    }

    fn on_acquisition_failed(&mut self, error: CameraError) {
        if self.snapshot.status != SessionStatus::Acquiring {
            trace!(status = ?self.snapshot.status, "Ignoring acquisition failure");
            return;
        }
        warn!(error = %error, "Camera acquisition failed");
        self.teardown();
        self.snapshot.status = SessionStatus::Stopped;
        self.snapshot.is_detecting = false;
        self.snapshot.final_bpm = None;
        self.snapshot.error = Some(PulseError::Permission(error));
    }

    fn on_timer(&mut self, id: TimerId, kind: TimerKind) {
        if self.snapshot.status != SessionStatus::Detecting {
            trace!(?id, ?kind, "Timer fired outside detection");
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let held = match kind {
            TimerKind::Progress => session.progress_timer,
            TimerKind::Timeout => session.timeout_timer,
            TimerKind::Settle | TimerKind::Frame => session.frame_loop,
        };
        if held != Some(id) {
            trace!(?id, ?kind, "Ignoring stale timer");
            return;
        }

        match kind {
            TimerKind::Progress => self.on_progress(),
            TimerKind::Timeout => self.on_timeout(),
            TimerKind::Settle | TimerKind::Frame => self.on_frame(),
        }
    }

    fn on_progress(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let elapsed = self.clock.now_millis().saturating_sub(session.start_time_ms);
        let duration = self.config.duration_ms().max(1);
        self.snapshot.progress_percent = (elapsed as f64 / duration as f64 * 100.0).min(100.0);
    }

    fn on_frame(&mut self) {
        let now = self.clock.now_millis();
        let Self {
            session,
            scheduler,
            sampler,
            estimator,
            snapshot,
            config,
            ..
        } = self;
        let Some(session) = session.as_mut() else {
            return;
        };

        session.frames += 1;
        let frame = session.stream.as_ref().and_then(|h| h.current_frame());
        match sampler.sample(frame.as_ref(), now) {
            SampleOutcome::Accepted(sample) => {
                session.buffer.append(sample);
                snapshot.samples = session.buffer.len();

                let elapsed = now.saturating_sub(session.start_time_ms);
                let warm = elapsed >= config.publish_warmup.as_millis() as u64;
                if session.buffer.len() >= MIN_SAMPLES && warm {
                    let bpm = estimator.estimate(&session.buffer);
                    if is_plausible_bpm(bpm) {
                        snapshot.current_bpm = bpm.round() as u32;
                    }
                }
            }
            SampleOutcome::Rejected(reason) => {
                session.rejected += 1;
                trace!(?reason, rejected = session.rejected, "Frame not sampled");
            }
        }

        if session.frames % FRAME_LOG_INTERVAL == 0 {
            debug!(
                frames = session.frames,
                samples = session.buffer.len(),
                rejected = session.rejected,
                bpm = snapshot.current_bpm,
                "Frame loop"
            );
        }

        session.frame_loop = Some(scheduler.next_frame());
    }

    fn on_timeout(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.timeout_timer = None;

        let samples = session.buffer.len();
        let outcome = if samples < MIN_SAMPLES {
            Err(PulseError::InsufficientData { samples })
        } else {
            let bpm = self.estimator.estimate(&session.buffer);
            if bpm <= 0.0 {
                Err(PulseError::InsufficientData { samples })
            } else if !is_plausible_bpm(bpm) {
                Err(PulseError::ImplausibleResult { bpm })
            } else {
                Ok(bpm.round() as u32)
            }
        };

        self.teardown();
        self.snapshot.status = SessionStatus::Stopped;
        self.snapshot.is_detecting = false;
        self.snapshot.progress_percent = 100.0;

        match outcome {
            Ok(bpm) => {
                info!(bpm, samples, "Measurement complete");
                self.snapshot.final_bpm = Some(bpm);
                self.snapshot.current_bpm = bpm;
            }
            Err(error) => {
                warn!(error = %error, samples, "Measurement produced no result");
                self.snapshot.final_bpm = None;
                self.snapshot.error = Some(error);
            }
        }
    }

    /// Cancel every timer and release the stream
    fn teardown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        let timers = [
            session.progress_timer.take(),
            session.timeout_timer.take(),
            session.frame_loop.take(),
        ];
        for id in timers.into_iter().flatten() {
            self.scheduler.cancel(id);
        }

        if let Some(handle) = session.stream.take() {
            self.acquisition.close(handle);
        }

        debug!(
            frames = session.frames,
            samples = session.buffer.len(),
            rejected = session.rejected,
            "Session torn down"
        );
    }
}

impl<P: CameraProvider> PulseDetector<P, ManualScheduler, ManualClock> {
    /// Fire every timer due up to `until_ms`, moving the clock along
    pub fn advance_to(&mut self, until_ms: u64) {
        while let Some((due, event)) = self.scheduler.pop_due(until_ms) {
            if due > self.clock.now_millis() {
                self.clock.set(due);
            }
            self.transition(event);
        }
        if until_ms > self.clock.now_millis() {
            self.clock.set(until_ms);
        }
    }

    /// Advance the clock by `ms`, firing due timers
    pub fn advance_by(&mut self, ms: u64) {
        let until = self.clock.now_millis() + ms;
        self.advance_to(until);
    }
}

impl<P, S, C> Drop for PulseDetector<P, S, C>
where
    P: CameraProvider,
    S: Scheduler,
    C: Clock,
{
    fn drop(&mut self) {
        self.stop_detection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::SyntheticPulseCamera;
    use std::time::Duration;

    fn detector(
        camera: SyntheticPulseCamera<ManualClock>,
        clock: &ManualClock,
        seconds: u64,
    ) -> PulseDetector<SyntheticPulseCamera<ManualClock>, ManualScheduler, ManualClock> {
        let scheduler = ManualScheduler::new(clock.clone(), Duration::from_millis(33));
        PulseDetector::new(
            camera,
            scheduler,
            clock.clone(),
            SessionConfig::with_duration_secs(seconds),
        )
    }

    #[tokio::test]
    async fn test_start_arms_three_timers() {
        let clock = ManualClock::new(0);
        let camera = SyntheticPulseCamera::new(75.0, clock.clone());
        let mut detector = detector(camera, &clock, 5);

        detector.start_detection().await.unwrap();
        assert_eq!(detector.status(), SessionStatus::Detecting);
        assert!(detector.snapshot().is_detecting);
        assert_eq!(detector.scheduler().pending(), 3);
        assert!(detector.scheduler().is_pending(TimerKind::Settle));
    }

    #[tokio::test]
    async fn test_progress_is_capped() {
        let clock = ManualClock::new(0);
        let camera = SyntheticPulseCamera::new(75.0, clock.clone());
        let mut detector = detector(camera, &clock, 1);

        detector.start_detection().await.unwrap();
        detector.advance_to(500);
        assert!((detector.snapshot().progress_percent - 50.0).abs() < 1e-9);

        detector.advance_to(5_000);
        assert_eq!(detector.snapshot().progress_percent, 100.0);
        assert_eq!(detector.status(), SessionStatus::Stopped);
    }

    #[tokio::test]
    async fn test_stale_timer_is_ignored() {
        let clock = ManualClock::new(0);
        let camera = SyntheticPulseCamera::new(75.0, clock.clone());
        let mut detector = detector(camera, &clock, 5);
        detector.start_detection().await.unwrap();

        let stale = detector.scheduler_mut().after(Duration::ZERO, TimerKind::Timeout);
        detector.transition(SessionEvent::Timer {
            id: stale,
            kind: TimerKind::Timeout,
        });
        assert_eq!(detector.status(), SessionStatus::Detecting);
    }

    #[tokio::test]
    async fn test_events_before_start_do_nothing() {
        let clock = ManualClock::new(0);
        let camera = SyntheticPulseCamera::new(75.0, clock.clone());
        let mut detector = detector(camera, &clock, 5);

        detector.transition(SessionEvent::PlaybackStarted);
        detector.transition(SessionEvent::Stop);
        assert_eq!(detector.status(), SessionStatus::Idle);
        assert_eq!(detector.scheduler().pending(), 0);
    }
}
