// SPDX-License-Identifier: GPL-3.0-only

//! Clocks and callback schedulers driving a detection session
//!
//! The detector never sleeps or spawns on its own. It asks a [`Scheduler`]
//! for timers and receives their firings back as
//! [`SessionEvent::Timer`](super::session::SessionEvent) values, each tagged
//! with the [`TimerId`] it was issued under. That makes cancellation exact:
//! a firing whose id the session no longer holds is simply ignored.
//!
//! [`TokioScheduler`] posts firings into a channel for real runs;
//! [`ManualScheduler`] keeps them in a list so tests can step time by hand.

use super::session::SessionEvent;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::trace;

/// Monotonic millisecond clock
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Milliseconds since the clock was created
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Identity of one scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// What a timer firing means to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Recurring progress update
    Progress,
    /// One-shot end of measurement
    Timeout,
    /// One-shot end of the exposure settling delay
    Settle,
    /// Per-frame sampling callback
    Frame,
}

/// Timer and frame-callback source
pub trait Scheduler {
    /// Fire `kind` every `period`, first after one period
    fn every(&mut self, period: Duration, kind: TimerKind) -> TimerId;

    /// Fire `kind` once after `delay`
    fn after(&mut self, delay: Duration, kind: TimerKind) -> TimerId;

    /// Fire [`TimerKind::Frame`] once at the next frame boundary
    fn next_frame(&mut self) -> TimerId;

    /// Cancel a timer; unknown or already fired ids are ignored
    fn cancel(&mut self, id: TimerId);
}

/// Scheduler backed by tokio timer tasks
///
/// Must be used from within a tokio runtime.
pub struct TokioScheduler {
    events: UnboundedSender<SessionEvent>,
    frame_interval: Duration,
    next_id: u64,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    /// Scheduler plus the receiving end of its event channel
    pub fn new(frame_interval: Duration) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded();
        let scheduler = Self {
            events,
            frame_interval,
            next_id: 0,
            tasks: HashMap::new(),
        };
        (scheduler, receiver)
    }

    /// Sender for injecting events such as [`SessionEvent::Stop`]
    pub fn sender(&self) -> UnboundedSender<SessionEvent> {
        self.events.clone()
    }

    fn allocate(&mut self) -> TimerId {
        self.next_id += 1;
        self.tasks.retain(|_, task| !task.is_finished());
        TimerId(self.next_id)
    }
}

impl Scheduler for TokioScheduler {
    fn every(&mut self, period: Duration, kind: TimerKind) -> TimerId {
        let id = self.allocate();
        let events = self.events.clone();
        let period = period.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.unbounded_send(SessionEvent::Timer { id, kind }).is_err() {
                    break;
                }
            }
        });
        self.tasks.insert(id, task);
        id
    }

    fn after(&mut self, delay: Duration, kind: TimerKind) -> TimerId {
        let id = self.allocate();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.unbounded_send(SessionEvent::Timer { id, kind });
        });
        self.tasks.insert(id, task);
        id
    }

    fn next_frame(&mut self) -> TimerId {
        self.after(self.frame_interval, TimerKind::Frame)
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
            trace!(?id, "Cancelled timer task");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

#[derive(Debug, Clone)]
struct PendingTimer {
    id: TimerId,
    kind: TimerKind,
    due_ms: u64,
    period_ms: Option<u64>,
}

/// Scheduler for deterministic stepping in tests and replays
///
/// Due times are computed from the shared [`ManualClock`] when a timer is
/// scheduled. [`pop_due`](Self::pop_due) hands out firings in due order
/// (ties in scheduling order).
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    frame_interval: Duration,
    next_id: u64,
    pending: Vec<PendingTimer>,
    cancelled: u64,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock, frame_interval: Duration) -> Self {
        Self {
            clock,
            frame_interval,
            next_id: 0,
            pending: Vec::new(),
            cancelled: 0,
        }
    }

    /// Timers still waiting to fire
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether a timer of `kind` is waiting
    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending.iter().any(|t| t.kind == kind)
    }

    /// Timers cancelled so far
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    /// Earliest firing due at or before `until_ms`
    ///
    /// Returns the due time with the event; recurring timers are re-armed.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(u64, SessionEvent)> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by_key(|(_, t)| (t.due_ms, t.id))
            .map(|(i, _)| i)?;

        let timer = &mut self.pending[index];
        let due = timer.due_ms;
        let event = SessionEvent::Timer {
            id: timer.id,
            kind: timer.kind,
        };
        match timer.period_ms {
            Some(period) => timer.due_ms += period,
            None => {
                self.pending.remove(index);
            }
        }
        Some((due, event))
    }

    fn push(&mut self, delay: Duration, kind: TimerKind, period_ms: Option<u64>) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push(PendingTimer {
            id,
            kind,
            due_ms: self.clock.now_millis() + delay.as_millis() as u64,
            period_ms,
        });
        id
    }
}

impl Scheduler for ManualScheduler {
    fn every(&mut self, period: Duration, kind: TimerKind) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.push(period, kind, Some(period.as_millis() as u64))
    }

    fn after(&mut self, delay: Duration, kind: TimerKind) -> TimerId {
        self.push(delay, kind, None)
    }

    fn next_frame(&mut self) -> TimerId {
        self.push(self.frame_interval, TimerKind::Frame, None)
    }

    fn cancel(&mut self, id: TimerId) {
        let before = self.pending.len();
        self.pending.retain(|t| t.id != id);
        if self.pending.len() != before {
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new(5);
        let other = clock.clone();
        clock.advance(10);
        assert_eq!(other.now_millis(), 15);
        other.set(100);
        assert_eq!(clock.now_millis(), 100);
    }

    #[test]
    fn test_manual_scheduler_orders_and_rearms() {
        let clock = ManualClock::new(0);
        let mut scheduler = ManualScheduler::new(clock.clone(), Duration::from_millis(33));

        let progress = scheduler.every(Duration::from_millis(100), TimerKind::Progress);
        let timeout = scheduler.after(Duration::from_millis(250), TimerKind::Timeout);

        let fired: Vec<_> = std::iter::from_fn(|| scheduler.pop_due(300)).collect();

        assert_eq!(
            fired,
            vec![
                (100, SessionEvent::Timer { id: progress, kind: TimerKind::Progress }),
                (200, SessionEvent::Timer { id: progress, kind: TimerKind::Progress }),
                (250, SessionEvent::Timer { id: timeout, kind: TimerKind::Timeout }),
                (300, SessionEvent::Timer { id: progress, kind: TimerKind::Progress }),
            ]
        );
        assert_eq!(scheduler.pending(), 1);

        scheduler.cancel(progress);
        scheduler.cancel(progress);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.cancelled(), 1);
    }

    #[test]
    fn test_next_frame_uses_frame_interval() {
        let clock = ManualClock::new(1_000);
        let mut scheduler = ManualScheduler::new(clock, Duration::from_millis(33));
        let id = scheduler.next_frame();
        assert!(scheduler.pop_due(1_032).is_none());
        assert_eq!(
            scheduler.pop_due(1_033),
            Some((1_033, SessionEvent::Timer { id, kind: TimerKind::Frame }))
        );
    }

    #[tokio::test]
    async fn test_tokio_scheduler_delivers_and_cancels() {
        let (mut scheduler, mut events) = TokioScheduler::new(Duration::from_millis(10));

        let frame = scheduler.next_frame();
        let cancelled = scheduler.after(Duration::from_millis(5), TimerKind::Settle);
        scheduler.cancel(cancelled);

        let event = events.next().await;
        assert_eq!(event, Some(SessionEvent::Timer { id: frame, kind: TimerKind::Frame }));
    }
}
