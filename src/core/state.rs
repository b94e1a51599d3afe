//! Shared run state observed by the producer, every worker and the aggregator.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Lifecycle of one attack run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Loading = 1,
    Running = 2,
    Found = 3,
    Exhausted = 4,
    Cancelled = 5,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Loading,
            2 => Phase::Running,
            3 => Phase::Found,
            4 => Phase::Exhausted,
            5 => Phase::Cancelled,
            _ => Phase::Idle,
        }
    }
}

/// Cancellation flag, attempt counter and phase of a run.
///
/// The cancel flag only ever goes from false to true.
#[derive(Debug)]
pub struct CrackState {
    cancelled: AtomicBool,
    attempts: AtomicU64,
    phase: AtomicU8,
    started: Mutex<Option<Instant>>,
}

impl Default for CrackState {
    fn default() -> Self {
        Self::new()
    }
}

impl CrackState {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
            phase: AtomicU8::new(Phase::Idle as u8),
            started: Mutex::new(None),
        }
    }

    /// Stop the run. Used both for a found password and for user interrupts.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Count one tested candidate, returns the new total
    pub fn record_attempt(&self) -> u64 {
        self.attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub(crate) fn mark_started(&self) -> Instant {
        let now = Instant::now();
        *self.started.lock() = Some(now);
        now
    }

    /// Time since the run left `Idle`
    pub fn elapsed(&self) -> Duration {
        self.started
            .lock()
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }
}
