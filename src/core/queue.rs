//! Bounded candidate queue shared by all workers.
//!
//! A `sync_channel` gives backpressure to the producer. Its receiver sits
//! behind a timed mutex so several workers can consume, and every wait
//! (lock or receive) is bounded by the caller's timeout.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::candidates::Candidate;

/// Producer half. Dropping it closes the queue.
pub struct CandidateSink {
    tx: SyncSender<Candidate>,
}

/// Consumer half, shared by workers through an `Arc`.
pub struct CandidateQueue {
    rx: Mutex<Receiver<Candidate>>,
}

/// Result of a bounded dequeue
#[derive(Debug)]
pub enum Dequeue {
    Candidate(Candidate),
    /// Nothing arrived within the timeout, the producer may still be running
    TimedOut,
    /// Producer finished and the queue is drained
    Closed,
}

/// Create a queue holding at most `capacity` pending candidates
pub fn bounded(capacity: usize) -> (CandidateSink, CandidateQueue) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (CandidateSink { tx }, CandidateQueue { rx: Mutex::new(rx) })
}

impl CandidateSink {
    /// Enqueue, blocking while the queue is full
    ///
    /// Returns false once every consumer is gone.
    pub fn push(&self, candidate: Candidate) -> bool {
        self.tx.send(candidate).is_ok()
    }
}

impl CandidateQueue {
    /// Take the next candidate, waiting at most `timeout`
    pub fn pop(&self, timeout: Duration) -> Dequeue {
        let deadline = Instant::now().checked_add(timeout);
        let Some(rx) = self.rx.try_lock_for(timeout) else {
            return Dequeue::TimedOut;
        };

        let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
        match rx.recv_timeout(remaining) {
            Ok(candidate) => Dequeue::Candidate(candidate),
            Err(RecvTimeoutError::Timeout) => Dequeue::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Dequeue::Closed,
        }
    }
}
