/*!
 * Attack orchestration
 *
 * One producer thread streams candidates into a bounded queue, a pool of
 * worker threads tests them, and the calling thread aggregates results,
 * reports throughput and persists the outcome.
 *
 * ```text
 *  source ──▶ producer ──▶ [ bounded queue ] ──▶ worker × N ──▶ results ──▶ aggregator
 * ```
 *
 * Cancellation (a found password or an interrupt) is a shared flag. Workers
 * check it between candidates and every dequeue waits at most
 * `dequeue_timeout`, so all threads notice within that bound.
 */

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::candidates::{format_pmk_line, run_producer, Candidate, CandidateSource};
use crate::config::{CrackerConfig, MAX_WAIT, MIN_WAIT};
use crate::crypto::{calculate_pmk, Pmk};
use crate::engine::CrackEngine;
use crate::error::{CrackError, Result};
use crate::handshake::Handshake;
use crate::queue::{self, CandidateQueue, Dequeue};
use crate::state::{CrackState, Phase};

const MIN_REPORT_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of testing one candidate
#[derive(Debug)]
pub struct Attempt {
    pub matched: bool,
    pub candidate: Candidate,
}

/// How an attack run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrackOutcome {
    /// Passphrase found
    Found(Vec<u8>),
    /// Every candidate tested, none matched
    Exhausted,
    /// Interrupted before a match
    Cancelled,
}

/// Final report of an attack run
#[derive(Debug, Clone)]
pub struct CrackReport {
    pub outcome: CrackOutcome,
    pub attempts: u64,
    pub elapsed: Duration,
    /// `<ssid>.cracked` file, when the password was found and persisted
    pub result_file: Option<PathBuf>,
}

impl CrackReport {
    pub fn rate(&self) -> f64 {
        rate(self.attempts, self.elapsed)
    }

    pub fn password(&self) -> Option<&[u8]> {
        match &self.outcome {
            CrackOutcome::Found(p) => Some(p),
            _ => None,
        }
    }
}

/// Final report of a PMK precomputation run
#[derive(Debug, Clone)]
pub struct PrecomputeReport {
    /// Lines appended to the cache file
    pub written: u64,
    pub elapsed: Duration,
    pub cache_file: PathBuf,
    pub cancelled: bool,
}

/// Periodic throughput snapshot
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub attempts: u64,
    pub elapsed: Duration,
    /// Attempts per second since the start of the run
    pub rate: f64,
}

fn rate(attempts: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        attempts as f64 / secs
    } else {
        0.0
    }
}

/// Runs one attack (or one precomputation) with a shared state
///
/// The cancel flag never resets, so a coordinator serves a single run.
pub struct Coordinator {
    config: CrackerConfig,
    state: Arc<CrackState>,
}

impl Coordinator {
    pub fn new(config: CrackerConfig) -> Self {
        Self {
            config,
            state: Arc::new(CrackState::new()),
        }
    }

    /// Shared state, for interrupt handlers and observers
    pub fn state(&self) -> Arc<CrackState> {
        Arc::clone(&self.state)
    }

    /// Test candidates from `source` against `handshake` until one matches
    ///
    /// Fails before any thread starts if the handshake cannot be attacked or
    /// the source cannot be opened. A found password is written to
    /// `<output_dir>/<ssid>.cracked`; failing to write it is logged only.
    pub fn crack<P>(
        &self,
        handshake: &Handshake,
        source: CandidateSource,
        on_progress: P,
    ) -> Result<CrackReport>
    where
        P: FnMut(&Progress),
    {
        let engine = Arc::new(CrackEngine::new(handshake)?);
        let feed = source.open()?;
        let bounded = feed.is_bounded();

        let started = self.state.mark_started();
        self.state.set_phase(Phase::Loading);
        tracing::info!(
            "Attacking {} with {} workers",
            handshake.ssid_display(),
            self.config.threads
        );

        let (sink, queue) = queue::bounded(self.config.queue_capacity);
        let queue = Arc::new(queue);

        let producer_state = Arc::clone(&self.state);
        let producer = thread::Builder::new()
            .name("candidate-producer".to_string())
            .spawn(move || run_producer(feed, sink, &producer_state))?;

        let (results_tx, results_rx) = mpsc::channel::<Attempt>();
        let workers = self.spawn_workers(&queue, results_tx, {
            let engine = Arc::clone(&engine);
            move |candidate: Candidate| Attempt {
                matched: engine.test(&candidate),
                candidate,
            }
        })?;
        self.state.set_phase(Phase::Running);

        let mut found: Option<Vec<u8>> = None;
        let mut result_file = None;
        self.aggregate(results_rx, started, on_progress, |attempt| {
            if !attempt.matched || found.is_some() {
                return;
            }
            self.state.cancel();
            tracing::info!("Password found: {}", attempt.candidate.text());

            let passphrase = attempt.candidate.into_passphrase();
            match write_cracked_result(&self.config.output_dir, engine.ssid(), &passphrase) {
                Ok(path) => result_file = Some(path),
                Err(e) => tracing::error!("Failed to save result: {}", e),
            }
            found = Some(passphrase);
        });

        self.finish(workers, queue, producer, bounded);

        let outcome = match found {
            Some(passphrase) => CrackOutcome::Found(passphrase),
            None if self.state.is_cancelled() => CrackOutcome::Cancelled,
            None => CrackOutcome::Exhausted,
        };
        self.state.set_phase(match outcome {
            CrackOutcome::Found(_) => Phase::Found,
            CrackOutcome::Exhausted => Phase::Exhausted,
            CrackOutcome::Cancelled => Phase::Cancelled,
        });

        let report = CrackReport {
            outcome,
            attempts: self.state.attempts(),
            elapsed: started.elapsed(),
            result_file,
        };
        tracing::info!(
            "Run finished after {} attempts in {:.1}s ({:.0}/s)",
            report.attempts,
            report.elapsed.as_secs_f64(),
            report.rate()
        );
        Ok(report)
    }

    /// Derive the PMK of every candidate for `ssid` and append them to a table
    ///
    /// The table defaults to `<output_dir>/<ssid>.pmks` and is opened in
    /// append mode. A PMK table cannot itself be the input.
    pub fn precompute<P>(
        &self,
        ssid: &[u8],
        source: CandidateSource,
        cache_path: Option<&Path>,
        on_progress: P,
    ) -> Result<PrecomputeReport>
    where
        P: FnMut(&Progress),
    {
        if source.is_precomputed() {
            return Err(CrackError::InvalidSource);
        }
        let feed = source.open()?;
        let bounded = feed.is_bounded();

        let cache_file = match cache_path {
            Some(path) => path.to_path_buf(),
            None => self.config.output_dir.join(pmk_cache_file_name(ssid)),
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cache_file)
            .map_err(|e| CrackError::open(&cache_file, e))?;
        let mut writer = BufWriter::new(file);

        let started = self.state.mark_started();
        self.state.set_phase(Phase::Loading);
        tracing::info!(
            "Precomputing PMKs for {} into {}",
            String::from_utf8_lossy(ssid),
            cache_file.display()
        );

        let (sink, queue) = queue::bounded(self.config.queue_capacity);
        let queue = Arc::new(queue);

        let producer_state = Arc::clone(&self.state);
        let producer = thread::Builder::new()
            .name("candidate-producer".to_string())
            .spawn(move || run_producer(feed, sink, &producer_state))?;

        let (results_tx, results_rx) = mpsc::channel::<(Vec<u8>, Pmk)>();
        let salt = ssid.to_vec();
        let workers = self.spawn_workers(&queue, results_tx, move |candidate: Candidate| {
            let pmk = calculate_pmk(candidate.passphrase(), &salt);
            (candidate.into_passphrase(), pmk)
        })?;
        self.state.set_phase(Phase::Running);

        let mut written = 0u64;
        let mut write_error: Option<std::io::Error> = None;
        self.aggregate(results_rx, started, on_progress, |(passphrase, pmk)| {
            if write_error.is_some() {
                return;
            }
            match writer.write_all(&format_pmk_line(&passphrase, &pmk)) {
                Ok(()) => written += 1,
                Err(e) => {
                    self.state.cancel();
                    write_error = Some(e);
                }
            }
        });

        self.finish(workers, queue, producer, bounded);

        let flushed = writer.flush();
        let cancelled = self.state.is_cancelled();
        self.state.set_phase(if cancelled {
            Phase::Cancelled
        } else {
            Phase::Exhausted
        });
        if let Some(e) = write_error {
            return Err(e.into());
        }
        flushed?;

        tracing::info!("Appended {} PMKs to {}", written, cache_file.display());
        Ok(PrecomputeReport {
            written,
            elapsed: started.elapsed(),
            cache_file,
            cancelled,
        })
    }

    /// Start `config.threads` named workers applying `job` to each candidate
    fn spawn_workers<R, F>(
        &self,
        queue: &Arc<CandidateQueue>,
        results: Sender<R>,
        job: F,
    ) -> Result<Vec<JoinHandle<()>>>
    where
        R: Send + 'static,
        F: Fn(Candidate) -> R + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let mut workers = Vec::with_capacity(self.config.threads);

        for id in 0..self.config.threads.max(1) {
            let queue = Arc::clone(queue);
            let state = Arc::clone(&self.state);
            let results = results.clone();
            let job = Arc::clone(&job);
            let timeout = self.config.dequeue_timeout.clamp(MIN_WAIT, MAX_WAIT);

            let spawned = thread::Builder::new()
                .name(format!("crack-worker-{}", id))
                .spawn(move || worker_loop(&queue, &state, &results, timeout, job.as_ref()));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Already running workers exit on the flag
                    self.state.cancel();
                    return Err(e.into());
                }
            }
        }
        Ok(workers)
    }

    /// Consume results until every worker is gone, reporting on an interval
    fn aggregate<R, P, H>(
        &self,
        results: Receiver<R>,
        started: Instant,
        mut on_progress: P,
        mut handle: H,
    ) where
        P: FnMut(&Progress),
        H: FnMut(R),
    {
        let interval = self.config.report_interval.clamp(MIN_REPORT_INTERVAL, MAX_WAIT);
        let mut next_report = Instant::now() + interval;

        loop {
            let wait = next_report.saturating_duration_since(Instant::now());
            match results.recv_timeout(wait) {
                Ok(result) => handle(result),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let now = Instant::now();
            if now >= next_report {
                let attempts = self.state.attempts();
                let elapsed = started.elapsed();
                let progress = Progress {
                    attempts,
                    elapsed,
                    rate: rate(attempts, elapsed),
                };
                tracing::debug!(
                    "{} attempts, {:.0} attempts/s",
                    progress.attempts,
                    progress.rate
                );
                on_progress(&progress);
                next_report = now + interval;
            }
        }
    }

    /// Join workers, release the queue and join the producer if it can end
    ///
    /// A live stream producer may be blocked reading its input, so it is
    /// left detached.
    fn finish(
        &self,
        workers: Vec<JoinHandle<()>>,
        queue: Arc<CandidateQueue>,
        producer: JoinHandle<u64>,
        bounded: bool,
    ) {
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }
        // Last reference: a producer blocked on a full queue now fails its push
        drop(queue);

        if bounded {
            match producer.join() {
                Ok(loaded) => tracing::debug!("Producer loaded {} candidates", loaded),
                Err(_) => tracing::error!("Producer thread panicked"),
            }
        }
    }
}

/// Pull candidates until the queue closes or the run is cancelled
fn worker_loop<R, F>(
    queue: &CandidateQueue,
    state: &CrackState,
    results: &Sender<R>,
    timeout: Duration,
    job: &F,
) where
    F: Fn(Candidate) -> R,
{
    while !state.is_cancelled() {
        match queue.pop(timeout) {
            Dequeue::Candidate(candidate) => {
                let result = job(candidate);
                state.record_attempt();
                if results.send(result).is_err() {
                    break;
                }
            }
            Dequeue::TimedOut => continue,
            Dequeue::Closed => break,
        }
    }
}

/// Make an SSID safe to use as a file name
fn file_stem(ssid: &[u8]) -> String {
    let stem: String = String::from_utf8_lossy(ssid)
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match stem.as_str() {
        "" | "." | ".." => format!("_{}", stem),
        _ => stem,
    }
}

pub fn cracked_file_name(ssid: &[u8]) -> String {
    format!("{}.cracked", file_stem(ssid))
}

pub fn pmk_cache_file_name(ssid: &[u8]) -> String {
    format!("{}.pmks", file_stem(ssid))
}

/// Write `SSID:\t<ssid>` and `PASSWORD:\t<password>` lines to `<dir>/<ssid>.cracked`
pub fn write_cracked_result(
    dir: &Path,
    ssid: &[u8],
    passphrase: &[u8],
) -> std::io::Result<PathBuf> {
    let path = dir.join(cracked_file_name(ssid));
    let mut content = Vec::with_capacity(ssid.len() + passphrase.len() + 18);
    content.extend_from_slice(b"SSID:\t");
    content.extend_from_slice(ssid);
    content.extend_from_slice(b"\nPASSWORD:\t");
    content.extend_from_slice(passphrase);
    content.push(b'\n');
    fs::write(&path, content)?;
    Ok(path)
}
