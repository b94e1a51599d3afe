//! Runtime configuration for attack runs.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000_000;
pub const DEFAULT_DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Bounds applied to every configured wait
pub const MIN_WAIT: Duration = Duration::from_millis(1);
pub const MAX_WAIT: Duration = Duration::from_secs(60);

/// Cracker configuration.
#[derive(Debug, Clone)]
pub struct CrackerConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Capacity of the candidate queue between producer and workers.
    pub queue_capacity: usize,
    /// How long a worker waits for a candidate before re-checking cancellation.
    pub dequeue_timeout: Duration,
    /// Interval between throughput reports.
    pub report_interval: Duration,
    /// Directory that receives `<ssid>.cracked` and `<ssid>.pmks` files.
    pub output_dir: PathBuf,
}

impl Default for CrackerConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get().max(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dequeue_timeout: DEFAULT_DEQUEUE_TIMEOUT,
            report_interval: DEFAULT_REPORT_INTERVAL,
            output_dir: PathBuf::from("."),
        }
    }
}

impl CrackerConfig {
    /// Defaults overridden by `HALFWPA_*` environment variables.
    ///
    /// Unparseable values fall back to the default for that field.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let threads = env::var("HALFWPA_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.threads);
        let queue_capacity = env::var("HALFWPA_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.queue_capacity);
        let dequeue_timeout = wait_millis(
            env::var("HALFWPA_DEQUEUE_TIMEOUT_MS").ok().as_deref(),
            defaults.dequeue_timeout,
        );
        let report_interval = wait_millis(
            env::var("HALFWPA_REPORT_INTERVAL_MS").ok().as_deref(),
            defaults.report_interval,
        );
        let output_dir = env::var("HALFWPA_OUTPUT_DIR")
            .ok()
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        Self {
            threads,
            queue_capacity,
            dequeue_timeout,
            report_interval,
            output_dir,
        }
    }

    /// Override the worker count (0 keeps the current value).
    pub fn with_threads(mut self, threads: usize) -> Self {
        if threads > 0 {
            self.threads = threads;
        }
        self
    }

    /// Override the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

/// Parse a millisecond count, clamped to `MIN_WAIT..=MAX_WAIT`
fn wait_millis(value: Option<&str>, default: Duration) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
        .clamp(MIN_WAIT, MAX_WAIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrackerConfig::default();
        assert!(config.threads >= 1);
        assert_eq!(config.queue_capacity, 1_000_000);
        assert_eq!(config.dequeue_timeout, Duration::from_secs(1));
        assert_eq!(config.report_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_zero_threads_ignored() {
        let config = CrackerConfig::default().with_threads(3).with_threads(0);
        assert_eq!(config.threads, 3);
    }

    #[test]
    fn test_wait_millis_is_clamped() {
        let default = Duration::from_secs(1);
        assert_eq!(wait_millis(Some("250"), default), Duration::from_millis(250));
        assert_eq!(wait_millis(Some("0"), default), MIN_WAIT);
        assert_eq!(wait_millis(Some("18446744073709551615"), default), MAX_WAIT);
        assert_eq!(wait_millis(Some("soon"), default), default);
        assert_eq!(wait_millis(None, default), default);
    }
}
