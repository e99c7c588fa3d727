use loadcollect_payload::PayloadConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Run duration used when a collect task does not set `time`.
pub const DEFAULT_TIME: &str = "5s";

/// Requests per second used for a version that does not set `qps`.
pub const DEFAULT_QPS: f64 = 8.0;

/// Added to the run duration to absorb load-generator startup and shutdown.
pub const DEADLINE_MARGIN: Duration = Duration::from_secs(30);

/// Load generator executable, resolved through `PATH` unless absolute.
pub const DEFAULT_LOADGEN: &str = "fortio";

/// What to do with results merged before a collection failed or timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialResultPolicy {
    /// Leave the stored results exactly as they were before the run.
    #[default]
    Discard,
    /// Store whatever had been merged, then report the failure.
    Persist,
}

/// Collector configuration
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub default_time: String,
    pub default_qps: f64,
    pub deadline_margin: Duration,
    pub loadgen: PathBuf,
    pub payload: PayloadConfig,
    pub partial_results: PartialResultPolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            default_time: DEFAULT_TIME.to_string(),
            default_qps: DEFAULT_QPS,
            deadline_margin: DEADLINE_MARGIN,
            loadgen: PathBuf::from(DEFAULT_LOADGEN),
            payload: PayloadConfig::default(),
            partial_results: PartialResultPolicy::default(),
        }
    }
}
