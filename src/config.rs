//! Tunables for the session, pipeline, and parallel-fetch path.
//!
//! Every field here corresponds to an environment variable named in the
//! spec's external-interfaces section; `Config::from_env` reads them
//! explicitly (no derive-based env parser) so a malformed value fails
//! loudly instead of silently falling back to the default.

use std::env::VarError;
use std::time::Duration;

/// Runtime configuration for a [`crate::Client`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Period between `KeepAlive` RPCs. Default 5s.
    pub keepalive_interval: Duration,
    /// Consecutive keep-alive failures before the session moves to `Broken`.
    /// Default 3.
    pub keepalive_failure_limit: u32,
    /// Idle sleep between iterations when no symbols are available. Default
    /// 50ms.
    pub idle_poll_interval: Duration,
    /// Bounded retry count for the per-iteration coherence check. Default 3.
    pub coherence_retry_limit: u32,
    /// Enable the fixed worker-pool fan-out for per-iteration fetches.
    /// Default false.
    pub use_parallel_reads: bool,
    /// Minimum active-symbol count before parallel fetch kicks in. Default 2.
    pub parallel_threshold: usize,
    /// Worker count for the parallel-fetch pool. Default 4.
    pub parallel_workers: usize,
    /// Hard override that disables parallel reads regardless of
    /// `use_parallel_reads`. Default false.
    pub disable_parallel_reads: bool,
    /// Prefer `GetRaw` over `GetNormalized`. Default true.
    pub prefer_raw: bool,
    /// Chunk size advertised to the server on each `GetWaveform` call.
    /// Default 8192.
    pub chunk_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_millis(5000),
            keepalive_failure_limit: 3,
            idle_poll_interval: Duration::from_millis(50),
            coherence_retry_limit: 3,
            use_parallel_reads: false,
            parallel_threshold: 2,
            parallel_workers: 4,
            disable_parallel_reads: false,
            prefer_raw: true,
            chunk_size: 8192,
        }
    }
}

/// A configuration environment variable held an unparseable value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid value for {var}: {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

impl Config {
    /// Build a `Config` from defaults overridden by environment variables.
    ///
    /// Recognized variables: `USE_PARALLEL_READS`, `PARALLEL_THRESHOLD`,
    /// `PARALLEL_WORKERS`, `DISABLE_PARALLEL_READS`,
    /// `HSI_KEEPALIVE_INTERVAL_MS`, `HSI_KEEPALIVE_FAILURE_LIMIT`,
    /// `HSI_IDLE_POLL_MS`, `HSI_COHERENCE_RETRY_LIMIT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(v) = read_bool("USE_PARALLEL_READS")? {
            cfg.use_parallel_reads = v;
        }
        if let Some(v) = read_usize("PARALLEL_THRESHOLD")? {
            cfg.parallel_threshold = v;
        }
        if let Some(v) = read_usize("PARALLEL_WORKERS")? {
            cfg.parallel_workers = v;
        }
        if let Some(v) = read_bool("DISABLE_PARALLEL_READS")? {
            cfg.disable_parallel_reads = v;
        }
        if let Some(v) = read_u64("HSI_KEEPALIVE_INTERVAL_MS")? {
            cfg.keepalive_interval = Duration::from_millis(v);
        }
        if let Some(v) = read_u32("HSI_KEEPALIVE_FAILURE_LIMIT")? {
            cfg.keepalive_failure_limit = v;
        }
        if let Some(v) = read_u64("HSI_IDLE_POLL_MS")? {
            cfg.idle_poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = read_u32("HSI_COHERENCE_RETRY_LIMIT")? {
            cfg.coherence_retry_limit = v;
        }
        Ok(cfg)
    }

    /// Whether a fetch of `symbol_count` symbols should use the parallel
    /// worker pool.
    pub fn should_parallelize(&self, symbol_count: usize) -> bool {
        self.use_parallel_reads && !self.disable_parallel_reads && symbol_count >= self.parallel_threshold
    }
}

fn read_raw(var: &'static str) -> Result<Option<String>, ConfigError> {
    match std::env::var(var) {
        Ok(s) => Ok(Some(s)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(raw)) => Err(ConfigError {
            var,
            value: raw.to_string_lossy().into_owned(),
        }),
    }
}

fn read_bool(var: &'static str) -> Result<Option<bool>, ConfigError> {
    let Some(s) = read_raw(var)? else { return Ok(None) };
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError { var, value: s }),
    }
}

fn read_usize(var: &'static str) -> Result<Option<usize>, ConfigError> {
    let Some(s) = read_raw(var)? else { return Ok(None) };
    s.trim()
        .parse::<usize>()
        .map(Some)
        .map_err(|_| ConfigError { var, value: s })
}

fn read_u32(var: &'static str) -> Result<Option<u32>, ConfigError> {
    let Some(s) = read_raw(var)? else { return Ok(None) };
    s.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ConfigError { var, value: s })
}

fn read_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(s) = read_raw(var)? else { return Ok(None) };
    s.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError { var, value: s })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.keepalive_interval, Duration::from_millis(5000));
        assert_eq!(cfg.keepalive_failure_limit, 3);
        assert_eq!(cfg.idle_poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.coherence_retry_limit, 3);
        assert_eq!(cfg.parallel_threshold, 2);
        assert_eq!(cfg.parallel_workers, 4);
        assert!(!cfg.use_parallel_reads);
    }

    #[test]
    fn should_parallelize_respects_disable_override() {
        let mut cfg = Config {
            use_parallel_reads: true,
            disable_parallel_reads: true,
            ..Config::default()
        };
        assert!(!cfg.should_parallelize(10));
        cfg.disable_parallel_reads = false;
        assert!(cfg.should_parallelize(10));
        assert!(!cfg.should_parallelize(1));
    }

    #[test]
    fn read_bool_rejects_garbage() {
        // SAFETY: tests run single-threaded within this process for env
        // mutation purposes is not guaranteed by cargo test, so scope the
        // var name uniquely to this test to avoid cross-test interference.
        std::env::set_var("HSI_TEST_BOOL_GARBAGE", "maybe");
        let err = read_bool("HSI_TEST_BOOL_GARBAGE").unwrap_err();
        assert_eq!(err.var, "HSI_TEST_BOOL_GARBAGE");
        std::env::remove_var("HSI_TEST_BOOL_GARBAGE");
    }
}
