//! Configuration for the test phase

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use grader_common::{AppResult, GraderError};
use sisyphus::config::command_from_env;

/// Execution configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Runtime command, program first (e.g. `["java"]`)
    pub java: Vec<String>,

    /// Directory holding the compatibility library jars
    pub library_dir: PathBuf,

    /// Wall-clock limit for one attempt in milliseconds
    pub timeout_ms: u64,

    /// Retries granted to a test whose attempts time out
    pub max_retries: u32,

    /// Delay between a timed-out attempt and its retry in milliseconds
    pub retry_backoff_ms: u64,

    /// Concurrent tests per project (0 = unbounded)
    pub max_concurrent_tests: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            java: vec!["java".to_string()],
            library_dir: PathBuf::from("./mixins"),
            timeout_ms: 10_000,
            max_retries: crate::runner::DEFAULT_MAX_RETRIES,
            retry_backoff_ms: 100,
            max_concurrent_tests: 0,
        }
    }
}

impl ExecutionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        if let Some(java) = command_from_env("JAVA_BIN") {
            config.java = java;
        }
        Ok(config)
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// A variable that is set but does not parse is rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            java: defaults.java,
            library_dir: lookup("MIXINS_LIB_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.library_dir),
            timeout_ms: parse_or(&lookup, "TEST_TIMEOUT_MS", defaults.timeout_ms)?,
            max_retries: parse_or(&lookup, "MAX_RETRIES", defaults.max_retries)?,
            retry_backoff_ms: parse_or(&lookup, "RETRY_BACKOFF_MS", defaults.retry_backoff_ms)?,
            max_concurrent_tests: parse_or(
                &lookup,
                "MAX_CONCURRENT_TESTS",
                defaults.max_concurrent_tests,
            )?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> AppResult<T> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| {
            GraderError::ConfigError(format!(
                "Invalid value for environment variable {key}: {value:?}"
            ))
        }),
        None => Ok(default),
    }
}
