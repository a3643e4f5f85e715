//! Application configuration management
//!
//! Configuration is read from environment variables (and a `.env` file when
//! present) once at startup. The compile and test sections are owned by
//! their crates; this module adds the batch layout around them.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use minos::ExecutionConfig;
use sisyphus::CompilerConfig;

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_COMPILES, DEFAULT_MIXINS_PATH, DEFAULT_PROJECTS_DIR, DEFAULT_TESTS_DIR,
};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub batch: BatchConfig,
    pub compiler: CompilerConfig,
    pub execution: ExecutionConfig,
}

/// Where a batch reads its inputs and writes its report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Project group to grade
    pub group: String,
    pub projects_dir: PathBuf,
    pub tests_dir: PathBuf,
    pub mixins_path: PathBuf,
    /// Optional destination of the JSON report
    pub report_path: Option<PathBuf>,
    /// Concurrent compiles (0 = unbounded)
    pub max_concurrent_compiles: usize,
    /// Emit JSON log lines
    pub json_logs: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            batch: BatchConfig::from_lookup(|key| env::var(key).ok())?,
            compiler: CompilerConfig::from_env(),
            execution: ExecutionConfig::from_env()?,
        })
    }
}

impl BatchConfig {
    /// Build the batch section from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let group = lookup("PROJECT_GROUP")
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .ok_or_else(|| ConfigError::Missing("PROJECT_GROUP".to_string()))?;

        if group.contains(['/', '\\']) || group == ".." {
            return Err(ConfigError::InvalidValue("PROJECT_GROUP".to_string()));
        }

        let path = |key: &str, default: &str| {
            PathBuf::from(lookup(key).unwrap_or_else(|| default.to_string()))
        };

        Ok(Self {
            group,
            projects_dir: path("PROJECTS_DIR", DEFAULT_PROJECTS_DIR),
            tests_dir: path("TESTS_DIR", DEFAULT_TESTS_DIR),
            mixins_path: path("MIXINS_PATH", DEFAULT_MIXINS_PATH),
            report_path: lookup("REPORT_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            max_concurrent_compiles: parse_or(
                &lookup,
                "MAX_CONCURRENT_COMPILES",
                DEFAULT_MAX_CONCURRENT_COMPILES,
            )?,
            json_logs: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Directory holding the group's project checkouts
    pub fn group_dir(&self) -> PathBuf {
        self.projects_dir.join(&self.group)
    }

    /// Test document of the group
    pub fn tests_path(&self) -> PathBuf {
        self.tests_dir.join(format!("{}.json", self.group))
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Section(#[from] grader_common::GraderError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = BatchConfig::from_lookup(lookup(&[("PROJECT_GROUP", "lab1")])).unwrap();

        assert_eq!(config.group, "lab1");
        assert_eq!(config.group_dir(), PathBuf::from("./projects/lab1"));
        assert_eq!(config.tests_path(), PathBuf::from("./tests/lab1.json"));
        assert_eq!(config.mixins_path, PathBuf::from(DEFAULT_MIXINS_PATH));
        assert_eq!(config.report_path, None);
        assert_eq!(config.max_concurrent_compiles, 0);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_group_is_required() {
        let err = BatchConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key == "PROJECT_GROUP"));

        let err = BatchConfig::from_lookup(lookup(&[("PROJECT_GROUP", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_group_cannot_escape_projects_dir() {
        let err = BatchConfig::from_lookup(lookup(&[("PROJECT_GROUP", "../etc")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_overrides() {
        let config = BatchConfig::from_lookup(lookup(&[
            ("PROJECT_GROUP", "lab2"),
            ("PROJECTS_DIR", "/srv/projects"),
            ("REPORT_PATH", "/tmp/report.json"),
            ("MAX_CONCURRENT_COMPILES", "4"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.group_dir(), PathBuf::from("/srv/projects/lab2"));
        assert_eq!(config.report_path, Some(PathBuf::from("/tmp/report.json")));
        assert_eq!(config.max_concurrent_compiles, 4);
        assert!(config.json_logs);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = BatchConfig::from_lookup(lookup(&[
            ("PROJECT_GROUP", "lab3"),
            ("MAX_CONCURRENT_COMPILES", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key) if key == "MAX_CONCURRENT_COMPILES"));
    }
}
