//! Common types used across the autograder crates.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GraderError;

/// Identifier of a submitted project.
///
/// Rendered as `{ordinal}-{owner}-{name}`, which is also the name of the
/// project's working directory. Ordering follows the submission ordinal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectId {
    pub ordinal: u32,
    pub owner: String,
    pub name: String,
}

impl ProjectId {
    pub fn new(ordinal: u32, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ordinal,
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.ordinal, self.owner, self.name)
    }
}

impl FromStr for ProjectId {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GraderError::ConfigError(format!("Invalid project identifier: {s}"));

        let (ordinal, rest) = s.split_once('-').ok_or_else(invalid)?;
        let (owner, name) = rest.split_once('-').ok_or_else(invalid)?;
        let parsed = ordinal.parse::<u32>().map_err(|_| invalid())?;

        // Only the canonical spelling round-trips through Display.
        if parsed.to_string() != ordinal {
            return Err(invalid());
        }

        if owner.is_empty() || name.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(parsed, owner, name))
    }
}

impl Serialize for ProjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A project registered for a batch run
#[derive(Debug, Clone)]
pub struct Project {
    pub id: ProjectId,
    /// Working directory holding the project's source tree
    pub root: PathBuf,
    pub status: CompileStatus,
}

impl Project {
    pub fn new(id: ProjectId, root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            root: root.into(),
            status: CompileStatus::Pending,
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self.status, CompileStatus::Compiled)
    }
}

/// Compilation status of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompileStatus {
    /// Registered, not yet compiled
    Pending,
    /// Compilation in progress
    Compiling,
    /// Compilation successful
    Compiled,
    /// Compilation failed; the project is excluded from testing
    Failed { reason: CompileFailure },
}

impl fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileStatus::Pending => write!(f, "PENDING"),
            CompileStatus::Compiling => write!(f, "COMPILING"),
            CompileStatus::Compiled => write!(f, "COMPILED"),
            CompileStatus::Failed { reason } => write!(f, "FAILED ({})", reason.code()),
        }
    }
}

/// Why a project did not reach the test phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompileFailure {
    /// No file carries a runnable entry point
    MainNotFound,
    /// A source file could not be patched
    InjectionFailed { path: PathBuf, message: String },
    /// The compiler exited unsuccessfully
    CompileError {
        exit_code: Option<i32>,
        diagnostics: String,
    },
}

impl CompileFailure {
    /// Get short code for the failure
    pub fn code(&self) -> &'static str {
        match self {
            CompileFailure::MainNotFound => "MAIN_NOT_FOUND",
            CompileFailure::InjectionFailed { .. } => "INJECTION_FAILED",
            CompileFailure::CompileError { .. } => "COMPILE_ERROR",
        }
    }
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileFailure::MainNotFound => write!(f, "no entry point found"),
            CompileFailure::InjectionFailed { path, message } => {
                write!(f, "mixin injection failed for {}: {}", path.display(), message)
            }
            CompileFailure::CompileError {
                exit_code,
                diagnostics,
            } => match exit_code {
                Some(code) => write!(f, "compiler exited with code {code}: {diagnostics}"),
                None => write!(f, "compiler failed: {diagnostics}"),
            },
        }
    }
}

/// A single stdin/stdout test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Position in the batch's test list (0-indexed)
    pub ordinal: usize,
    pub input: String,
    pub expected_output: String,
}

impl TestCase {
    pub fn new(ordinal: usize, input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            ordinal,
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// Verdict for a single test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Normalized output equals the expected output
    Passed,
    /// Output differs; carries the normalized actual output
    Mismatch { actual: String },
    /// The entry point disappeared after compilation
    MainNotFound,
    /// Every attempt exceeded the wall-clock timeout
    Timeout,
    /// Abnormal termination with no usable output
    RuntimeFailure { exit_code: i32 },
}

impl Verdict {
    /// Get short code for verdict
    pub fn code(&self) -> &'static str {
        match self {
            Verdict::Passed => "PASS",
            Verdict::Mismatch { .. } => "WA",
            Verdict::MainNotFound => "NOMAIN",
            Verdict::Timeout => "TLE",
            Verdict::RuntimeFailure { .. } => "RE",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Terminal result of running one test case against one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Ordinal of the test case this outcome belongs to
    pub ordinal: usize,

    pub verdict: Verdict,

    /// Raw captured output of the final attempt (if any)
    pub output: Option<String>,

    /// Exit code of the final attempt; informational only
    pub exit_code: Option<i32>,

    /// Number of process spawns spent on this test
    pub attempts: u32,
}

impl TestOutcome {
    pub fn passed(ordinal: usize, output: String, exit_code: Option<i32>, attempts: u32) -> Self {
        Self {
            ordinal,
            verdict: Verdict::Passed,
            output: Some(output),
            exit_code,
            attempts,
        }
    }

    pub fn mismatch(
        ordinal: usize,
        actual: String,
        output: String,
        exit_code: Option<i32>,
        attempts: u32,
    ) -> Self {
        Self {
            ordinal,
            verdict: Verdict::Mismatch { actual },
            output: Some(output),
            exit_code,
            attempts,
        }
    }

    pub fn main_not_found(ordinal: usize) -> Self {
        Self {
            ordinal,
            verdict: Verdict::MainNotFound,
            output: None,
            exit_code: None,
            attempts: 0,
        }
    }

    pub fn timeout(ordinal: usize, attempts: u32) -> Self {
        Self {
            ordinal,
            verdict: Verdict::Timeout,
            output: None,
            exit_code: None,
            attempts,
        }
    }

    pub fn runtime_failure(ordinal: usize, exit_code: i32, attempts: u32) -> Self {
        Self {
            ordinal,
            verdict: Verdict::RuntimeFailure { exit_code },
            output: None,
            exit_code: Some(exit_code),
            attempts,
        }
    }
}

/// Outcomes of every test case for one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project: ProjectId,

    /// Outcomes in test-ordinal order
    pub outcomes: Vec<TestOutcome>,

    pub passed: usize,

    pub failed: usize,
}

impl ProjectReport {
    /// Build a report from outcomes collected in any order
    pub fn from_outcomes(project: ProjectId, mut outcomes: Vec<TestOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.ordinal);

        let passed = outcomes.iter().filter(|o| o.verdict.is_pass()).count();
        let failed = outcomes.len() - passed;

        Self {
            project,
            outcomes,
            passed,
            failed,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// Terminal artifact of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Reports of every project that compiled, keyed by project id
    pub projects: BTreeMap<ProjectId, ProjectReport>,

    /// Projects that never reached testing, with the reason
    pub compile_failures: BTreeMap<ProjectId, CompileFailure>,
}

impl BatchReport {
    pub fn project(&self, id: &ProjectId) -> Option<&ProjectReport> {
        self.projects.get(id)
    }

    pub fn total_passed(&self) -> usize {
        self.projects.values().map(|r| r.passed).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.projects.values().map(|r| r.failed).sum()
    }
}
