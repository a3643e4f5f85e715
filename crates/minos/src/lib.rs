//! Minos - test phase of the autograder
//!
//! Runs every test case against each compiled project in a fresh JVM,
//! retries attempts that time out, and judges the captured output.

pub mod config;
pub mod evaluator;
pub mod executor;
pub mod metrics;
pub mod runner;
pub mod verdict;

pub use config::ExecutionConfig;
pub use evaluator::ProjectEvaluator;
pub use executor::{ExecutionRequest, ExecutionResult, Executor, JavaExecutor, ProcessOutput};
pub use runner::{RetryBudget, RunState, TestRunner};
