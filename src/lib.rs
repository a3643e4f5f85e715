//! Autograder - batch compile-and-test engine for Java submissions
//!
//! A batch takes every project of a group, patches the sources with the
//! configured compatibility mixins, compiles them with the external Java
//! compiler and runs each compiled project against the group's stdin/stdout
//! test cases.
//!
//! # Architecture
//!
//! - **sisyphus**: mixins, source patcher, entry-point locator, compiler
//! - **minos**: process executor, test runner, verdicts, project evaluator
//! - **grader-common**: shared domain types and the error type
//! - this crate: configuration, discovery, orchestration and reporting

pub mod config;
pub mod constants;
pub mod discovery;
pub mod orchestrator;
pub mod report;

pub use config::{BatchConfig, Config, ConfigError};
pub use orchestrator::BatchOrchestrator;
