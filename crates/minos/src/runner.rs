//! Test runner: one test case against one compiled project.
//!
//! Every attempt walks `Starting -> Running -> {Completed, TimedOut}`.
//! `Starting` resolves the entry point afresh, so a retry never launches a
//! stale class. A timed-out attempt with budget left goes back to
//! `Starting` after the backoff and spawns a fresh process; otherwise the
//! test ends as `Timeout`. Nothing but a timeout is retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use grader_common::{Project, TestCase, TestOutcome};
use sisyphus::classpath;

use crate::config::ExecutionConfig;
use crate::executor::{ExecutionRequest, ExecutionResult, Executor, ProcessOutput};
use crate::metrics;
use crate::verdict::judge;

/// Default number of retries after a timeout
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Bounded attempt counter for one test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_retries: u32,
    attempts: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            attempts: 0,
        }
    }

    /// Count a new attempt and return its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Retries still available after the attempts made so far
    pub fn retries_left(&self) -> u32 {
        (self.max_retries + 1).saturating_sub(self.attempts)
    }

    pub fn can_retry(&self) -> bool {
        self.retries_left() > 0
    }
}

/// States of one test run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Resolve the entry point and prepare a fresh process
    Starting,
    Running(ExecutionRequest),
    Completed(ProcessOutput),
    TimedOut,
}

/// Runs single test cases with timeout and retry
#[derive(Clone)]
pub struct TestRunner {
    executor: Arc<dyn Executor>,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl TestRunner {
    pub fn new(executor: Arc<dyn Executor>, config: &ExecutionConfig) -> Self {
        Self {
            executor,
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }
    }

    /// Run `test` against `project`, producing exactly one outcome.
    pub async fn run(&self, project: &Project, test: &TestCase) -> TestOutcome {
        metrics::ACTIVE_TESTS.inc();
        let outcome = self.drive(project, test).await;
        metrics::ACTIVE_TESTS.dec();

        metrics::record_verdict(outcome.verdict.code());
        tracing::debug!(
            project = %project.id,
            test = test.ordinal,
            verdict = %outcome.verdict,
            attempts = outcome.attempts,
            "Test finished"
        );
        outcome
    }

    async fn drive(&self, project: &Project, test: &TestCase) -> TestOutcome {
        let root = classpath::absolute(&project.root);
        let mut budget = RetryBudget::new(self.max_retries);
        let mut state = RunState::Starting;

        loop {
            state = match state {
                RunState::Starting => {
                    // Every attempt launches whatever entry point is on disk now.
                    let Some(entry) = sisyphus::locate(&root).await else {
                        tracing::warn!(
                            project = %project.id,
                            test = test.ordinal,
                            attempts = budget.attempts(),
                            "Entry point vanished"
                        );
                        return TestOutcome::main_not_found(test.ordinal);
                    };

                    budget.begin_attempt();
                    RunState::Running(ExecutionRequest {
                        working_dir: root.clone(),
                        class_name: entry.class_name,
                        input: test.input.clone(),
                        timeout: self.timeout,
                    })
                }
                RunState::Running(request) => {
                    let started = Instant::now();
                    let result = self.executor.execute(&request).await;
                    let elapsed = started.elapsed().as_secs_f64();

                    match result {
                        Ok(ExecutionResult::Completed(output)) => {
                            metrics::record_attempt(elapsed, false);
                            RunState::Completed(output)
                        }
                        Ok(ExecutionResult::TimedOut) => {
                            metrics::record_attempt(elapsed, true);
                            RunState::TimedOut
                        }
                        Err(e) => {
                            tracing::error!(
                                project = %project.id,
                                test = test.ordinal,
                                error = %e,
                                "Failed to execute program"
                            );
                            return TestOutcome::runtime_failure(
                                test.ordinal,
                                -1,
                                budget.attempts(),
                            );
                        }
                    }
                }
                RunState::TimedOut if budget.can_retry() => {
                    tracing::info!(
                        project = %project.id,
                        test = test.ordinal,
                        attempt = budget.attempts(),
                        retries_left = budget.retries_left(),
                        "Attempt timed out, retrying"
                    );
                    if !self.retry_backoff.is_zero() {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                    RunState::Starting
                }
                RunState::TimedOut => {
                    tracing::info!(
                        project = %project.id,
                        test = test.ordinal,
                        attempts = budget.attempts(),
                        "Retries exhausted"
                    );
                    return TestOutcome::timeout(test.ordinal, budget.attempts());
                }
                RunState::Completed(output) => {
                    return judge(test, &output, budget.attempts());
                }
            };
        }
    }
}
