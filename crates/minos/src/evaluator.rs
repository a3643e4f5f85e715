//! Project evaluator: fans one project's test cases out concurrently and
//! collects the outcomes in test order.

use std::sync::Arc;

use grader_common::{Project, ProjectReport, TestCase, TestOutcome};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::runner::TestRunner;

/// Runs every test case of a project
#[derive(Clone)]
pub struct ProjectEvaluator {
    runner: Arc<TestRunner>,
    semaphore: Option<Arc<Semaphore>>,
}

impl ProjectEvaluator {
    /// `max_concurrent_tests` of 0 leaves the fan-out unbounded.
    pub fn new(runner: TestRunner, max_concurrent_tests: usize) -> Self {
        let semaphore =
            (max_concurrent_tests > 0).then(|| Arc::new(Semaphore::new(max_concurrent_tests)));
        Self {
            runner: Arc::new(runner),
            semaphore,
        }
    }

    /// Run all `tests` against `project`.
    ///
    /// The report holds one outcome per test case, ordered like `tests`.
    pub async fn evaluate(&self, project: &Project, tests: Arc<[TestCase]>) -> ProjectReport {
        tracing::info!(project = %project.id, tests = tests.len(), "Evaluating project");

        let mut join_set = JoinSet::new();
        for index in 0..tests.len() {
            let runner = Arc::clone(&self.runner);
            let semaphore = self.semaphore.clone();
            let project = project.clone();
            let tests = Arc::clone(&tests);

            join_set.spawn(async move {
                let _permit = match semaphore {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = runner.run(&project, &tests[index]).await;
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<TestOutcome>> = vec![None; tests.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => {
                    tracing::error!(project = %project.id, error = %e, "Test task failed");
                }
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(tests.iter())
            .map(|(slot, test)| {
                slot.unwrap_or_else(|| TestOutcome::runtime_failure(test.ordinal, -1, 0))
            })
            .collect();

        let report = ProjectReport::from_outcomes(project.id.clone(), outcomes);
        tracing::info!(
            project = %project.id,
            passed = report.passed,
            total = report.total(),
            "Project evaluated"
        );
        report
    }
}
