//! Batch orchestrator.
//!
//! A batch runs in two phases. Every project is compiled concurrently
//! first; projects that fail are recorded, excluded and have their
//! directories removed. The compiled projects are then evaluated
//! concurrently. Both phases wait for every task before moving on.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use grader_common::{
    BatchReport, CompileFailure, CompileStatus, Project, ProjectId, ProjectReport, TestCase,
    TestOutcome,
};
use minos::{ExecutionConfig, JavaExecutor, ProjectEvaluator, TestRunner};
use sisyphus::{Compiler, CompilerConfig, EntryPoint, MixinSet};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Drives compile and test phases over a set of projects
#[derive(Clone)]
pub struct BatchOrchestrator {
    compiler: Arc<Compiler>,
    evaluator: ProjectEvaluator,
    compile_semaphore: Option<Arc<Semaphore>>,
}

impl BatchOrchestrator {
    /// `max_concurrent_compiles` of 0 leaves the compile phase unbounded.
    pub fn new(
        compiler: Compiler,
        evaluator: ProjectEvaluator,
        max_concurrent_compiles: usize,
    ) -> Self {
        let compile_semaphore = (max_concurrent_compiles > 0)
            .then(|| Arc::new(Semaphore::new(max_concurrent_compiles)));
        Self {
            compiler: Arc::new(compiler),
            evaluator,
            compile_semaphore,
        }
    }

    /// Wire the real compiler and JVM executor
    pub fn from_config(
        compiler: CompilerConfig,
        execution: &ExecutionConfig,
        max_concurrent_compiles: usize,
    ) -> Self {
        let executor = JavaExecutor::new(execution.java.clone(), &execution.library_dir);
        let runner = TestRunner::new(Arc::new(executor), execution);
        let evaluator = ProjectEvaluator::new(runner, execution.max_concurrent_tests);
        Self::new(Compiler::new(compiler), evaluator, max_concurrent_compiles)
    }

    /// Compile and test every project, updating each project's status.
    pub async fn run_batch(
        &self,
        projects: &mut [Project],
        mixins: Arc<MixinSet>,
        tests: Arc<[TestCase]>,
    ) -> BatchReport {
        let started_at = Utc::now();
        tracing::info!(
            projects = projects.len(),
            tests = tests.len(),
            "Starting batch"
        );

        let compile_failures = self.compile_all(projects, mixins).await;

        let compiled: Vec<Project> = projects
            .iter()
            .filter(|p| p.is_compiled())
            .cloned()
            .collect();
        let reports = self.evaluate_all(compiled, tests).await;

        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            projects: reports,
            compile_failures,
        };

        tracing::info!(
            compiled = report.projects.len(),
            failed_to_compile = report.compile_failures.len(),
            passed = report.total_passed(),
            failed = report.total_failed(),
            "Batch finished"
        );
        report
    }

    async fn compile_all(
        &self,
        projects: &mut [Project],
        mixins: Arc<MixinSet>,
    ) -> BTreeMap<ProjectId, CompileFailure> {
        let mut join_set = JoinSet::new();
        for (index, project) in projects.iter_mut().enumerate() {
            project.status = CompileStatus::Compiling;

            let compiler = Arc::clone(&self.compiler);
            let semaphore = self.compile_semaphore.clone();
            let mixins = Arc::clone(&mixins);
            let project = project.clone();

            join_set.spawn(async move {
                let _permit = match semaphore {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                (index, compiler.compile(&project, &mixins).await)
            });
        }

        let mut slots: Vec<Option<Result<EntryPoint, CompileFailure>>> =
            vec![None; projects.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Compile task failed"),
            }
        }

        let mut failures = BTreeMap::new();
        for (project, slot) in projects.iter_mut().zip(slots) {
            let result = slot.unwrap_or_else(|| {
                Err(CompileFailure::CompileError {
                    exit_code: None,
                    diagnostics: "compile task aborted".to_string(),
                })
            });

            match result {
                Ok(_) => project.status = CompileStatus::Compiled,
                Err(reason) => {
                    tracing::warn!(project = %project.id, reason = %reason, "Excluding project");
                    if let Err(e) = tokio::fs::remove_dir_all(&project.root).await {
                        tracing::warn!(
                            project = %project.id,
                            path = %project.root.display(),
                            "Failed to remove project directory: {}",
                            e
                        );
                    }
                    failures.insert(project.id.clone(), reason.clone());
                    project.status = CompileStatus::Failed { reason };
                }
            }
        }
        failures
    }

    async fn evaluate_all(
        &self,
        projects: Vec<Project>,
        tests: Arc<[TestCase]>,
    ) -> BTreeMap<ProjectId, ProjectReport> {
        let mut join_set = JoinSet::new();
        for (index, project) in projects.iter().cloned().enumerate() {
            let evaluator = self.evaluator.clone();
            let tests = Arc::clone(&tests);
            join_set.spawn(async move { (index, evaluator.evaluate(&project, tests).await) });
        }

        let mut slots: Vec<Option<ProjectReport>> = vec![None; projects.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => tracing::error!(error = %e, "Evaluation task failed"),
            }
        }

        projects
            .into_iter()
            .zip(slots)
            .map(|(project, slot)| {
                let report = slot.unwrap_or_else(|| {
                    let outcomes = tests
                        .iter()
                        .map(|t| TestOutcome::runtime_failure(t.ordinal, -1, 0))
                        .collect();
                    ProjectReport::from_outcomes(project.id.clone(), outcomes)
                });
                (project.id, report)
            })
            .collect()
    }
}
