//! Autograder - command-line entry point
//!
//! Grades one project group per run; see [`autograder::Config`] for the
//! environment it reads.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autograder::{
    constants::DEFAULT_LOG_FILTER,
    discovery::{discover_projects, load_mixins, load_test_cases},
    report, BatchOrchestrator, Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(config.batch.json_logs);
    minos::metrics::init_metrics();

    tracing::info!(
        environment = %config.environment,
        group = %config.batch.group,
        "Starting autograder"
    );

    let mixins = load_mixins(&config.batch.mixins_path).await?;
    let tests = load_test_cases(&config.batch.tests_path()).await?;
    let mut projects = discover_projects(&config.batch.group_dir()).await?;

    let orchestrator = BatchOrchestrator::from_config(
        config.compiler.clone(),
        &config.execution,
        config.batch.max_concurrent_compiles,
    );
    let batch = orchestrator
        .run_batch(&mut projects, Arc::new(mixins), Arc::from(tests))
        .await;

    println!("{}", report::render_summary(&batch));

    if let Some(path) = &config.batch.report_path {
        report::write_json(&batch, path)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    tracing::debug!(metrics = %minos::metrics::gather_text(), "Final metrics");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
