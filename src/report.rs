//! Console summary and JSON artifact for a finished batch.

use std::fmt::Write as _;
use std::path::Path;

use grader_common::{AppResult, BatchReport, ProjectReport};

const PASS_MARK: &str = "\x1b[34m✓";
const FAIL_MARK: &str = "\x1b[31mX";
const RESET: &str = "\x1b[0m";

/// One line per project: ``Project `<id>` passed n/total`` and a mark per test
pub fn render_project(report: &ProjectReport) -> String {
    let mut line = format!(
        "Project `{}` passed {}/{}",
        report.project,
        report.passed,
        report.total()
    );
    if report.outcomes.is_empty() {
        return line;
    }

    line.push(' ');
    for outcome in &report.outcomes {
        line.push_str(if outcome.verdict.is_pass() {
            PASS_MARK
        } else {
            FAIL_MARK
        });
    }
    line.push_str(RESET);
    line
}

/// Render the whole batch for the terminal
pub fn render_summary(report: &BatchReport) -> String {
    let mut out = String::new();

    for project in report.projects.values() {
        let _ = writeln!(out, "{}", render_project(project));
    }

    for (id, failure) in &report.compile_failures {
        let _ = writeln!(out, "Project `{}` failed to compile: {}", id, failure);
    }

    let _ = write!(
        out,
        "{} passed, {} failed across {} project(s); {} failed to compile",
        report.total_passed(),
        report.total_failed(),
        report.projects.len(),
        report.compile_failures.len()
    );
    out
}

/// Write the report as pretty-printed JSON
pub async fn write_json(report: &BatchReport, path: &Path) -> AppResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;

    tracing::info!(path = %path.display(), "Wrote batch report");
    Ok(())
}
