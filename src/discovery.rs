//! Batch inputs: project listing, test documents and the mixin set.

use std::collections::HashSet;
use std::path::Path;

use grader_common::{AppResult, GraderError, Project, ProjectId, TestCase};
use serde::Deserialize;
use sisyphus::MixinSet;

use crate::constants::RESERVED_TESTS_ENTRY;

/// One entry of a `<group>.json` test document
#[derive(Debug, Deserialize)]
struct TestEntry {
    input: String,
    output: String,
}

/// List the projects of a group directory, ordered by ordinal.
///
/// Entries must be directories named `{ordinal}-{owner}-{name}`; anything
/// else is skipped with a warning. Every returned project has a distinct id.
pub async fn discover_projects(group_dir: &Path) -> AppResult<Vec<Project>> {
    let mut entries = tokio::fs::read_dir(group_dir).await.map_err(|e| {
        GraderError::ConfigError(format!(
            "Cannot read project group {}: {}",
            group_dir.display(),
            e
        ))
    })?;

    let mut projects = Vec::new();
    let mut seen = HashSet::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::warn!(entry = ?name, "Skipping entry with non UTF-8 name");
            continue;
        };
        if name == RESERVED_TESTS_ENTRY || name.starts_with('.') {
            continue;
        }
        if !entry.file_type().await?.is_dir() {
            tracing::debug!(entry = name, "Skipping non-directory entry");
            continue;
        }

        match name.parse::<ProjectId>() {
            Ok(id) if !seen.insert(id.clone()) => {
                tracing::warn!(entry = name, "Skipping entry: duplicate project {}", id);
            }
            Ok(id) => projects.push(Project::new(id, entry.path())),
            Err(e) => tracing::warn!(entry = name, "Skipping entry: {}", e),
        }
    }

    projects.sort_by(|a, b| a.id.cmp(&b.id));
    tracing::info!(
        group = %group_dir.display(),
        projects = projects.len(),
        "Discovered projects"
    );
    Ok(projects)
}

/// Load a test document, numbering cases by position.
pub async fn load_test_cases(path: &Path) -> AppResult<Vec<TestCase>> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        GraderError::ConfigError(format!("Cannot read tests {}: {}", path.display(), e))
    })?;

    let entries: Vec<TestEntry> = serde_json::from_str(&raw)?;
    let cases: Vec<TestCase> = entries
        .into_iter()
        .enumerate()
        .map(|(ordinal, entry)| TestCase::new(ordinal, entry.input, entry.output))
        .collect();

    tracing::info!(path = %path.display(), tests = cases.len(), "Loaded test cases");
    Ok(cases)
}

/// Load the batch's mixin set
pub async fn load_mixins(path: &Path) -> AppResult<MixinSet> {
    MixinSet::load(path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discover_sorts_by_ordinal_and_skips_noise() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10-zed-last", "2-amy-calc", "tests", "notes", "1-bob-calc"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("3-cat-file"), "not a dir").unwrap();

        let projects = discover_projects(dir.path()).await.unwrap();
        let ids: Vec<String> = projects.iter().map(|p| p.id.to_string()).collect();

        assert_eq!(ids, vec!["1-bob-calc", "2-amy-calc", "10-zed-last"]);
        assert_eq!(projects[0].root, dir.path().join("1-bob-calc"));
    }

    #[tokio::test]
    async fn test_zero_padded_ordinal_does_not_alias_project() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1-amy-calc", "01-amy-calc", "001-amy-calc"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }

        let projects = discover_projects(dir.path()).await.unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].root, dir.path().join("1-amy-calc"));
    }

    #[tokio::test]
    async fn test_discovered_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1-amy-calc", "1-amy-calc-v2", "2-amy-calc"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }

        let projects = discover_projects(dir.path()).await.unwrap();
        let ids: HashSet<String> = projects.iter().map(|p| p.id.to_string()).collect();
        assert_eq!(ids.len(), projects.len());
        assert_eq!(projects.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_group_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_projects(&dir.path().join("absent")).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_load_test_cases_numbers_by_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab1.json");
        std::fs::write(
            &path,
            r#"[{"input": "1 2", "output": "3"}, {"input": "", "output": "hello"}]"#,
        )
        .unwrap();

        let cases = load_test_cases(&path).await.unwrap();
        assert_eq!(
            cases,
            vec![TestCase::new(0, "1 2", "3"), TestCase::new(1, "", "hello")]
        );
    }

    #[tokio::test]
    async fn test_missing_test_document_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_test_cases(&dir.path().join("none.json")).await.unwrap_err();
        assert!(matches!(err, GraderError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_malformed_test_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"[{"input": "x"}]"#).unwrap();

        let err = load_test_cases(&path).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_load_mixins_reads_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixins.json");
        std::fs::write(
            &path,
            r#"{"compat.Scanner": [{"regex": "new java\\.util\\.Scanner", "replace": "new compat.Scanner"}]}"#,
        )
        .unwrap();

        let mixins = load_mixins(&path).await.unwrap();
        assert_eq!(mixins.len(), 1);
    }
}
