//! Source patcher: injects mixin imports and applies mixin substitutions.
//!
//! [`apply`] is a pure text transformation; [`patch_file`] wraps it with
//! the read/write of a single source file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tokio::fs;

use crate::mixins::MixinSet;

/// Whitespace and comments allowed before the package clause
static LEADING_TRIVIA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(?:\s+|//[^\n]*|/\*(?s:.*?)\*/)*").expect("valid trivia pattern")
});

static PACKAGE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\Apackage\b").expect("valid keyword pattern"));

static PACKAGE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\Apackage\s+([A-Za-z_$][\w$]*(?:\s*\.\s*[A-Za-z_$][\w$]*)*)\s*;")
        .expect("valid package pattern")
});

/// The source text has no insertion point consistent with its structure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MalformedSource(pub String);

/// Errors from patching a file on disk
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Source file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Malformed source {}: {reason}", path.display())]
    MalformedSource { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A parsed `package` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageClause {
    /// Dotted package name with whitespace removed
    pub name: String,
    /// Byte offset just past the terminating `;`
    pub end: usize,
}

/// Locate the package declaration at the top of `text`.
///
/// Returns `Ok(None)` when the first code token is not `package`.
pub fn package_clause(text: &str) -> Result<Option<PackageClause>, MalformedSource> {
    let start = LEADING_TRIVIA.find(text).map_or(0, |m| m.end());
    let rest = &text[start..];

    if !PACKAGE_KEYWORD.is_match(rest) {
        return Ok(None);
    }

    let caps = PACKAGE_CLAUSE
        .captures(rest)
        .ok_or_else(|| MalformedSource("unparsable package declaration".to_string()))?;
    let clause_len = caps.get(0).map_or(0, |m| m.end());
    let name: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();

    Ok(Some(PackageClause {
        name,
        end: start + clause_len,
    }))
}

/// Apply `mixins` to `text`: insert missing imports, then run every
/// substitution rule in declaration order.
pub fn apply(text: &str, mixins: &MixinSet) -> Result<String, MalformedSource> {
    let imports: Vec<String> = mixins
        .iter()
        .filter(|m| !m.is_imported_in(text))
        .map(|m| m.import_statement())
        .collect();

    let package = package_clause(text)?;

    let mut patched = if imports.is_empty() {
        text.to_string()
    } else {
        let block = imports.join("\n");
        match package {
            Some(clause) => {
                let (head, tail) = text.split_at(clause.end);
                format!("{head}\n{block}{tail}")
            }
            None => format!("{block}\n{text}"),
        }
    };

    for mixin in mixins.iter() {
        for rule in &mixin.rules {
            patched = rule
                .pattern
                .replace_all(&patched, rule.replacement.as_str())
                .into_owned();
        }
    }

    Ok(patched)
}

/// Patch one source file in place.
///
/// Returns whether the file content changed. On error the file is left
/// untouched.
pub async fn patch_file(path: &Path, mixins: &MixinSet) -> Result<bool, PatchError> {
    let io_error = |source: std::io::Error| PatchError::Io {
        path: path.to_path_buf(),
        source,
    };

    if !fs::try_exists(path).await.map_err(io_error)? {
        return Err(PatchError::NotFound(path.to_path_buf()));
    }

    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            return Err(PatchError::MalformedSource {
                path: path.to_path_buf(),
                reason: "source is not valid UTF-8".to_string(),
            });
        }
        Err(e) => return Err(io_error(e)),
    };

    let patched = apply(&text, mixins).map_err(|e| PatchError::MalformedSource {
        path: path.to_path_buf(),
        reason: e.0,
    })?;

    if patched == text {
        return Ok(false);
    }

    fs::write(path, patched).await.map_err(io_error)?;
    tracing::debug!(path = %path.display(), "Patched source file");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixins(raw: &str) -> MixinSet {
        MixinSet::from_json_str(raw).unwrap()
    }

    #[test]
    fn test_imports_follow_package_clause() {
        let set = mixins(r#"{ "compat.Input": [], "compat.Output": [] }"#);
        let src = "package edu.school;\n\npublic class Main {}\n";

        let out = apply(src, &set).unwrap();
        assert_eq!(
            out,
            "package edu.school;\nimport compat.Input;\nimport compat.Output;\n\npublic class Main {}\n"
        );
    }

    #[test]
    fn test_imports_prepended_without_package() {
        let set = mixins(r#"{ "compat.Input": [] }"#);
        let out = apply("public class Main {}", &set).unwrap();
        assert_eq!(out, "import compat.Input;\npublic class Main {}");
    }

    #[test]
    fn test_package_after_header_comment() {
        let set = mixins(r#"{ "compat.Input": [] }"#);
        let src = "/* Homework 3\n * by someone */\n// more\npackage hw3;\nclass A {}";

        let out = apply(src, &set).unwrap();
        assert!(out.contains("package hw3;\nimport compat.Input;\nclass A {}"));
    }

    #[test]
    fn test_existing_import_is_not_duplicated() {
        let set = mixins(r#"{ "java.util.Scanner": [] }"#);
        let src = "import java.util.Scanner;\nclass A {}";
        assert_eq!(apply(src, &set).unwrap(), src);
    }

    #[test]
    fn test_patching_twice_never_duplicates_imports() {
        let set = mixins(
            r#"{
                "compat.Input": [{ "regex": "System\\.exit\\(", "replace": "Input.exit(" }],
                "compat.Output": []
            }"#,
        );
        let src = "package p;\nclass Main { void f() { System.exit(0); } }";

        let once = apply(src, &set).unwrap();
        let twice = apply(&once, &set).unwrap();

        assert_eq!(twice.matches("import compat.Input;").count(), 1);
        assert_eq!(twice.matches("import compat.Output;").count(), 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rules_replace_all_occurrences_in_order() {
        let set = mixins(
            r#"{
                "a.A": [{ "regex": "foo", "replace": "bar" }],
                "b.B": [{ "regex": "bar", "replace": "baz" }]
            }"#,
        );
        let out = apply("import a.A;\nimport b.B;\nfoo foo bar", &set).unwrap();
        assert_eq!(out, "import a.A;\nimport b.B;\nbaz baz baz");
    }

    #[test]
    fn test_rule_group_references() {
        let set = mixins(
            r#"{ "a.A": [{ "regex": "Thread\\.sleep\\((\\d+)\\)", "replace": "Compat.sleep($1)" }] }"#,
        );
        let out = apply("import a.A;\nThread.sleep(500);", &set).unwrap();
        assert_eq!(out, "import a.A;\nCompat.sleep(500);");
    }

    #[test]
    fn test_malformed_package_clause() {
        let set = mixins(r#"{ "a.A": [] }"#);
        let err = apply("package 9bad..name\nclass A {}", &set).unwrap_err();
        assert_eq!(err.0, "unparsable package declaration");
    }

    #[test]
    fn test_identifier_starting_with_package_is_not_a_clause() {
        assert_eq!(package_clause("packageName = 3;").unwrap(), None);
    }

    #[test]
    fn test_package_clause_normalizes_name() {
        let clause = package_clause("package  com . example ;\n").unwrap().unwrap();
        assert_eq!(clause.name, "com.example");
        assert_eq!(clause.end, "package  com . example ;".len());
    }

    #[tokio::test]
    async fn test_patch_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = patch_file(&dir.path().join("Nope.java"), &MixinSet::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, PatchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_patch_file_rewrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Main.java");
        std::fs::write(&path, "class Main {}").unwrap();

        let set = mixins(r#"{ "compat.Input": [] }"#);
        assert!(patch_file(&path, &set).await.unwrap());
        assert!(!patch_file(&path, &set).await.unwrap());

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "import compat.Input;\nclass Main {}");
    }

    #[tokio::test]
    async fn test_patch_file_leaves_malformed_source_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Main.java");
        let original = "package ;\nclass Main {}";
        std::fs::write(&path, original).unwrap();

        let err = patch_file(&path, &mixins(r#"{ "a.A": [] }"#))
            .await
            .unwrap_err();
        assert!(matches!(err, PatchError::MalformedSource { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }
}
