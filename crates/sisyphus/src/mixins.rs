//! Mixin definitions: compatibility patches applied to submitted sources.
//!
//! A mixin document is a JSON object mapping a fully-qualified import name
//! to an ordered list of substitution rules:
//!
//! ```json
//! {
//!   "compat.Input": [
//!     { "regex": "new\\s+Scanner\\(System\\.in\\)", "replace": "Input.scanner()" }
//!   ]
//! }
//! ```
//!
//! Declaration order is significant and preserved.

use std::path::Path;

use grader_common::{AppResult, GraderError};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::fs;

/// A single text substitution
#[derive(Debug, Clone)]
pub struct MixinRule {
    pub pattern: Regex,
    pub replacement: String,
}

/// An import requirement plus the substitutions that depend on it
#[derive(Debug, Clone)]
pub struct Mixin {
    pub import: String,
    pub rules: Vec<MixinRule>,
    /// Matches an existing `import <name>;` statement
    import_pattern: Regex,
}

impl Mixin {
    pub fn new(import: impl Into<String>, rules: Vec<MixinRule>) -> AppResult<Self> {
        let import = import.into();
        let import_pattern = Regex::new(&format!(
            r"\bimport\s+{}\s*;",
            regex::escape(&import)
        ))
        .map_err(|e| GraderError::InvalidPattern {
            import: import.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            import,
            rules,
            import_pattern,
        })
    }

    /// The statement inserted when the import is missing
    pub fn import_statement(&self) -> String {
        format!("import {};", self.import)
    }

    /// Whether `text` already imports this mixin
    pub fn is_imported_in(&self, text: &str) -> bool {
        self.import_pattern.is_match(text)
    }
}

/// Ordered, immutable collection of mixins shared by every patch in a batch
#[derive(Debug, Clone, Default)]
pub struct MixinSet {
    mixins: Vec<Mixin>,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    regex: String,
    replace: String,
}

impl MixinSet {
    pub fn new(mixins: Vec<Mixin>) -> Self {
        Self { mixins }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a mixin document, compiling every pattern up front
    pub fn from_json_str(raw: &str) -> AppResult<Self> {
        let document: Map<String, Value> = serde_json::from_str(raw)?;
        let mut mixins = Vec::with_capacity(document.len());

        for (import, rules) in document {
            let rules: Vec<RuleDocument> = serde_json::from_value(rules).map_err(|e| {
                GraderError::SerializationError(format!("Mixin `{import}`: {e}"))
            })?;

            let rules = rules
                .into_iter()
                .map(|rule| {
                    let pattern =
                        Regex::new(&rule.regex).map_err(|e| GraderError::InvalidPattern {
                            import: import.clone(),
                            message: e.to_string(),
                        })?;
                    Ok(MixinRule {
                        pattern,
                        replacement: rule.replace,
                    })
                })
                .collect::<AppResult<Vec<_>>>()?;

            mixins.push(Mixin::new(import, rules)?);
        }

        Ok(Self { mixins })
    }

    /// Load a mixin document from disk
    pub async fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).await.map_err(|e| {
            GraderError::ConfigError(format!("Cannot read mixins {}: {}", path.display(), e))
        })?;

        let set = Self::from_json_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            mixins = set.len(),
            "Loaded mixin set"
        );
        Ok(set)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mixin> {
        self.mixins.iter()
    }

    pub fn len(&self) -> usize {
        self.mixins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mixins.is_empty()
    }
}
