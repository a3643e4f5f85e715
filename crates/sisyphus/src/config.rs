//! Configuration for the compile phase.

use std::env;
use std::path::PathBuf;

/// Compiler configuration
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Compiler command, program first (e.g. `["javac"]`)
    pub javac: Vec<String>,
    /// Directory holding the compatibility library jars
    pub library_dir: PathBuf,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            javac: vec!["javac".to_string()],
            library_dir: PathBuf::from("./mixins"),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            javac: command_from_env("JAVAC_BIN").unwrap_or(defaults.javac),
            library_dir: env::var("MIXINS_LIB_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.library_dir),
        }
    }
}

/// Read a whitespace-separated command line from `var`
pub fn command_from_env(var: &str) -> Option<Vec<String>> {
    env::var(var)
        .ok()
        .map(|v| v.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|parts| !parts.is_empty())
}
