//! Classpath construction shared by the compile and run phases.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use grader_common::{AppResult, GraderError};

/// Wildcard entry covering every jar in the compatibility library
pub fn library_entry(library_dir: &Path) -> PathBuf {
    library_dir.join("*")
}

/// Join entries with the host's path-list separator (`:` or `;`)
pub fn join<I, P>(entries: I) -> AppResult<OsString>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    std::env::join_paths(entries.into_iter().map(|p| p.as_ref().to_path_buf()))
        .map_err(|e| GraderError::ConfigError(format!("Invalid classpath entry: {e}")))
}

/// Resolve `path` against the current directory without touching the filesystem
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
