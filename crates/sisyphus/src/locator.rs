//! Entry-point discovery.
//!
//! Files whose stem ends with [`ENTRY_SUFFIX`] are scanned first, then the
//! rest, both in lexicographic walk order so a project always resolves to
//! the same file. A signature preceded by `//` on its line is ignored;
//! signatures inside block comments still count.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::patcher::package_clause;

/// Stem suffix of conventionally named entry files
pub const ENTRY_SUFFIX: &str = "Main";

/// Extension of source files considered by the locator and the patcher
pub const SOURCE_EXTENSION: &str = "java";

static MAIN_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"public\s+static\s+void\s+main\s*\(\s*(?:String\s*\[\s*\]\s*[A-Za-z_$][\w$]*|String\s+[A-Za-z_$][\w$]*\s*\[\s*\]|String\s*\.\.\.\s*[A-Za-z_$][\w$]*)\s*\)",
    )
    .expect("valid main signature pattern")
});

/// The resolved entry point of a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Source file declaring `main`
    pub path: PathBuf,
    /// Class name to launch, package-qualified when the file declares one
    pub class_name: String,
    /// Directory the package hierarchy is rooted at
    pub source_root: PathBuf,
}

impl EntryPoint {
    fn from_source(path: PathBuf, text: &str) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        match package_clause(text) {
            Ok(Some(clause)) => {
                let source_root = strip_package_dirs(&dir, &clause.name);
                Self {
                    class_name: format!("{}.{}", clause.name, stem),
                    path,
                    source_root,
                }
            }
            _ => Self {
                class_name: stem,
                path,
                source_root: dir,
            },
        }
    }
}

/// Walk up from `dir` past the directories named by `package`, if they match.
fn strip_package_dirs(dir: &Path, package: &str) -> PathBuf {
    let mut root = dir.to_path_buf();
    for segment in package.rsplit('.') {
        if root.file_name().is_some_and(|name| name == segment) {
            root.pop();
        } else {
            return dir.to_path_buf();
        }
    }
    root
}

/// Whether `text` declares a runnable `main` outside a line comment
pub fn has_entry_signature(text: &str) -> bool {
    MAIN_SIGNATURE.find_iter(text).any(|m| {
        let line_start = text[..m.start()].rfind('\n').map_or(0, |i| i + 1);
        !text[line_start..m.start()].contains("//")
    })
}

/// All source files under `root`, in stable lexicographic walk order
pub fn source_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!("Error reading directory entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == SOURCE_EXTENSION))
        .collect()
}

fn is_conventional(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.to_string_lossy().ends_with(ENTRY_SUFFIX))
}

/// Blocking scan of `root` for its entry point
pub fn locate_blocking(root: &Path) -> Option<EntryPoint> {
    let (conventional, others): (Vec<PathBuf>, Vec<PathBuf>) =
        source_files(root).into_iter().partition(|p| is_conventional(p));

    for path in conventional.into_iter().chain(others) {
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable source");
                continue;
            }
        };

        if has_entry_signature(&text) {
            return Some(EntryPoint::from_source(path, &text));
        }
    }

    None
}

/// Find the entry point of the project rooted at `root`
pub async fn locate(root: &Path) -> Option<EntryPoint> {
    let root = root.to_path_buf();
    match tokio::task::spawn_blocking(move || locate_blocking(&root)).await {
        Ok(entry) => entry,
        Err(e) => {
            tracing::error!("Entry-point scan task failed: {}", e);
            None
        }
    }
}
