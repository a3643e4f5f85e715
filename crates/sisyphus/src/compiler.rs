//! Compilation logic for Sisyphus.
//!
//! A project is compiled in place: its entry point is located, every source
//! file is patched with the batch's mixins, and the external compiler is
//! pointed at the entry file with the compatibility library on the
//! classpath. Class files land next to the sources under the project root,
//! where the run phase expects them.

use std::path::Path;
use std::process::Stdio;

use grader_common::{CompileFailure, Project};
use tokio::process::Command;

use crate::classpath;
use crate::config::CompilerConfig;
use crate::locator::{self, EntryPoint};
use crate::mixins::MixinSet;
use crate::patcher::patch_file;

/// Compiler handles the compilation of projects.
#[derive(Debug, Clone)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    /// Create a new compiler with the given configuration.
    pub fn new(mut config: CompilerConfig) -> Self {
        config.library_dir = classpath::absolute(&config.library_dir);
        Self { config }
    }

    /// Compile a project and return its resolved entry point.
    ///
    /// No file is written when the entry point cannot be found. Files patched
    /// before an injection failure stay patched.
    pub async fn compile(
        &self,
        project: &Project,
        mixins: &MixinSet,
    ) -> Result<EntryPoint, CompileFailure> {
        let root = classpath::absolute(&project.root);

        let Some(entry) = locator::locate(&root).await else {
            tracing::info!(project = %project.id, "No entry point found");
            return Err(CompileFailure::MainNotFound);
        };

        tracing::debug!(
            project = %project.id,
            entry = %entry.path.display(),
            class = %entry.class_name,
            "Resolved entry point"
        );

        self.inject_mixins(&root, mixins).await?;
        self.run_compiler(project, &root, &entry).await?;

        tracing::info!(project = %project.id, class = %entry.class_name, "Compiled project");
        Ok(entry)
    }

    /// Patch every source file under `root`, stopping at the first failure.
    async fn inject_mixins(&self, root: &Path, mixins: &MixinSet) -> Result<(), CompileFailure> {
        let walk_root = root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || locator::source_files(&walk_root))
            .await
            .map_err(|e| CompileFailure::InjectionFailed {
                path: root.to_path_buf(),
                message: format!("source listing failed: {e}"),
            })?;

        let mut patched = 0usize;
        for file in &files {
            match patch_file(file, mixins).await {
                Ok(changed) => patched += usize::from(changed),
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "Mixin injection failed");
                    return Err(CompileFailure::InjectionFailed {
                        path: file.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            root = %root.display(),
            files = files.len(),
            patched,
            "Injected mixins"
        );
        Ok(())
    }

    /// Invoke the compiler and wait for it without a time bound.
    async fn run_compiler(
        &self,
        project: &Project,
        root: &Path,
        entry: &EntryPoint,
    ) -> Result<(), CompileFailure> {
        let spawn_failure = |message: String| CompileFailure::CompileError {
            exit_code: None,
            diagnostics: message,
        };

        let (program, extra_args) = self
            .config
            .javac
            .split_first()
            .ok_or_else(|| spawn_failure("compiler command is empty".to_string()))?;

        let compile_classpath =
            classpath::join([classpath::library_entry(&self.config.library_dir), root.to_path_buf()])
                .map_err(|e| spawn_failure(e.to_string()))?;
        let source_path = classpath::join([entry.source_root.as_path(), root])
            .map_err(|e| spawn_failure(e.to_string()))?;

        let output = Command::new(program)
            .args(extra_args)
            .arg("-encoding")
            .arg("UTF-8")
            .arg("-cp")
            .arg(&compile_classpath)
            .arg("-sourcepath")
            .arg(&source_path)
            .arg("-d")
            .arg(root)
            .arg(&entry.path)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_failure(format!("Failed to run compiler `{program}`: {e}")))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostics = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            stderr.into_owned()
        };

        tracing::info!(
            project = %project.id,
            exit_code = ?output.status.code(),
            "Compilation failed"
        );

        Err(CompileFailure::CompileError {
            exit_code: output.status.code(),
            diagnostics,
        })
    }
}
