//! End-to-end batch runs over a project group on disk.
//!
//! The `scripted_*` tests stand in `sh` scripts for the JDK; the `jdk_*`
//! tests use the real toolchain and return early when `javac` is missing.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use autograder::discovery::{discover_projects, load_mixins, load_test_cases};
use autograder::BatchOrchestrator;
use grader_common::{BatchReport, CompileFailure, ProjectId, Verdict};
use minos::ExecutionConfig;
use sisyphus::CompilerConfig;

const ECHO: &str = r#"package app;

import java.util.Scanner;

public class EchoMain {
    public static void main(String[] args) {
        Scanner in = new Scanner(System.in);
        while (in.hasNextLine()) {
            System.out.println(in.nextLine());
        }
    }
}
"#;

const SLEEPER: &str = r#"public class Main {
    public static void main(String[] args) throws Exception {
        Thread.sleep(60_000);
    }
}
"#;

const BROKEN: &str = r#"public class Main {
    public static void main(String[] args) {
        int x = "not a number";
    }
}
"#;

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        for sub in ["projects/lab", "tests", "mixins", "bin"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }
        std::fs::write(root.join("mixins/mixins.json"), "{}").unwrap();
        Self { _dir: dir, root }
    }

    fn project(&self, id: &str, file: &str, source: &str) -> PathBuf {
        let path = self.root.join("projects/lab").join(id).join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, source).unwrap();
        path
    }

    fn tests(&self, json: &str) {
        std::fs::write(self.root.join("tests/lab.json"), json).unwrap();
    }

    fn script(&self, name: &str, body: &str) -> Vec<String> {
        let path = self.root.join("bin").join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        vec!["sh".to_string(), path.to_string_lossy().into_owned()]
    }

    async fn run(&self, compiler: CompilerConfig, execution: ExecutionConfig) -> BatchReport {
        let mixins = load_mixins(&self.root.join("mixins/mixins.json")).await.unwrap();
        let tests = load_test_cases(&self.root.join("tests/lab.json")).await.unwrap();
        let mut projects = discover_projects(&self.root.join("projects/lab")).await.unwrap();

        BatchOrchestrator::from_config(compiler, &execution, 0)
            .run_batch(&mut projects, Arc::new(mixins), Arc::from(tests))
            .await
    }

    fn library_dir(&self) -> PathBuf {
        self.root.join("mixins")
    }
}

fn id(raw: &str) -> ProjectId {
    raw.parse().unwrap()
}

fn has_jdk() -> bool {
    ["javac", "java"].iter().all(|tool| {
        Command::new(tool)
            .arg("-version")
            .output()
            .is_ok_and(|out| out.status.success())
    })
}

fn jdk(library_dir: &Path, timeout_ms: u64) -> (CompilerConfig, ExecutionConfig) {
    let compiler = CompilerConfig {
        javac: vec!["javac".to_string()],
        library_dir: library_dir.to_path_buf(),
    };
    let execution = ExecutionConfig {
        java: vec!["java".to_string()],
        library_dir: library_dir.to_path_buf(),
        timeout_ms,
        max_retries: 1,
        retry_backoff_ms: 0,
        ..ExecutionConfig::default()
    };
    (compiler, execution)
}

#[tokio::test]
async fn scripted_echo_batch() {
    let ws = Workspace::new();
    ws.project("1-amy-echo", "Main.java", "public class Main { public static void main(String[] a) {} }");
    ws.project("2-bo-none", "Util.java", "class Util {}");
    ws.tests(r#"[{"input": "hi", "output": "hi"}, {"input": "hi", "output": "bye"}]"#);

    let compiler = CompilerConfig {
        javac: ws.script("javac.sh", "exit 0"),
        library_dir: ws.library_dir(),
    };
    let execution = ExecutionConfig {
        java: ws.script("java.sh", "cat"),
        library_dir: ws.library_dir(),
        retry_backoff_ms: 0,
        ..ExecutionConfig::default()
    };

    let report = ws.run(compiler, execution).await;

    let echo = report.project(&id("1-amy-echo")).unwrap();
    assert_eq!(echo.outcomes[0].verdict, Verdict::Passed);
    assert_eq!(
        echo.outcomes[1].verdict,
        Verdict::Mismatch {
            actual: "hi".to_string()
        }
    );
    assert_eq!(
        report.compile_failures.get(&id("2-bo-none")),
        Some(&CompileFailure::MainNotFound)
    );
    assert!(!ws.root.join("projects/lab/2-bo-none").exists());
}

#[tokio::test]
async fn scripted_timeout_counts_attempts() {
    let ws = Workspace::new();
    ws.project("1-cy-slow", "Main.java", "public class Main { public static void main(String[] a) {} }");
    ws.tests(r#"[{"input": "", "output": "never"}]"#);

    let compiler = CompilerConfig {
        javac: ws.script("javac.sh", "exit 0"),
        library_dir: ws.library_dir(),
    };
    let execution = ExecutionConfig {
        java: ws.script("java.sh", "sleep 30"),
        library_dir: ws.library_dir(),
        timeout_ms: 100,
        max_retries: 2,
        retry_backoff_ms: 0,
        ..ExecutionConfig::default()
    };

    let report = ws.run(compiler, execution).await;

    let outcome = &report.project(&id("1-cy-slow")).unwrap().outcomes[0];
    assert_eq!(outcome.verdict, Verdict::Timeout);
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test]
async fn scripted_padded_ordinal_keeps_every_project_reported() {
    let ws = Workspace::new();
    let main = "public class Main { public static void main(String[] a) {} }";
    ws.project("1-amy-calc", "Main.java", main);
    ws.project("01-amy-calc", "Main.java", main);
    ws.project("2-amy-calc", "Main.java", main);
    ws.tests(r#"[{"input": "7", "output": "7"}]"#);

    let compiler = CompilerConfig {
        javac: ws.script("javac.sh", "exit 0"),
        library_dir: ws.library_dir(),
    };
    let execution = ExecutionConfig {
        java: ws.script("java.sh", "cat"),
        library_dir: ws.library_dir(),
        retry_backoff_ms: 0,
        ..ExecutionConfig::default()
    };

    let discovered = discover_projects(&ws.root.join("projects/lab")).await.unwrap();
    let report = ws.run(compiler, execution).await;

    assert_eq!(discovered.len(), 2);
    assert_eq!(report.projects.len() + report.compile_failures.len(), discovered.len());
    for project in &discovered {
        let graded = report.project(&project.id).unwrap();
        assert_eq!(graded.passed, 1);
    }
    assert_eq!(
        report.project(&id("1-amy-calc")).unwrap().project,
        id("1-amy-calc")
    );
}

#[tokio::test]
async fn jdk_echo_in_package_passes() {
    if !has_jdk() {
        eprintln!("skipping: no JDK on PATH");
        return;
    }

    let ws = Workspace::new();
    ws.project("1-dee-echo", "src/app/EchoMain.java", ECHO);
    ws.tests(r#"[{"input": "hi", "output": "hi"}, {"input": "a\nb", "output": "a\r\nb\r\n"}]"#);

    let (compiler, execution) = jdk(&ws.library_dir(), 20_000);
    let report = ws.run(compiler, execution).await;

    assert!(report.compile_failures.is_empty(), "{:?}", report.compile_failures);
    let project = report.project(&id("1-dee-echo")).unwrap();
    assert_eq!(project.passed, 2);
    assert!(ws
        .root
        .join("projects/lab/1-dee-echo/app/EchoMain.class")
        .exists());
}

#[tokio::test]
async fn jdk_compile_error_and_timeout() {
    if !has_jdk() {
        eprintln!("skipping: no JDK on PATH");
        return;
    }

    let ws = Workspace::new();
    ws.project("1-eve-broken", "Main.java", BROKEN);
    ws.project("2-fay-sleeper", "Main.java", SLEEPER);
    ws.tests(r#"[{"input": "", "output": "done"}]"#);

    let (compiler, execution) = jdk(&ws.library_dir(), 1_500);
    let report = ws.run(compiler, execution).await;

    assert!(matches!(
        report.compile_failures.get(&id("1-eve-broken")),
        Some(CompileFailure::CompileError { diagnostics, .. }) if diagnostics.contains("incompatible types")
    ));

    let outcome = &report.project(&id("2-fay-sleeper")).unwrap().outcomes[0];
    assert_eq!(outcome.verdict, Verdict::Timeout);
    assert_eq!(outcome.attempts, 2);
}
