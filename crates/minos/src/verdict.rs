//! Verdict determination for a completed attempt

use grader_common::{TestCase, TestOutcome};

use crate::executor::ProcessOutput;

/// Fold CRLF line endings to LF and trim outer whitespace
pub fn normalize(output: &str) -> String {
    output.replace("\r\n", "\n").trim().to_string()
}

/// The output compared against the expectation.
///
/// Anything written to stderr supersedes stdout.
pub fn effective_output(output: &ProcessOutput) -> &[u8] {
    if output.stderr.is_empty() {
        &output.stdout
    } else {
        &output.stderr
    }
}

/// Judge a completed attempt against its test case.
///
/// The exit code is informational; only a signal-terminated process with no
/// captured output is a runtime failure.
pub fn judge(test: &TestCase, output: &ProcessOutput, attempts: u32) -> TestOutcome {
    let captured = effective_output(output);

    if captured.is_empty() && output.exit_code.is_none() {
        let exit_code = output.signal.map_or(-1, |signal| -signal);
        return TestOutcome::runtime_failure(test.ordinal, exit_code, attempts);
    }

    let raw = String::from_utf8_lossy(captured).into_owned();
    let actual = normalize(&raw);

    if actual == normalize(&test.expected_output) {
        TestOutcome::passed(test.ordinal, raw, output.exit_code, attempts)
    } else {
        TestOutcome::mismatch(test.ordinal, actual, raw, output.exit_code, attempts)
    }
}
