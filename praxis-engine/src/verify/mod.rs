//! Verification adapter: command execution and file inspection.
//!
//! The engine treats every call here as slow and fallible. Results are
//! always recorded raw alongside the learner's prediction; a timeout or
//! unreachable tool scores `Inconclusive`, never blocks progression.

mod local;
mod mock;
mod traits;

use praxis_core::{CommandOutput, Verdict, VerificationOutcome};

pub use local::LocalVerifier;
pub use mock::MockVerifier;
pub use traits::{FileInfo, Verifier, VerifyError};

/// Score a captured command output against an item's expectation.
///
/// With an expected stdout, the comparison is on trimmed text. Without
/// one, a zero exit code counts as a match. A killed process (no exit
/// code) is inconclusive.
#[must_use]
pub fn score_command(expected_stdout: Option<&str>, output: &CommandOutput) -> VerificationOutcome {
    let Some(code) = output.exit_code else {
        return VerificationOutcome {
            verdict: Verdict::Inconclusive,
            output: Some(output.clone()),
            detail: "process terminated without an exit code".into(),
        };
    };

    let (verdict, detail) = match expected_stdout {
        Some(expected) => {
            if output.stdout.trim() == expected.trim() {
                (Verdict::Match, "stdout matched expected output".to_string())
            } else {
                (Verdict::Mismatch, "stdout differed from expected output".to_string())
            }
        }
        None => {
            if code == 0 {
                (Verdict::Match, "command exited cleanly".to_string())
            } else {
                (Verdict::Mismatch, format!("command exited with code {code}"))
            }
        }
    };

    VerificationOutcome {
        verdict,
        output: Some(output.clone()),
        detail,
    }
}

/// Score fetched fixture content against the expected content.
#[must_use]
pub fn score_fixture(expected_content: &str, actual: &str) -> VerificationOutcome {
    let verdict = if actual.trim() == expected_content.trim() {
        Verdict::Match
    } else {
        Verdict::Mismatch
    };
    VerificationOutcome {
        verdict,
        output: None,
        detail: format!("fixture content {}", if verdict == Verdict::Match { "matched" } else { "differed" }),
    }
}
