use crate::runner::{signal_name, CommandOutput};
use crate::task::TaskOutcome;

/// Phrases that mean the automation process was blocked even if it exited 0.
/// Matched against lower-cased combined output.
pub const DENIAL_PATTERNS: &[&str] = &[
    "permission denied",
    "operation not permitted",
    "read-only sandbox",
    "read-only file system",
    "couldn't create",
    "could not create",
    "sandbox denied",
    "blocked by sandbox",
    "write access is blocked",
];

pub const EMPTY_OUTPUT_PLACEHOLDER: &str = "(no output)";

/// First denial pattern found in `output`, if any.
pub fn detect_denial(output: &str) -> Option<&'static str> {
    let lower = output.to_lowercase();
    DENIAL_PATTERNS.iter().copied().find(|p| lower.contains(p))
}

fn response_text(out: &CommandOutput) -> String {
    let stdout = out.stdout.trim_end();
    let stderr = out.stderr.trim_end();
    match (stdout.is_empty(), stderr.is_empty()) {
        (false, false) => format!("{stdout}\n\n[stderr]\n{stderr}"),
        (false, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (true, true) => EMPTY_OUTPUT_PLACEHOLDER.to_string(),
    }
}

/// Maps a finished process to a terminal outcome.
pub fn classify_output(task_id: &str, out: &CommandOutput) -> TaskOutcome {
    let body = response_text(out);

    if !out.is_success() {
        let mut head = match out.exit_code {
            Some(code) => format!("Task {task_id} failed with exit code {code}"),
            None => format!("Task {task_id} failed without an exit code"),
        };
        if let Some(sig) = out.signal {
            head.push_str(&format!(" (terminated by {})", signal_name(sig)));
        }
        return TaskOutcome::Failed {
            diagnostic: format!("{head}\n\n{body}"),
        };
    }

    if let Some(pattern) = detect_denial(&out.combined()) {
        return TaskOutcome::Failed {
            diagnostic: format!(
                "Task {task_id} exited successfully but its output reports a blocked operation (matched \"{pattern}\")\n\n{body}"
            ),
        };
    }

    TaskOutcome::Done { response: body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_uses_stdout() {
        let outcome = classify_output("t1", &CommandOutput::success("ok\n"));
        assert_eq!(
            outcome,
            TaskOutcome::Done {
                response: "ok".into()
            }
        );
    }

    #[test]
    fn stderr_is_labelled_only_when_both_present() {
        let both = classify_output("t1", &CommandOutput::exited(0, "out", "warn"));
        assert_eq!(both.message(), "out\n\n[stderr]\nwarn");
        let only_err = classify_output("t1", &CommandOutput::exited(0, "", "warn"));
        assert_eq!(only_err.message(), "warn");
        let none = classify_output("t1", &CommandOutput::exited(0, "", ""));
        assert_eq!(none.message(), EMPTY_OUTPUT_PLACEHOLDER);
    }

    #[test]
    fn non_zero_exit_names_task_and_code() {
        let outcome = classify_output("t9", &CommandOutput::exited(3, "", "boom"));
        let TaskOutcome::Failed { diagnostic } = outcome else {
            panic!("expected failure");
        };
        assert!(diagnostic.contains("t9"));
        assert!(diagnostic.contains("exit code 3"));
        assert!(diagnostic.contains("boom"));
    }

    #[test]
    fn signal_termination_is_reported() {
        let out = CommandOutput {
            exit_code: None,
            signal: Some(15),
            ..Default::default()
        };
        let outcome = classify_output("t2", &out);
        assert!(outcome.message().contains("SIGTERM"));
        assert_eq!(outcome.status(), crate::task::TaskStatus::Failed);
    }

    #[test]
    fn sandbox_denial_fails_despite_exit_zero() {
        let out = CommandOutput::success("Write access is blocked by read-only sandbox");
        let outcome = classify_output("t3", &out);
        assert_eq!(outcome.status(), crate::task::TaskStatus::Failed);
    }

    #[test]
    fn denial_detection_is_case_insensitive_and_checks_stderr() {
        assert_eq!(detect_denial("mkdir: Couldn't Create dir"), Some("couldn't create"));
        let out = CommandOutput::exited(0, "fine", "bash: PERMISSION DENIED");
        assert_eq!(classify_output("t", &out).status(), crate::task::TaskStatus::Failed);
        assert_eq!(detect_denial("all good"), None);
    }
}
