//! Subprocess plumbing shared by probes, discovery, and the trial runner
//!
//! Every external tool invocation in this crate goes through
//! [`run_with_timeout`]: output is captured, non-zero exits become typed
//! errors carrying the exit status and trimmed stderr, and a hard deadline
//! kills the child so no invocation can block past its budget.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{AppError, Result};

/// Check whether a program is resolvable on PATH.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Captured output of a completed external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, killing it if `timeout` elapses.
///
/// Returns `Ok` only for a clean zero exit. A non-zero exit maps to
/// [`AppError::CommandFailed`] and a deadline hit to
/// [`AppError::CommandTimedOut`]; both keep the rendered command line and
/// stderr for the error journal.
pub async fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput> {
    if !command_exists(program) {
        return Err(AppError::CommandMissing {
            command: program.to_owned(),
        });
    }

    let rendered = render_command(program, args);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    // kill_on_drop reaps the child when the future is dropped on timeout.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AppError::from_command_timeout(
                rendered,
                saturating_millis(timeout),
                "",
            ));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let status = output.status.code().unwrap_or(-1);
        return Err(AppError::from_command_failure(rendered, status, &stderr));
    }

    Ok(CommandOutput { stdout, stderr })
}

/// Output of an external command that is allowed to exit non-zero.
#[derive(Debug, Clone)]
pub struct UncheckedOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Like [`run_with_timeout`] but a non-zero exit is returned as data rather
/// than an error. Probes use this: `ping` exits non-zero on packet loss yet
/// still prints the statistics the probe needs.
pub async fn run_unchecked_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<UncheckedOutput> {
    if !command_exists(program) {
        return Err(AppError::CommandMissing {
            command: program.to_owned(),
        });
    }

    let rendered = render_command(program, args);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AppError::from_command_timeout(
                rendered,
                saturating_millis(timeout),
                "",
            ));
        }
    };

    Ok(UncheckedOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn render_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_owned()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn command_exists_for_known_binary() {
        assert!(command_exists("true"));
        assert!(!command_exists("definitely_not_a_real_binary_xyz_99999"));
    }

    #[tokio::test]
    async fn fast_command_succeeds() {
        let output = run_with_timeout("echo", &args(&["hello"]), Duration::from_secs(5))
            .await
            .expect("echo should succeed");
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn missing_program_maps_to_command_missing() {
        let err = run_with_timeout("nonexistent_binary_xyz_12345", &[], Duration::from_secs(5))
            .await
            .expect_err("missing binary should fail");
        assert!(matches!(err, AppError::CommandMissing { .. }));
    }

    #[tokio::test]
    async fn nonzero_exit_maps_to_command_failed() {
        let err = run_with_timeout("false", &[], Duration::from_secs(5))
            .await
            .expect_err("false should fail");
        assert!(matches!(err, AppError::CommandFailed { .. }));
        assert_eq!(err.command_status(), Some(1));
    }

    #[tokio::test]
    async fn slow_command_is_killed_on_deadline() {
        let err = run_with_timeout("sleep", &args(&["60"]), Duration::from_millis(100))
            .await
            .expect_err("sleep should time out");
        assert!(matches!(err, AppError::CommandTimedOut { .. }));
        assert!(err.to_string().contains("100ms"));
    }

    #[tokio::test]
    async fn stderr_is_captured_in_failure() {
        // ls on a nonexistent path writes to stderr and exits non-zero.
        let err = run_with_timeout(
            "ls",
            &args(&["/nonexistent_path_xyz_99999"]),
            Duration::from_secs(5),
        )
        .await
        .expect_err("ls on nonexistent should fail");
        let text = err.to_string();
        assert!(text.contains("nonexistent_path") || text.contains("No such file"));
    }

    #[tokio::test]
    async fn unchecked_returns_nonzero_status_as_data() {
        let output = run_unchecked_with_timeout("false", &[], Duration::from_secs(5))
            .await
            .expect("false should run");
        assert_eq!(output.status, 1);
    }

    #[tokio::test]
    async fn unchecked_still_times_out() {
        let err = run_unchecked_with_timeout("sleep", &args(&["60"]), Duration::from_millis(100))
            .await
            .expect_err("sleep should time out");
        assert!(matches!(err, AppError::CommandTimedOut { .. }));
    }

    #[test]
    fn render_command_joins_args() {
        assert_eq!(render_command("speedtest", &[]), "speedtest");
        assert_eq!(
            render_command("speedtest", &args(&["-f", "json"])),
            "speedtest -f json"
        );
    }
}
