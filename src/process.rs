//! # Process Runner
//!
//! Runs external container tooling with a bounded wall clock, draining
//! stdout and stderr into one combined accumulator as soon as the child
//! starts. A full pipe buffer would otherwise stall the child and show up
//! as a false timeout.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Result, TestkitError};

/// Run a command to completion in `dir`, returning its combined
/// stdout/stderr text.
///
/// Fails fatally when the process cannot be started, exits non-zero, or does
/// not finish before `limit` elapses. On timeout the child is killed before
/// the error is raised; the captured output (partial on timeout) is embedded
/// in the error message.
pub async fn run_command(dir: &Path, limit: Duration, tokens: &[&str]) -> Result<String> {
    let rendered = tokens.join(" ");
    debug!(command = %rendered, dir = %dir.display(), "Running command");

    let (program, args) = tokens
        .split_first()
        .ok_or_else(|| TestkitError::CommandLaunch {
            command: rendered.clone(),
            message: "empty command".to_string(),
        })?;

    let mut child = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TestkitError::CommandLaunch {
            command: rendered.clone(),
            message: e.to_string(),
        })?;

    // Readers start before the wait; the accumulator is only read after the
    // wait resolves, so no further synchronization is needed.
    let output = Arc::new(Mutex::new(String::new()));
    let stdout_task = spawn_drain(child.stdout.take(), &output);
    let stderr_task = spawn_drain(child.stderr.take(), &output);

    let status = match timeout(limit, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            return Err(TestkitError::CommandLaunch {
                command: rendered,
                message: e.to_string(),
            });
        }
        Err(_) => {
            let _ = child.kill().await;
            return Err(TestkitError::CommandTimeout {
                command: rendered,
                timeout_seconds: limit.as_secs(),
                output: snapshot(&output),
            });
        }
    };

    // Join the readers so the accumulator holds the complete output.
    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let output = snapshot(&output);
    if !status.success() {
        return Err(TestkitError::CommandFailed {
            command: rendered,
            exit_code: status.code().unwrap_or(-1),
            output,
        });
    }

    Ok(output)
}

fn spawn_drain<R>(stream: Option<R>, sink: &Arc<Mutex<String>>) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let stream = stream?;
    let sink = Arc::clone(sink);
    Some(tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut guard = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.push_str(&line);
            guard.push('\n');
        }
    }))
}

fn snapshot(sink: &Arc<Mutex<String>>) -> String {
    sink.lock()
        .map(|guard| guard.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cwd() -> PathBuf {
        std::env::current_dir().expect("Failed to read current dir")
    }

    #[tokio::test]
    async fn captures_combined_output_on_success() {
        let output = run_command(
            &cwd(),
            Duration::from_secs(5),
            &["/bin/sh", "-c", "echo out; echo err >&2"],
        )
        .await
        .expect("Command should succeed");

        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[tokio::test]
    async fn nonzero_exit_reports_code_and_output() {
        let err = run_command(
            &cwd(),
            Duration::from_secs(5),
            &["/bin/sh", "-c", "echo port already in use; exit 1"],
        )
        .await
        .expect_err("Command should fail");

        match &err {
            TestkitError::CommandFailed {
                exit_code, output, ..
            } => {
                assert_eq!(*exit_code, 1);
                assert!(output.contains("port already in use"));
            }
            other => panic!("Expected CommandFailed, got {other:?}"),
        }
        assert!(err.to_string().contains("(1)"));
        assert!(err.to_string().contains("port already in use"));
    }

    #[tokio::test]
    async fn timeout_kills_child_and_reports_partial_output() {
        let err = run_command(
            &cwd(),
            Duration::from_secs(1),
            &["/bin/sh", "-c", "echo started; sleep 30"],
        )
        .await
        .expect_err("Command should time out");

        match err {
            TestkitError::CommandTimeout {
                timeout_seconds,
                output,
                ..
            } => {
                assert_eq!(timeout_seconds, 1);
                assert!(output.contains("started"));
            }
            other => panic!("Expected CommandTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn large_output_does_not_stall_the_child() {
        // Far beyond any OS pipe buffer; only a concurrent reader lets the
        // child finish inside the limit.
        let output = run_command(
            &cwd(),
            Duration::from_secs(10),
            &["/bin/sh", "-c", "seq 1 100000"],
        )
        .await
        .expect("Command should succeed");

        assert!(output.lines().count() >= 100000);
        assert!(output.contains("100000"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let err = run_command(
            &cwd(),
            Duration::from_secs(5),
            &["/definitely/not/a/binary"],
        )
        .await
        .expect_err("Command should fail to launch");

        assert!(matches!(err, TestkitError::CommandLaunch { .. }));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let err = run_command(&cwd(), Duration::from_secs(1), &[])
            .await
            .expect_err("Empty command should be rejected");

        assert!(matches!(err, TestkitError::CommandLaunch { .. }));
    }
}
