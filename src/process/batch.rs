use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;
use crate::errors::ReverieError;

/// Captured result of a non-interactive command.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl BatchOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `program` with `args` to completion, with stdin closed.
///
/// The child is killed when the timeout elapses.
pub async fn run_batch(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<BatchOutput, ReverieError> {
    debug!(program, arg_count = args.len(), timeout_secs = timeout.as_secs(), "Running batch command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ReverieError::SpawnFailure(format!("{} not found on PATH", program))
        }
        _ => ReverieError::SpawnFailure(format!("{}: {}", program, e)),
    })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ReverieError::Timeout(format!(
            "{} timed out after {}s", program, timeout.as_secs()
        )))??;

    Ok(BatchOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    #[tokio::test]
    async fn test_captures_both_streams_and_status() {
        let out = run_batch("/bin/sh", &sh("echo out; echo err >&2; exit 4"), None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(4));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_timeout_is_error() {
        let err = run_batch("/bin/sh", &sh("sleep 30"), None, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ReverieError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let err = run_batch("reverie-no-such-program", &[], None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ReverieError::SpawnFailure(msg) if msg.contains("not found")));
    }
}
