use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use portable_pty::{native_pty_system, Child, CommandBuilder, PtySize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::ReverieError;

pub const MAX_PAYLOAD_BYTES: usize = 4096;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Transcript bytes kept per run; the rest is counted and dropped.
pub const MAX_TRANSCRIPT_BYTES: usize = 1 << 20;

/// How long to wait for a reapable exit status after the child closed its output,
/// or for trailing output after the child exited.
const EXIT_GRACE: Duration = Duration::from_millis(500);
const EXIT_POLL: Duration = Duration::from_millis(20);
/// How often the read loop checks whether the child itself has exited.
const LIVENESS_POLL: Duration = Duration::from_millis(100);
/// Chunks buffered between the reader thread and the run loop.
const READ_QUEUE: usize = 64;

const PTY_SIZE: PtySize = PtySize { rows: 24, cols: 200, pixel_width: 0, pixel_height: 0 };

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The child closed its output. `exit_code` is `None` when no status could be reaped.
    Exited { exit_code: Option<u32> },
    /// The child was still running at the deadline and has been killed.
    TimedOut { after: Duration },
}

/// Result of one interactive run: status plus the raw terminal transcript,
/// with prompts and echoed input interleaved as a terminal shows them.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub outcome: ExecutionOutcome,
    pub transcript: String,
    pub pid: Option<u32>,
}

impl ExecutionReport {
    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::TimedOut { .. })
    }

    pub fn exit_status_label(&self) -> String {
        match &self.outcome {
            ExecutionOutcome::Exited { exit_code: Some(code) } => code.to_string(),
            ExecutionOutcome::Exited { exit_code: None } => "unknown".to_string(),
            ExecutionOutcome::TimedOut { .. } => "killed (timeout)".to_string(),
        }
    }

    /// Single text report handed to the observation phase.
    pub fn render(&self) -> String {
        let transcript = self.transcript.replace("\r\n", "\n");
        let transcript = transcript.trim();
        match &self.outcome {
            ExecutionOutcome::TimedOut { after } => format!(
                "Error: Binary execution timed out after {} seconds. Output so far:\n\n{}\n\n\
                 The program may be blocked on an unanswered prompt or an interactive menu.",
                after.as_secs(),
                transcript
            ),
            ExecutionOutcome::Exited { .. } => format!(
                "Exit Code: {}\n\nTerminal Output (including prompts & responses):\n{}",
                self.exit_status_label(),
                transcript
            ),
        }
    }
}

/// Runs a target executable under a pseudo-terminal with a bounded time budget.
#[derive(Debug, Clone)]
pub struct InteractiveRunner {
    timeout: Duration,
    max_payload: usize,
    max_transcript: usize,
}

impl Default for InteractiveRunner {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_payload: MAX_PAYLOAD_BYTES,
            max_transcript: MAX_TRANSCRIPT_BYTES,
        }
    }
}

impl InteractiveRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, ..Default::default() }
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn with_max_transcript(mut self, max_transcript: usize) -> Self {
        self.max_transcript = max_transcript;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(
        &self,
        path: &Path,
        args: &[String],
        payload: Option<&str>,
    ) -> Result<ExecutionReport, ReverieError> {
        validate_target(path)?;
        let payload = prepare_payload(payload, self.max_payload)?;

        debug!(path = %path.display(), ?args, has_input = payload.is_some(), "Spawning under pty");

        let pair = native_pty_system()
            .openpty(PTY_SIZE)
            .context("openpty failed")
            .map_err(spawn_failure)?;

        let mut cmd = CommandBuilder::new(path);
        cmd.args(args);
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let mut child = pair.slave
            .spawn_command(cmd)
            .with_context(|| path.display().to_string())
            .map_err(spawn_failure)?;
        // Only the child may hold the slave side, otherwise EOF never arrives.
        drop(pair.slave);
        let pid = child.process_id();

        let (reader, mut writer) = match (pair.master.try_clone_reader(), pair.master.take_writer()) {
            (Ok(r), Ok(w)) => (r, w),
            (Err(e), _) | (_, Err(e)) => {
                terminate(child).await;
                return Err(spawn_failure(e.context("pty setup failed")));
            }
        };

        if let Some(data) = &payload {
            if let Err(e) = writer.write_all(data.as_bytes()).and_then(|_| writer.flush()) {
                warn!(error = %e, "Failed to deliver input payload");
            }
        }

        let mut rx = spawn_reader(reader);
        let deadline = Instant::now() + self.timeout;
        let mut liveness = tokio::time::interval(LIVENESS_POLL);
        let mut transcript = Transcript::new(self.max_transcript);

        let end = loop {
            tokio::select! {
                chunk = rx.recv() => match chunk {
                    Some(chunk) => transcript.push(&chunk),
                    None => break RunEnd::OutputClosed,
                },
                _ = tokio::time::sleep_until(deadline) => break RunEnd::Deadline,
                _ = liveness.tick() => {
                    if let Ok(Some(status)) = child.try_wait() {
                        break RunEnd::ChildExited(status.exit_code());
                    }
                }
            }
        };

        let outcome = match end {
            RunEnd::Deadline => {
                warn!(
                    path = %path.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "Interactive run timed out, killing process group"
                );
                terminate(child).await;
                while let Ok(chunk) = rx.try_recv() {
                    transcript.push(&chunk);
                }
                ExecutionOutcome::TimedOut { after: self.timeout }
            }
            RunEnd::ChildExited(code) => {
                // A descendant may still hold the terminal open.
                let grace = Instant::now() + EXIT_GRACE;
                while let Ok(Some(chunk)) = tokio::time::timeout_at(grace, rx.recv()).await {
                    transcript.push(&chunk);
                }
                kill_process_group(pid);
                while let Ok(chunk) = rx.try_recv() {
                    transcript.push(&chunk);
                }
                ExecutionOutcome::Exited { exit_code: Some(code) }
            }
            RunEnd::OutputClosed => {
                let exit_code = reap_with_grace(child).await;
                kill_process_group(pid);
                ExecutionOutcome::Exited { exit_code }
            }
        };

        drop(writer);
        drop(pair.master);

        if transcript.dropped > 0 {
            warn!(
                path = %path.display(),
                kept = transcript.bytes.len(),
                dropped = transcript.dropped,
                "Transcript truncated"
            );
        }
        let report = ExecutionReport { outcome, transcript: transcript.into_text(), pid };
        info!(
            path = %path.display(),
            status = %report.exit_status_label(),
            bytes = report.transcript.len(),
            "Interactive run finished"
        );
        Ok(report)
    }
}

enum RunEnd {
    OutputClosed,
    ChildExited(u32),
    Deadline,
}

/// Output captured from the terminal, capped at `limit` bytes.
struct Transcript {
    bytes: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl Transcript {
    fn new(limit: usize) -> Self {
        Self { bytes: Vec::new(), limit, dropped: 0 }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        let take = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..take]);
        self.dropped += chunk.len() - take;
    }

    fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!("\n... [transcript truncated, {} bytes dropped]", self.dropped));
        }
        text
    }
}

/// portable-pty reports `anyhow` errors; keep the whole chain.
fn spawn_failure(err: anyhow::Error) -> ReverieError {
    ReverieError::SpawnFailure(format!("{:#}", err))
}

/// Absolute path to an existing executable regular file.
pub fn validate_target(path: &Path) -> Result<(), ReverieError> {
    if !path.is_absolute() {
        return Err(ReverieError::InvalidTarget(format!(
            "path must be absolute: {}", path.display()
        )));
    }
    let metadata = std::fs::metadata(path).map_err(|_| {
        ReverieError::InvalidTarget(format!("not found: {}", path.display()))
    })?;
    if !metadata.is_file() {
        return Err(ReverieError::InvalidTarget(format!(
            "not a regular file: {}", path.display()
        )));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(ReverieError::InvalidTarget(format!(
                "not executable: {}", path.display()
            )));
        }
    }
    Ok(())
}

/// Enforce the payload cap and newline discipline. Empty payloads deliver nothing.
pub fn prepare_payload(payload: Option<&str>, max_len: usize) -> Result<Option<String>, ReverieError> {
    let Some(data) = payload.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    if data.len() > max_len {
        return Err(ReverieError::PayloadTooLarge { size: data.len(), limit: max_len });
    }
    let mut data = data.to_string();
    if !data.ends_with('\n') {
        data.push('\n');
    }
    Ok(Some(data))
}

fn spawn_reader(mut reader: Box<dyn Read + Send>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel(READ_QUEUE);
    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // Linux reports EIO once every slave handle is closed.
                Err(_) => break,
            }
        }
    });
    rx
}

/// SIGKILL every process in the child's group. The pty child is a session
/// leader, so its pid is also the group id. Descendants that start their own
/// session are out of reach.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "Killed process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Force-kill the child's group and reap the child so no process outlives the call.
async fn terminate(mut child: Box<dyn Child + Send + Sync>) {
    kill_process_group(child.process_id());
    let result = tokio::task::spawn_blocking(move || {
        if let Err(e) = child.kill() {
            debug!(error = %e, "kill returned an error (child may already be gone)");
        }
        child.wait()
    }).await;

    match result {
        Ok(Ok(status)) => debug!(exit_code = status.exit_code(), "Child terminated"),
        Ok(Err(e)) => warn!(error = %e, "Failed to reap killed child"),
        Err(e) => warn!(error = %e, "Reaper task panicked"),
    }
}

async fn reap_with_grace(mut child: Box<dyn Child + Send + Sync>) -> Option<u32> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status.exit_code()),
            Ok(None) if started.elapsed() < EXIT_GRACE => tokio::time::sleep(EXIT_POLL).await,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Could not query child exit status");
                break;
            }
        }
    }
    debug!("Child closed its output without a reapable status");
    terminate(child).await;
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    fn script(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    /// Pid printed by a script as `bg=<pid>`.
    fn background_pid(transcript: &str) -> u32 {
        let rest = transcript.split("bg=").nth(1).expect("bg pid in transcript");
        rest.chars().take_while(char::is_ascii_digit).collect::<String>().parse().expect("numeric pid")
    }

    /// Waits up to two seconds for `pid` to disappear or become a zombie.
    #[cfg(target_os = "linux")]
    async fn process_gone(pid: u32) -> bool {
        for _ in 0..100 {
            match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
                Err(_) => return true,
                Ok(stat) => {
                    let state = stat.rsplit(')').next().map(str::trim_start).unwrap_or("");
                    if state.starts_with('Z') {
                        return true;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[test]
    fn test_transcript_keeps_prefix_and_counts_dropped() {
        let mut t = Transcript::new(8);
        t.push(b"Enter");
        t.push(b" password: ");
        t.push(b"xyz");
        assert_eq!(t.bytes, b"Enter pa");
        assert_eq!(t.dropped, 11);
        let text = t.into_text();
        assert!(text.starts_with("Enter pa\n"));
        assert!(text.ends_with("[transcript truncated, 11 bytes dropped]"));
    }

    #[test]
    fn test_transcript_under_limit_has_no_marker() {
        let mut t = Transcript::new(64);
        t.push(b"ok");
        assert_eq!(t.into_text(), "ok");
    }

    #[test]
    fn test_prepare_payload_appends_newline() {
        assert_eq!(prepare_payload(Some("secret"), 4096).unwrap().as_deref(), Some("secret\n"));
    }

    #[test]
    fn test_prepare_payload_keeps_existing_newline() {
        assert_eq!(prepare_payload(Some("secret\n"), 4096).unwrap().as_deref(), Some("secret\n"));
    }

    #[test]
    fn test_prepare_payload_empty_is_none() {
        assert_eq!(prepare_payload(Some(""), 4096).unwrap(), None);
        assert_eq!(prepare_payload(None, 4096).unwrap(), None);
    }

    #[test]
    fn test_prepare_payload_cap_boundary() {
        let ok = "a".repeat(4096);
        assert!(prepare_payload(Some(&ok), 4096).is_ok());
        let too_big = "a".repeat(4097);
        assert!(matches!(
            prepare_payload(Some(&too_big), 4096),
            Err(ReverieError::PayloadTooLarge { size: 4097, limit: 4096 })
        ));
    }

    #[test]
    fn test_validate_target_rejects_relative_and_missing() {
        assert!(matches!(validate_target(Path::new("bin/sh")), Err(ReverieError::InvalidTarget(_))));
        assert!(matches!(
            validate_target(Path::new("/definitely/not/here")),
            Err(ReverieError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_validate_target_rejects_non_executable() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.bin");
        std::fs::write(&file, b"\x7fELF").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(validate_target(&file), Err(ReverieError::InvalidTarget(_))));
    }

    #[test]
    fn test_validate_target_rejects_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(validate_target(dir.path()), Err(ReverieError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_oversized_payload_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let target = dir.path().join("target.sh");
        std::fs::write(&target, format!("#!/bin/sh\ntouch {}\n", marker.display())).unwrap();
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755)).unwrap();

        let payload = "x".repeat(4097);
        let result = InteractiveRunner::default().run(&target, &[], Some(&payload)).await;

        assert!(matches!(result, Err(ReverieError::PayloadTooLarge { .. })));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let report = InteractiveRunner::new(Duration::from_secs(5))
            .run(&sh(), &script("echo hello-from-child; exit 3"), None)
            .await
            .unwrap();
        assert_eq!(report.outcome, ExecutionOutcome::Exited { exit_code: Some(3) });
        assert!(report.transcript.contains("hello-from-child"));
        let rendered = report.render();
        assert!(rendered.starts_with("Exit Code: 3"));
        assert!(rendered.contains("hello-from-child"));
    }

    #[tokio::test]
    async fn test_payload_is_delivered_with_newline() {
        let report = InteractiveRunner::new(Duration::from_secs(5))
            .run(&sh(), &script("read line; echo \"got:[$line]\""), Some("secret"))
            .await
            .unwrap();
        assert!(!report.timed_out());
        assert!(report.transcript.contains("got:[secret]"), "transcript: {:?}", report.transcript);
    }

    #[tokio::test]
    async fn test_transcript_interleaves_prompt_and_echoed_input() {
        let report = InteractiveRunner::new(Duration::from_secs(5))
            .run(&sh(), &script("printf 'Password: '; read pw; echo \"len=${#pw}\""), Some("hunter2\n"))
            .await
            .unwrap();
        let t = report.transcript;
        assert!(t.contains("Password: "));
        assert!(t.contains("hunter2"));
        assert!(t.contains("len=7"));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output_and_kills_child() {
        let report = InteractiveRunner::new(Duration::from_secs(1))
            .run(&sh(), &script("printf 'Enter password: '; sleep 30"), None)
            .await
            .unwrap();

        assert!(report.timed_out());
        assert!(report.transcript.contains("Enter password: "));
        assert!(report.render().contains("unanswered prompt"));

        #[cfg(target_os = "linux")]
        {
            let pid = report.pid.expect("child pid");
            assert!(process_gone(pid).await, "child {} still alive", pid);
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_background_descendants() {
        let report = InteractiveRunner::new(Duration::from_secs(1))
            .run(
                &sh(),
                &script("trap '' HUP; sleep 31 & echo \"bg=$!\"; printf 'Enter password: '; wait"),
                None,
            )
            .await
            .unwrap();

        assert!(report.timed_out());
        let bg = background_pid(&report.transcript);
        assert!(process_gone(bg).await, "background child {} survived the run", bg);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_exit_is_reported_while_descendant_holds_terminal() {
        let started = std::time::Instant::now();
        let report = InteractiveRunner::new(Duration::from_secs(10))
            .run(&sh(), &script("sleep 30 & echo \"bg=$!\"; exit 0"), None)
            .await
            .unwrap();

        assert_eq!(report.outcome, ExecutionOutcome::Exited { exit_code: Some(0) });
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
        let bg = background_pid(&report.transcript);
        assert!(process_gone(bg).await, "background child {} survived the run", bg);
    }

    #[tokio::test]
    async fn test_flooding_output_is_capped() {
        let report = InteractiveRunner::new(Duration::from_secs(2))
            .run(&sh(), &script("yes AAAA"), None)
            .await
            .unwrap();

        assert!(report.timed_out());
        assert!(report.transcript.starts_with("AAAA"));
        assert!(report.transcript.contains("[transcript truncated,"));
        assert!(report.transcript.len() < MAX_TRANSCRIPT_BYTES + 128, "len {}", report.transcript.len());
    }
}
