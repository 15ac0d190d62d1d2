//! Helpers for running child processes with timeouts and bounded output.

use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit status, absent when the pipes outlived the deadline.
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    fn timed_out(status: Option<ExitStatus>) -> Self {
        Self {
            status,
            stdout: Vec::new(),
            stderr: Vec::new(),
            stdout_truncated: 0,
            stderr_truncated: 0,
            timed_out: true,
        }
    }

    /// Stdout followed by stderr, decoded leniently.
    ///
    /// Invalid UTF-8 sequences are dropped rather than replaced.
    pub fn combined_text(&self) -> String {
        let mut text = decode_dropping_invalid(&self.stdout);
        text.push_str(&decode_dropping_invalid(&self.stderr));
        if self.stdout_truncated > 0 || self.stderr_truncated > 0 {
            text.push_str(&format!(
                "\n[output truncated: stdout {} bytes, stderr {} bytes]\n",
                self.stdout_truncated, self.stderr_truncated
            ));
        }
        text
    }
}

type StreamResult = Result<(Vec<u8>, usize)>;

/// Process group of the command currently running, 0 when idle.
static ACTIVE_GROUP: AtomicI32 = AtomicI32::new(0);

/// Kill the process group of the command currently running, if any.
pub fn kill_active_group() {
    let pgid = ACTIVE_GROUP.load(Ordering::SeqCst);
    if pgid > 0 {
        kill_group(pgid);
    }
}

/// Registration of a spawned command's process group. Unregisters on drop.
struct ProcessGroup {
    pgid: i32,
}

impl ProcessGroup {
    fn register(pid: u32) -> Option<Self> {
        let pgid = i32::try_from(pid).ok()?;
        ACTIVE_GROUP.store(pgid, Ordering::SeqCst);
        Some(Self { pgid })
    }

    fn kill(&self) {
        kill_group(self.pgid);
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        let _ = ACTIVE_GROUP.compare_exchange(self.pgid, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(pgid, err = %err, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount
/// of each stream kept in memory (bytes beyond it are discarded while the pipe is drained).
/// The deadline also covers draining: a background process that keeps the pipes open past
/// it makes the call report a timeout.
///
/// On Unix the child leads its own process group. Every timeout kills the whole group, so
/// pipelines and background jobs started by the command do not outlive it.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let deadline = Instant::now() + timeout;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    cmd.process_group(0);

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };
    let group = ProcessGroup::register(child.id());

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_rx = spawn_reader(stdout, output_limit_bytes);
    let stderr_rx = spawn_reader(stderr, output_limit_bytes);

    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            if let Some(group) = &group {
                group.kill();
            }
            child.kill().context("kill command")?;
            let status = child.wait().context("wait command after kill")?;
            return Ok(CommandOutput::timed_out(Some(status)));
        }
    };

    let Some((stdout, stdout_truncated)) = recv_output(&stdout_rx, deadline)? else {
        warn!("stdout still open after exit, killing process group");
        if let Some(group) = &group {
            group.kill();
        }
        return Ok(CommandOutput::timed_out(Some(status)));
    };
    let Some((stderr, stderr_truncated)) = recv_output(&stderr_rx, deadline)? else {
        warn!("stderr still open after exit, killing process group");
        if let Some(group) = &group {
            group.kill();
        }
        return Ok(CommandOutput::timed_out(Some(status)));
    };

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), "command finished");
    Ok(CommandOutput {
        status: Some(status),
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out: false,
    })
}

fn spawn_reader<R: Read + Send + 'static>(reader: R, limit: usize) -> Receiver<StreamResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver may be gone if the caller already gave up on this stream.
        let _ = tx.send(read_stream_limited(reader, limit));
    });
    rx
}

fn recv_output(rx: &Receiver<StreamResult>, deadline: Instant) -> Result<Option<(Vec<u8>, usize)>> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(result) => result.map(Some),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
