//! The interactive shell session and its per-invocation subprocess.
//!
//! A [`ShellSession`] is one long-lived terminal context: a working
//! directory, a rolling transcript, and a terminated flag. Each
//! [`ShellSession::invoke`] spawns one [`Process`], which borrows the
//! session mutably for its whole lifetime, so the single-subprocess
//! invariant holds at compile time.
//!
//! Output is drained through two reader tasks (stdout and stderr) that
//! feed a single FIFO channel. [`Process::get_next_line`] is the sole
//! suspension point: it resolves when output arrives, the process
//! exits, the idle window elapses, or a [`KillHandle`] fires.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, warn};

use devkit_types::{DevError, OutputSink, SendOptions};

/// Idle window: silence for this long while the child is still running
/// surfaces as a timeout error.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Grace period for reaping a child after its output streams close.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Grace period for reaping a child after a forced kill.
const KILL_GRACE: Duration = Duration::from_millis(500);

#[cfg(windows)]
fn shell_command() -> (String, &'static str) {
    ("cmd".to_string(), "/c")
}

#[cfg(not(windows))]
fn shell_command() -> (String, &'static str) {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
    (shell, "-c")
}

/// Appended to every script so the session can track directory changes.
#[cfg(windows)]
const CWD_SUFFIX: &str = " & cd";
#[cfg(not(windows))]
const CWD_SUFFIX: &str = "; pwd";

/// Prompt prefix shown before each echoed command.
#[cfg(windows)]
const INTERFACE: &str = "cmd >";
#[cfg(not(windows))]
const INTERFACE: &str = "$";

/// Highlight tag for the rendered transcript code block.
#[cfg(windows)]
pub const TRANSCRIPT_HIGHLIGHT: &str = "cmd";
#[cfg(not(windows))]
pub const TRANSCRIPT_HIGHLIGHT: &str = "console";

/// A double backtick in subprocess output would terminate the rendered
/// fence early; a zero-width space keeps the fence intact.
fn sanitize_fences(line: &str) -> String {
    line.replace("``", "`\u{200b}`")
}

/// One interactive shell context.
#[derive(Debug)]
pub struct ShellSession {
    cwd: String,
    transcript: Vec<String>,
    terminated: bool,
    idle_timeout: Duration,
}

impl ShellSession {
    pub fn new(cwd: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            transcript: Vec::new(),
            terminated: false,
            idle_timeout: IDLE_TIMEOUT,
        }
    }

    /// Shrink the idle window. Tests use this to avoid real 60s waits.
    pub fn set_idle_timeout(&mut self, idle_timeout: Duration) {
        self.idle_timeout = idle_timeout;
    }

    pub fn working_directory(&self) -> &str {
        &self.cwd
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Mark the session permanently unusable.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    /// The full transcript joined into one text block.
    pub fn raw(&self) -> String {
        self.transcript.join("\n")
    }

    /// Append a line and return the rendered transcript.
    pub fn record_line(&mut self, line: &str) -> String {
        self.transcript.push(line.to_string());
        self.render()
    }

    /// Append a final line and mark the session terminated.
    pub fn set_exit_message(&mut self, message: &str) -> String {
        self.transcript.push(message.to_string());
        self.terminated = true;
        self.render()
    }

    /// The transcript wrapped as a fenced code block.
    pub fn render(&self) -> String {
        format!("```{}\n{}```", TRANSCRIPT_HIGHLIGHT, self.raw())
    }

    /// Spawn a subprocess running `script` in the session's working
    /// directory.
    ///
    /// A script whose final segment is an `exit` command also marks the
    /// session terminated, mirroring a real terminal closing. Fails
    /// without spawning anything if the session is already terminated.
    pub fn invoke(&mut self, script: &str) -> Result<Process<'_>, DevError> {
        if self.terminated {
            return Err(DevError::ConnectionRefused(
                "the session has been terminated".to_string(),
            ));
        }

        let script = script.trim().trim_end_matches(';').to_string();
        if has_exit_segment(&script) {
            self.terminated = true;
        }

        let (shell, flag) = shell_command();
        debug!(%shell, %script, cwd = %self.cwd, "spawning session subprocess");

        let mut child = Command::new(&shell)
            .arg(flag)
            .arg(format!("{script}{CWD_SUFFIX}"))
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {shell}"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, tx);
        }

        Ok(Process {
            session: self,
            command: script,
            child,
            rx,
            rx_closed: false,
            cwd_absorbed: false,
            pending: VecDeque::new(),
            force_kill: Arc::new(AtomicBool::new(false)),
            killed: Arc::new(Notify::new()),
            exit_code: None,
        })
    }
}

/// True when any `;`- or `&&`-separated segment is an `exit` command.
fn has_exit_segment(script: &str) -> bool {
    script
        .split(';')
        .flat_map(|part| part.split("&&"))
        .any(|segment| {
            let segment = segment.trim();
            segment == "exit" || segment.starts_with("exit ")
        })
}

fn spawn_reader(stream: impl AsyncRead + Unpin + Send + 'static, tx: mpsc::UnboundedSender<String>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(sanitize_fences(&line)).is_err() {
                break;
            }
        }
    });
}

/// Remote cancellation for a running [`Process`].
///
/// Cloneable and send-safe so the surrounding command layer can hold it
/// while the process borrows the session.
#[derive(Debug, Clone)]
pub struct KillHandle {
    force_kill: Arc<AtomicBool>,
    killed: Arc<Notify>,
}

impl KillHandle {
    /// Request a forced kill. Any in-flight `get_next_line` fails with
    /// an interrupted error promptly.
    pub fn kill(&self) {
        self.force_kill.store(true, Ordering::Release);
        self.killed.notify_one();
    }
}

/// One subprocess invocation, from spawn to exit or kill.
#[derive(Debug)]
pub struct Process<'s> {
    session: &'s mut ShellSession,
    command: String,
    child: Child,
    rx: mpsc::UnboundedReceiver<String>,
    rx_closed: bool,
    cwd_absorbed: bool,
    pending: VecDeque<String>,
    force_kill: Arc<AtomicBool>,
    killed: Arc<Notify>,
    exit_code: Option<i64>,
}

impl<'s> Process<'s> {
    /// A handle that can force-kill this process from elsewhere.
    pub fn kill_handle(&self) -> KillHandle {
        KillHandle {
            force_kill: Arc::clone(&self.force_kill),
            killed: Arc::clone(&self.killed),
        }
    }

    pub fn exit_code(&self) -> Option<i64> {
        self.exit_code
    }

    /// "Alive" means "still has work": the OS process has not exited,
    /// or output remains that no caller has consumed yet.
    pub fn is_alive(&mut self) -> bool {
        self.pump();
        self.try_reap();
        self.exit_code.is_none() || !self.pending.is_empty() || !self.rx_closed
    }

    /// Record the exit status if the child has finished.
    fn try_reap(&mut self) {
        if self.exit_code.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.exit_code = Some(status.code().unwrap_or(-1) as i64);
            }
        }
    }

    /// Move everything already buffered in the channel into `pending`.
    fn pump(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(line) => self.pending.push_back(line),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.rx_closed = true;
                    break;
                }
            }
        }
    }

    /// Wait for the next chunk of output.
    ///
    /// Resolves when output arrives or the process exits; fails with a
    /// timeout error when the idle window elapses with the child still
    /// running, and with an interrupted error when the kill handle
    /// fires. Returns the accumulated lines joined and trimmed.
    pub async fn get_next_line(&mut self) -> Result<String, DevError> {
        self.pump();
        if self.force_kill.load(Ordering::Acquire) {
            self.reap_killed().await;
            return Err(interrupted(&self.command));
        }

        while self.pending.is_empty() && !self.rx_closed {
            tokio::select! {
                _ = self.killed.notified() => {
                    self.reap_killed().await;
                    return Err(interrupted(&self.command));
                }
                line = self.rx.recv() => match line {
                    Some(line) => self.pending.push_back(line),
                    None => {
                        self.rx_closed = true;
                        if self.exit_code.is_none() {
                            if let Ok(Ok(status)) = timeout(EXIT_GRACE, self.child.wait()).await {
                                self.exit_code = Some(status.code().unwrap_or(-1) as i64);
                            }
                        }
                    }
                },
                _ = tokio::time::sleep(self.session.idle_timeout) => {
                    self.try_reap();
                    if self.exit_code.is_none() {
                        warn!(command = %self.command, "subprocess idle timeout");
                        return Err(DevError::Timeout(self.session.idle_timeout));
                    }
                }
            }
        }

        self.pump();
        self.try_reap();
        if !self.rx_closed && self.exit_code.is_some() {
            // The child is gone; give its final lines (the trailing
            // directory report among them) a moment to flush.
            let _ = timeout(EXIT_GRACE, async {
                while let Some(line) = self.rx.recv().await {
                    self.pending.push_back(line);
                }
                self.rx_closed = true;
            })
            .await;
        }
        if self.rx_closed && !self.cwd_absorbed {
            self.cwd_absorbed = true;
            self.absorb_cwd_line();
        }

        let lines: Vec<String> = self.pending.drain(..).collect();
        Ok(lines.join("\n").trim().to_string())
    }

    /// The final output line carries the working directory (from the
    /// suffix appended at spawn). Pop it, update the session, and put
    /// back anything that was glued in front of it.
    fn absorb_cwd_line(&mut self) {
        let Some(line) = self.pending.pop_back() else {
            return;
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.len() {
            0 => {}
            1 => {
                self.session.cwd = tokens[0].to_string();
            }
            _ => {
                // Output without a trailing newline can share the line
                // with the directory. Grow a suffix until it names a
                // real directory.
                for start in (0..tokens.len()).rev() {
                    let candidate = tokens[start..].join(" ");
                    if Path::new(&candidate).is_dir() {
                        self.session.cwd = candidate;
                        let remainder = tokens[..start].join(" ");
                        if !remainder.is_empty() {
                            self.pending.push_back(remainder);
                        }
                        return;
                    }
                }
                // No directory recognized; treat the line as plain output.
                self.pending.push_back(line);
            }
        }
    }

    /// Drive the subprocess to completion, echoing the command first
    /// and streaming the growing transcript through the sink.
    ///
    /// Returns the rendered transcript. Timeouts and forced kills end
    /// the run but are not errors at this level: the transcript carries
    /// the exit message instead.
    pub async fn run_until_complete(
        &mut self,
        mut sink: Option<&mut dyn OutputSink>,
    ) -> Result<String, DevError> {
        let options = SendOptions {
            raw: true,
            ..SendOptions::default()
        };

        let echo = format!("{INTERFACE} {}", self.command.trim());
        let rendered = self.session.record_line(&echo);
        if let Some(sink) = sink.as_deref_mut() {
            sink.send(&rendered, &options).await?;
        }

        if self.session.terminated {
            // An exit command closed the session; drop the child now.
            self.reap_killed().await;
            return Ok(self.session.render());
        }

        while self.is_alive() && !self.force_kill.load(Ordering::Acquire) {
            match self.get_next_line().await {
                Ok(output) if !output.is_empty() => {
                    let rendered = self.session.record_line(&output);
                    if let Some(sink) = sink.as_deref_mut() {
                        sink.send(&rendered, &options).await?;
                    }
                }
                Ok(_) => {}
                Err(DevError::Timeout(_)) => {
                    let rendered = self.session.set_exit_message("Timed out.");
                    if let Some(sink) = sink.as_deref_mut() {
                        sink.send(&rendered, &options).await?;
                    }
                    return Ok(rendered);
                }
                Err(DevError::Interrupted(_)) => {
                    let rendered = self.session.record_line("Force killed.");
                    if let Some(sink) = sink.as_deref_mut() {
                        sink.send(&rendered, &options).await?;
                    }
                    return Ok(rendered);
                }
                Err(other) => return Err(other),
            }
        }

        debug!(command = %self.command, exit_code = ?self.exit_code, "subprocess finished");
        Ok(self.session.render())
    }

    /// Kill the child and wait briefly for it to be reaped.
    async fn reap_killed(&mut self) {
        if self.exit_code.is_some() {
            return;
        }
        if let Err(err) = self.child.start_kill() {
            warn!(%err, "failed to kill subprocess");
        }
        if let Ok(Ok(status)) = timeout(KILL_GRACE, self.child.wait()).await {
            self.exit_code = Some(status.code().unwrap_or(-1) as i64);
        }
    }

    /// Release the subprocess, killing it if still running.
    pub async fn close(mut self) {
        self.reap_killed().await;
    }
}

// kill_on_drop on the Command covers abandonment on every other exit
// path, including panics while the Process is borrowed.

fn interrupted(command: &str) -> DevError {
    DevError::Interrupted(format!("{command:?} was force killed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_detection_covers_chained_segments() {
        assert!(has_exit_segment("exit"));
        assert!(has_exit_segment("echo done && exit"));
        assert!(has_exit_segment("cd /tmp; exit 1"));
        assert!(!has_exit_segment("echo exit"));
        assert!(!has_exit_segment("exiting=1"));
    }

    #[test]
    fn fence_sanitizing_breaks_double_backticks() {
        assert_eq!(sanitize_fences("a``b"), "a`\u{200b}`b");
        assert_eq!(sanitize_fences("plain"), "plain");
    }

    #[test]
    fn terminated_session_refuses_invoke() {
        let mut session = ShellSession::new("/");
        session.terminate();
        let err = session.invoke("echo hi").unwrap_err();
        assert!(matches!(err, DevError::ConnectionRefused(_)));
    }

    #[test]
    fn transcript_renders_as_a_code_block() {
        let mut session = ShellSession::new("/");
        session.record_line("$ echo hi");
        let rendered = session.record_line("hi");
        assert!(rendered.starts_with("```"));
        assert!(rendered.contains("$ echo hi\nhi"));
        assert!(rendered.ends_with("```"));
    }

    #[test]
    fn exit_message_terminates_the_session() {
        let mut session = ShellSession::new("/");
        session.set_exit_message("Timed out.");
        assert!(session.is_terminated());
        assert!(session.raw().contains("Timed out."));
    }
}
