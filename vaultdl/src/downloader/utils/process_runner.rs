//! Child process execution with a stall watchdog.
//!
//! Both output streams are read as records and forwarded to the caller.
//! Any byte on either stream counts as activity; silence for the configured
//! interval kills the process.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::activity::ActivityReader;
use super::record_reader::RecordReader;

/// Upper bound for draining buffered output after the process exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Which stream a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One text record of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exited on its own. `code` is `None` when terminated by a signal.
    Exited { code: Option<i32> },
    /// Killed by the watchdog.
    Stalled,
    /// Killed because the cancellation token fired.
    Cancelled,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited { code: Some(0) })
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub outcome: ProcessOutcome,
    /// Accumulated stderr records, newline separated.
    pub stderr: String,
    /// All records from both streams in arrival order.
    pub log: String,
}

/// Launch description for a supervised child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    args: Vec<String>,
    stall_timeout: Duration,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>, stall_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            stall_timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Spawn the child with both output streams piped.
    pub fn spawn(&self) -> io::Result<RunningProcess> {
        let mut child = process_utils::tokio_command(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let activity = Arc::new(Notify::new());
        let (tx, rx) = mpsc::channel(256);

        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, OutputStream::Stdout, activity.clone(), tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, OutputStream::Stderr, activity.clone(), tx);
        }

        Ok(RunningProcess {
            pid: child.id(),
            child,
            lines: rx,
            activity,
            stall_timeout: self.stall_timeout,
        })
    }
}

/// A spawned child under supervision.
pub struct RunningProcess {
    child: Child,
    pid: Option<u32>,
    lines: mpsc::Receiver<OutputLine>,
    activity: Arc<Notify>,
    stall_timeout: Duration,
}

impl RunningProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Drive the process to completion.
    ///
    /// `on_line` sees every record as it arrives. The process is killed when
    /// `token` is cancelled or when no output arrives for the stall interval.
    pub async fn wait<F>(mut self, token: &CancellationToken, mut on_line: F) -> ProcessReport
    where
        F: FnMut(&OutputLine),
    {
        let mut stderr = String::new();
        let mut log = String::new();
        let mut record = |line: OutputLine, stderr: &mut String, log: &mut String| {
            on_line(&line);
            push_line(log, &line.text);
            if line.stream == OutputStream::Stderr {
                push_line(stderr, &line.text);
            }
        };

        let watchdog = tokio::time::sleep(self.stall_timeout);
        tokio::pin!(watchdog);
        let mut streams_open = true;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    kill(&mut self.child, self.pid).await;
                    break ProcessOutcome::Cancelled;
                }
                _ = self.activity.notified() => {
                    watchdog.as_mut().reset(Instant::now() + self.stall_timeout);
                }
                line = self.lines.recv(), if streams_open => match line {
                    Some(line) => record(line, &mut stderr, &mut log),
                    None => streams_open = false,
                },
                status = self.child.wait() => {
                    break match status {
                        Ok(status) => ProcessOutcome::Exited { code: status.code() },
                        Err(e) => {
                            warn!(pid = ?self.pid, error = %e, "Error waiting for process");
                            ProcessOutcome::Exited { code: None }
                        }
                    };
                }
                _ = &mut watchdog => {
                    warn!(
                        pid = ?self.pid,
                        timeout_secs = self.stall_timeout.as_secs(),
                        "No output from process, killing it"
                    );
                    kill(&mut self.child, self.pid).await;
                    break ProcessOutcome::Stalled;
                }
            }
        };

        // Output written just before exit may still be in flight.
        if outcome != ProcessOutcome::Cancelled {
            let drain = async {
                while let Some(line) = self.lines.recv().await {
                    record(line, &mut stderr, &mut log);
                }
            };
            if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
                debug!(pid = ?self.pid, "Output streams still open after exit");
            }
        }

        if outcome == ProcessOutcome::Stalled {
            push_line(
                &mut log,
                &format!(
                    "[watchdog] no output for {}s, process killed",
                    self.stall_timeout.as_secs()
                ),
            );
        }

        ProcessReport {
            outcome,
            stderr,
            log,
        }
    }
}

fn spawn_reader<R>(
    reader: R,
    stream: OutputStream,
    activity: Arc<Notify>,
    tx: mpsc::Sender<OutputLine>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut records = RecordReader::new(ActivityReader::new(reader, activity));
        loop {
            match records.next_record().await {
                Ok(Some(text)) => {
                    if tx.send(OutputLine { stream, text }).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(?stream, error = %e, "Failed to read process output");
                    break;
                }
            }
        }
    });
}

async fn kill(child: &mut Child, pid: Option<u32>) {
    if let Err(e) = child.kill().await {
        debug!(?pid, error = %e, "Failed to kill process");
    }
}

fn push_line(buf: &mut String, line: &str) {
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, stall: Duration) -> ProcessRunner {
        ProcessRunner::new("sh", vec!["-c".to_string(), script.to_string()], stall)
    }

    #[tokio::test]
    async fn test_collects_output_and_exit_code() {
        let runner = sh("echo out; echo err >&2; exit 3", Duration::from_secs(10));
        let token = CancellationToken::new();
        let mut seen = Vec::new();

        let report = runner
            .spawn()
            .unwrap()
            .wait(&token, |line| seen.push(line.clone()))
            .await;

        assert_eq!(report.outcome, ProcessOutcome::Exited { code: Some(3) });
        assert_eq!(report.stderr, "err");
        assert!(report.log.contains("out"));
        assert!(report.log.contains("err"));
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_silent_process_is_killed() {
        let runner = sh("echo starting; exec sleep 30", Duration::from_secs(1));
        let token = CancellationToken::new();

        let started = Instant::now();
        let report = runner.spawn().unwrap().wait(&token, |_| {}).await;

        assert_eq!(report.outcome, ProcessOutcome::Stalled);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(report.log.contains("starting"));
        assert!(report.log.ends_with("process killed"));
        assert!(report.log.contains("[watchdog] no output for 1s"));
    }

    #[tokio::test]
    async fn test_chatty_process_is_not_killed() {
        // Runs well past the stall interval but writes more often than it.
        let script = "for i in 1 2 3 4 5 6 7 8; do echo tick $i; sleep 0.1; done";
        let runner = sh(script, Duration::from_millis(500));
        let token = CancellationToken::new();

        let report = runner.spawn().unwrap().wait(&token, |_| {}).await;

        assert_eq!(report.outcome, ProcessOutcome::Exited { code: Some(0) });
        assert!(report.log.contains("tick 8"));
        assert!(!report.log.contains("[watchdog]"));
    }

    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let runner = sh("exec sleep 30", Duration::from_secs(60));
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let report = runner.spawn().unwrap().wait(&token, |_| {}).await;
        assert_eq!(report.outcome, ProcessOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let runner = ProcessRunner::new(
            "/definitely/not/a/downloader",
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(runner.spawn().is_err());
    }
}
