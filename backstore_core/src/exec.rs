//! Bounded execution of external helper processes.
//!
//! A call never waits longer than its timeout. When the deadline passes the
//! child is sent a kill signal and reaped by a detached thread; the call
//! returns right away and does not confirm that the process has exited.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::config::{Timeouts, DEFAULT_COMMAND_TIMEOUT};
use crate::error::{Error, Result};

const PIPE_CHUNK: usize = 8 * 1024;

/// Runs external commands under a deadline and returns their combined
/// stdout/stderr.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    timeout: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl Executor {
    /// `timeout` applies to every [`run`](Executor::run) call.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_timeouts(timeouts: &Timeouts) -> Self {
        Self::new(timeouts.command)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `binary` with `args` under the default timeout.
    pub fn run<S: AsRef<OsStr>>(&self, binary: &str, args: &[S]) -> Result<String> {
        self.run_with_timeout(binary, args, self.timeout)
    }

    /// Run `binary` with `args`, giving up after `timeout`.
    ///
    /// Returns [`Error::Timeout`] with the output captured so far when the
    /// deadline passes, and [`Error::Execution`] when the process cannot be
    /// spawned or exits unsuccessfully.
    pub fn run_with_timeout<S: AsRef<OsStr>>(
        &self,
        binary: &str,
        args: &[S],
        timeout: Duration,
    ) -> Result<String> {
        let command = render_command(binary, args);
        // `None` when the timeout is too large to represent: wait without limit.
        let deadline = Instant::now().checked_add(timeout);
        debug!(%command, ?timeout, "executing");

        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Execution {
                command: command.clone(),
                output: String::new(),
                source,
            })?;

        let chunks = spawn_pumps(&mut child);
        let (output, drained) = collect_until(&chunks, deadline);

        let waited = match (drained, deadline) {
            (false, _) => Ok(None),
            (true, Some(deadline)) => {
                child.wait_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            (true, None) => child.wait().map(Some),
        };

        match waited {
            Ok(Some(status)) => {
                let output = String::from_utf8_lossy(&output).into_owned();
                check_status(command, output, status)
            }
            Ok(None) => {
                let mut output = output;
                output.extend(chunks.try_iter().flatten());
                abandon(child);
                warn!(%command, ?timeout, "command timed out");
                Err(Error::Timeout {
                    command,
                    output: String::from_utf8_lossy(&output).into_owned(),
                })
            }
            Err(source) => {
                abandon(child);
                Err(Error::Execution {
                    command,
                    output: String::from_utf8_lossy(&output).into_owned(),
                    source,
                })
            }
        }
    }
}

/// `binary arg1 arg2 ...`, for error messages and logs.
pub fn render_command<S: AsRef<OsStr>>(binary: &str, args: &[S]) -> String {
    let mut command = binary.to_string();
    for arg in args {
        command.push(' ');
        command.push_str(&arg.as_ref().to_string_lossy());
    }
    command
}

/// Start one reader thread per output pipe. The receiver disconnects once both
/// pipes have reached EOF.
fn spawn_pumps(child: &mut Child) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        pump(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        pump(stderr, tx);
    }
    rx
}

fn pump(mut pipe: impl Read + Send + 'static, tx: Sender<Vec<u8>>) {
    thread::spawn(move || {
        let mut buf = [0u8; PIPE_CHUNK];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Gather output until every pipe closes (`true`) or the deadline passes
/// (`false`). Without a deadline, waits for the pipes to close.
fn collect_until(chunks: &Receiver<Vec<u8>>, deadline: Option<Instant>) -> (Vec<u8>, bool) {
    let mut output = Vec::new();
    let Some(deadline) = deadline else {
        output.extend(chunks.iter().flatten());
        return (output, true);
    };
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match chunks.recv_timeout(remaining) {
            Ok(chunk) => output.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => return (output, true),
            Err(RecvTimeoutError::Timeout) => return (output, false),
        }
    }
}

fn check_status(command: String, output: String, status: ExitStatus) -> Result<String> {
    if status.success() {
        return Ok(output);
    }
    Err(Error::Execution {
        command,
        output,
        source: io::Error::other(status.to_string()),
    })
}

/// Signal the child and reap it off-thread so it does not linger as a zombie.
fn abandon(mut child: Child) {
    let _ = child.kill();
    thread::spawn(move || {
        let _ = child.wait();
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const EMPTY: [&str; 0] = [];

    #[test]
    fn captures_stdout() {
        let out = Executor::default().run("echo", &["hello", "world"]).unwrap();
        assert_eq!(out, "hello world\n");
    }

    #[test]
    fn combines_stdout_and_stderr() {
        let out = Executor::default()
            .run("sh", &["-c", "echo out; echo err 1>&2"])
            .unwrap();
        assert!(out.contains("out\n"), "missing stdout in {out:?}");
        assert!(out.contains("err\n"), "missing stderr in {out:?}");
    }

    #[test]
    fn timeout_returns_near_deadline() {
        let start = Instant::now();
        let err = Executor::default()
            .run_with_timeout("sleep", &["5"], Duration::from_millis(100))
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(err.is_timeout(), "expected timeout, got {err:?}");
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
        match err {
            Error::Timeout { command, .. } => assert_eq!(command, "sleep 5"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn timeout_keeps_partial_output() {
        let err = Executor::new(Duration::from_millis(500))
            .run("sh", &["-c", "echo started; sleep 5"])
            .unwrap_err();
        match err {
            Error::Timeout { output, .. } => assert!(output.contains("started"), "{output:?}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nonzero_exit_is_execution_error() {
        let err = Executor::default()
            .run("sh", &["-c", "echo broken; exit 3"])
            .unwrap_err();
        assert!(!err.is_timeout());
        match err {
            Error::Execution { command, output, .. } => {
                assert_eq!(command, "sh -c echo broken; exit 3");
                assert_eq!(output, "broken\n");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_binary_is_execution_error() {
        let err = Executor::default()
            .run("/nonexistent/backstore-helper", &EMPTY)
            .unwrap_err();
        match err {
            Error::Execution { source, output, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
                assert!(output.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unrepresentable_timeout_means_no_deadline() {
        let out = Executor::new(Duration::MAX).run("echo", &["done"]).unwrap();
        assert_eq!(out, "done\n");

        Executor::new(Duration::from_secs(u64::MAX))
            .run("true", &EMPTY)
            .unwrap();
    }

    #[test]
    fn false_fails() {
        let err = Executor::default().run("false", &EMPTY).unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));
    }

    #[test]
    fn render_joins_with_spaces() {
        assert_eq!(render_command("mount", &EMPTY), "mount");
        assert_eq!(render_command("umount", &["-f", "/mnt/x"]), "umount -f /mnt/x");
    }
}
