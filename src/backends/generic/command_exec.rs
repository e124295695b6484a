use crate::core::ExecContext;
use crate::error::{PkgtrailError, Result};
use crate::utils::sanitize;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_DETAIL_CHARS: usize = 400;

/// How long to wait for output pipes after the child is gone. Grandchildren
/// (a daemon started by an installer, a `sudo` subtree) can keep a pipe open
/// long after the direct child died.
const PIPE_GRACE_AFTER_EXIT: Duration = Duration::from_secs(5);
const PIPE_GRACE_AFTER_KILL: Duration = Duration::from_secs(1);

/// Owns a spawned child and guarantees it is killed and reaped when dropped
/// before it exited on its own.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn spawn(cmd: &mut Command, cmd_debug: &str) -> Result<Self> {
        let child = cmd.spawn().map_err(|e| PkgtrailError::SystemCommandFailed {
            command: cmd_debug.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            child,
            reaped: false,
        })
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    fn terminate(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.reaped = true;
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(reader) = reader {
            let _ = std::io::BufReader::new(reader).read_to_end(&mut buf);
        }
        buf
    })
}

/// Join a reader thread, giving up (and leaving it detached) at `deadline`.
fn collect(handle: JoinHandle<Vec<u8>>, deadline: Instant) -> Vec<u8> {
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    if handle.is_finished() {
        handle.join().unwrap_or_default()
    } else {
        Vec::new()
    }
}

/// Run a command non-interactively, capturing stdout and stderr.
///
/// Cancellation and the optional timeout both kill the child. The returned
/// error is `Cancelled` or `CommandTimedOut` respectively.
pub(crate) fn run_command(cmd: &mut Command, ctx: &ExecContext) -> Result<Output> {
    let cmd_debug = format!("{:?}", cmd);

    if ctx.cancel.is_cancelled() {
        return Err(PkgtrailError::Cancelled);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut guard = ChildGuard::spawn(cmd, &cmd_debug)?;

    let stdout_thread = drain(guard.child.stdout.take());
    let stderr_thread = drain(guard.child.stderr.take());

    let start = Instant::now();
    let waited = loop {
        match guard.try_wait() {
            Ok(Some(status)) => break Ok(status),
            Ok(None) => {
                if ctx.cancel.is_cancelled() {
                    break Err(PkgtrailError::Cancelled);
                }
                if let Some(timeout) = ctx.timeout
                    && start.elapsed() > timeout
                {
                    break Err(PkgtrailError::CommandTimedOut {
                        command: cmd_debug.clone(),
                        seconds: timeout.as_secs_f64(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                break Err(PkgtrailError::SystemCommandFailed {
                    command: cmd_debug.clone(),
                    reason: e.to_string(),
                });
            }
        }
    };

    guard.terminate();
    let grace = if waited.is_ok() {
        PIPE_GRACE_AFTER_EXIT
    } else {
        PIPE_GRACE_AFTER_KILL
    };
    let deadline = Instant::now() + grace;
    let stdout = collect(stdout_thread, deadline);
    let stderr = collect(stderr_thread, deadline);

    let status = waited?;
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

/// Compact diagnostic text for a failed command: exit code plus the tail
/// of stderr (or stdout when stderr is empty).
pub(crate) fn describe_failure(output: &Output) -> String {
    let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stderr.trim().is_empty() {
        stdout
    } else {
        stderr
    };

    let tail: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .rev()
        .take(5)
        .collect();
    let tail: Vec<&str> = tail.into_iter().rev().collect();

    if tail.is_empty() {
        format!("exit code {}", code)
    } else {
        format!(
            "exit code {}: {}",
            code,
            sanitize::sanitize_for_display(&tail.join(" | "), MAX_DETAIL_CHARS)
        )
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::CancelToken;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_output_and_status() {
        let output = run_command(&mut sh("echo out; echo err >&2; exit 3"), &ExecContext::default())
            .expect("command runs");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(describe_failure(&output), "exit code 3: err");
    }

    #[test]
    fn timeout_kills_the_child() {
        let ctx = ExecContext::new(CancelToken::new(), Some(Duration::from_millis(200)));
        let started = Instant::now();
        let err = run_command(&mut sh("exec sleep 5"), &ctx).unwrap_err();
        assert!(matches!(err, PkgtrailError::CommandTimedOut { .. }));
        assert!(err.to_string().ends_with("timed out after 0.2 seconds"), "{}", err);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn cancellation_kills_the_child() {
        let token = CancelToken::new();
        let ctx = ExecContext::new(token.clone(), None);
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            token.cancel();
        });
        let started = Instant::now();
        let err = run_command(&mut sh("exec sleep 5"), &ctx).unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, PkgtrailError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn already_cancelled_does_not_spawn() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = ExecContext::new(token, None);
        let err = run_command(&mut sh("exit 0"), &ctx).unwrap_err();
        assert!(matches!(err, PkgtrailError::Cancelled));
    }

    #[test]
    fn failure_without_output_reports_code() {
        let output = run_command(&mut sh("exit 1"), &ExecContext::default()).unwrap();
        assert_eq!(describe_failure(&output), "exit code 1");
    }
}
