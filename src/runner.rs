use crate::error::{MirrorError, Result};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const DRAIN_GRACE: Duration = Duration::from_secs(2);
const MAX_DETAIL_CHARS: usize = 2000;

pub const TIMEOUT_MARKER: &str = "timed out";

/// One external process invocation. Arguments are passed to the program
/// directly, never through a shell.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    pub env: Vec<(String, String)>,
}

impl CommandRequest {
    pub fn new(
        program: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        CommandRequest {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            timeout,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub error: Option<String>,
    pub timeout: Duration,
    pub elapsed: Duration,
}

impl CommandResult {
    /// Turns an unsuccessful result into the matching error.
    pub fn into_checked(self) -> Result<CommandResult> {
        if self.success {
            return Ok(self);
        }
        if self.timed_out {
            return Err(MirrorError::ProcessTimeout {
                command: self.command,
                seconds: self.timeout.as_secs_f32(),
            });
        }
        Err(MirrorError::ProcessFailure {
            detail: self
                .error
                .clone()
                .unwrap_or_else(|| "unknown failure".to_string()),
            command: self.command,
        })
    }
}

/// Runs external commands. Ordinary command failure is reported through
/// [`CommandResult::success`]; `Err` is reserved for processes that could not
/// be started at all.
pub trait CommandRunner: Send + Sync {
    fn execute(&self, request: &CommandRequest) -> Result<CommandResult>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn execute(&self, request: &CommandRequest) -> Result<CommandResult> {
        if !request.working_dir.is_dir() {
            return Err(MirrorError::NotFound(request.working_dir.clone()));
        }

        let command = request.command_line();
        log::debug!("Running `{}` in {}", command, request.working_dir.display());

        let started = Instant::now();
        let mut child = Command::new(&request.program)
            .args(&request.args)
            .current_dir(&request.working_dir)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MirrorError::ProcessSpawn {
                program: request.program.clone(),
                source,
            })?;

        let stdout_rx = drain(child.stdout.take());
        let stderr_rx = drain(child.stderr.take());

        let deadline = started + request.timeout;
        let mut wait_error = None;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        break None;
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    wait_error = Some(format!("failed waiting for process: {}", e));
                    break None;
                }
            }
        };

        let stdout = collect(stdout_rx);
        let stderr = collect(stderr_rx);
        let elapsed = started.elapsed();

        let mut result = CommandResult {
            command,
            stdout,
            stderr,
            timeout: request.timeout,
            elapsed,
            ..CommandResult::default()
        };

        match status {
            Some(status) => {
                result.exit_code = status.code();
                result.success = status.success();
                if !result.success {
                    let code = status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string());
                    result.error = Some(format!(
                        "exit code {}: {}",
                        code,
                        truncate_detail(result.stderr.trim())
                    ));
                }
            }
            None if wait_error.is_some() => {
                result.error = wait_error;
            }
            None => {
                result.timed_out = true;
                result.error = Some(format!(
                    "{} after {}s",
                    TIMEOUT_MARKER,
                    request.timeout.as_secs_f32()
                ));
                log::warn!("`{}` {} after {:?}", result.command, TIMEOUT_MARKER, elapsed);
            }
        }

        if !result.success {
            log::debug!(
                "`{}` failed: {}",
                result.command,
                result.error.as_deref().unwrap_or("")
            );
        }

        Ok(result)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
    }
    rx
}

// A grandchild that inherited the pipe can keep it open past the kill, so
// the reader gets a bounded grace period instead of a join.
fn collect(rx: mpsc::Receiver<Vec<u8>>) -> String {
    rx.recv_timeout(DRAIN_GRACE)
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

pub(crate) fn truncate_detail(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_command_line_rendering() {
        let req = CommandRequest::new("git", "/tmp", Duration::from_secs(1))
            .arg("pull")
            .args(["--ff-only", "--quiet"]);
        assert_eq!(req.command_line(), "git pull --ff-only --quiet");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dir = tempdir().unwrap();
        let req = CommandRequest::new(
            "rctx-definitely-not-a-real-binary",
            dir.path(),
            Duration::from_secs(1),
        );
        let err = ProcessRunner.execute(&req).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ProcessSpawn);
    }

    #[test]
    fn test_missing_working_dir_is_not_found() {
        let dir = tempdir().unwrap();
        let req = CommandRequest::new("git", dir.path().join("nope"), Duration::from_secs(1));
        let err = ProcessRunner.execute(&req).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_on_success() {
        let dir = tempdir().unwrap();
        let req = CommandRequest::new("echo", dir.path(), Duration::from_secs(5)).arg("hello");
        let result = ProcessRunner.execute(&req).unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.error.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_failure_not_error() {
        let dir = tempdir().unwrap();
        let req = CommandRequest::new("sh", dir.path(), Duration::from_secs(5))
            .args(["-c", "echo boom >&2; exit 3"]);
        let result = ProcessRunner.execute(&req).unwrap();
        assert!(!result.success);
        assert!(!result.timed_out);
        assert_eq!(result.exit_code, Some(3));
        assert!(result.error.as_deref().unwrap().contains("boom"));

        let err = result.into_checked().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ProcessFailure);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let dir = tempdir().unwrap();
        let req = CommandRequest::new("sleep", dir.path(), Duration::from_secs(1)).arg("5");
        let started = Instant::now();
        let result = ProcessRunner.execute(&req).unwrap();
        let elapsed = started.elapsed();

        assert!(!result.success);
        assert!(result.timed_out);
        assert!(result.error.as_deref().unwrap().starts_with(TIMEOUT_MARKER));
        assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);

        let err = result.into_checked().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ProcessTimeout);
    }

    #[test]
    fn test_sub_second_timeout_keeps_fraction() {
        let result = CommandResult {
            command: "git pull".to_string(),
            timed_out: true,
            timeout: Duration::from_millis(250),
            ..CommandResult::default()
        };
        let err = result.into_checked().unwrap_err();
        assert_eq!(err.to_string(), "`git pull` timed out after 0.25s");
    }

    #[test]
    fn test_truncate_detail() {
        let long = "x".repeat(MAX_DETAIL_CHARS + 10);
        let cut = truncate_detail(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), MAX_DETAIL_CHARS + 3);
        assert_eq!(truncate_detail("short"), "short");
    }
}
