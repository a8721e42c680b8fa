use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, error, info, warn};

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};

/// Line-oriented link to the server under test.
#[async_trait]
pub trait Channel: Send {
    /// Write `line` followed by `\n` and flush.
    async fn write_line(&mut self, line: &str) -> std::io::Result<()>;

    /// Next line without its terminator, `Ok(None)` at end of stream.
    async fn read_line(&mut self) -> std::io::Result<Option<String>>;

    /// Stop the other side and collect whatever it left on its error output.
    /// Called exactly once, as the last thing a run does with the channel.
    async fn teardown(&mut self, terminate_timeout: Duration) -> TeardownReport;
}

#[derive(Debug, Default)]
pub struct TeardownReport {
    /// The child ignored the graceful request and had to be killed.
    pub forced: bool,
    pub exit_status: Option<ExitStatus>,
    pub stderr: String,
}

/// A spawned child process speaking JSON-RPC over its standard streams.
pub struct ProcessChannel {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: Option<ChildStderr>,
    read_timeout: Option<Duration>,
}

impl ProcessChannel {
    /// Spawn the configured command with all three streams piped.
    pub fn launch(config: &ProbeConfig) -> Result<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Spawning process: {:?}", command);
        let launch_error = |source: std::io::Error| ProbeError::Launch {
            command: config.command_line(),
            source,
        };
        let mut child = command.spawn().map_err(launch_error)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| launch_error(missing_pipe("stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| launch_error(missing_pipe("stdout")))?;
        let stderr = child.stderr.take();

        info!("Child process started with PID {:?}", child.id());

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr,
            read_timeout: config.read_timeout,
        })
    }

    async fn drain_stderr(&mut self, limit: Duration) -> String {
        let Some(mut stderr) = self.stderr.take() else {
            return String::new();
        };

        let mut buf = Vec::new();
        match tokio::time::timeout(limit, stderr.read_to_end(&mut buf)).await {
            Ok(Ok(n)) => debug!("Drained {} bytes of child stderr", n),
            Ok(Err(e)) => error!("Error reading child stderr: {}", e),
            // A grandchild may still hold the pipe open
            Err(_) => warn!("Child stderr still open after {:?}; keeping what was read", limit),
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn missing_pipe(name: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("child {name} was not captured"),
    )
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => {
            debug!("Sending SIGTERM to PID {}", pid);
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to PID {}: {}", pid, e);
            }
        }
        None => debug!("Child already reaped, nothing to signal"),
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to request child termination: {}", e);
    }
}

#[async_trait]
impl Channel for ProcessChannel {
    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let framed = format!("{line}\n");
        self.stdin.write_all(framed.as_bytes()).await?;
        self.stdin.flush().await
    }

    async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let n = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.stdout.read_line(&mut line))
                .await
                .map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("no response within {limit:?}"),
                    )
                })??,
            None => self.stdout.read_line(&mut line).await?,
        };

        if n == 0 {
            debug!("EOF on child stdout");
            return Ok(None);
        }
        debug!("Read {} bytes from child stdout", n);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    async fn teardown(&mut self, terminate_timeout: Duration) -> TeardownReport {
        request_termination(&mut self.child);

        let mut forced = false;
        let exit_status = match tokio::time::timeout(terminate_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!("Child exited with {}", status);
                Some(status)
            }
            Ok(Err(e)) => {
                error!("Error waiting for child exit: {}", e);
                None
            }
            Err(_) => {
                warn!("Child still running after {:?}, killing it", terminate_timeout);
                forced = true;
                if let Err(e) = self.child.kill().await {
                    error!("Failed to kill child: {}", e);
                }
                self.child.try_wait().ok().flatten()
            }
        };

        let stderr = self.drain_stderr(terminate_timeout).await;
        TeardownReport {
            forced,
            exit_status,
            stderr,
        }
    }
}
