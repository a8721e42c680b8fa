use std::time::Duration;

use crate::error::{ProbeError, Result};

pub const COMMAND_VAR: &str = "MCP_PROBE_COMMAND";
pub const ARGS_VAR: &str = "MCP_PROBE_ARGS";
pub const READ_TIMEOUT_VAR: &str = "MCP_PROBE_READ_TIMEOUT_SECS";

fn default_command() -> String {
    "python".to_string()
}

fn default_args() -> Vec<String> {
    vec!["../filesystem_mcp_server/src/main.py".to_string()]
}

fn default_startup_grace() -> Duration {
    Duration::from_secs(2)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_terminate_timeout() -> Duration {
    Duration::from_secs(5)
}

/// What to launch and how long to wait at each fixed pause.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Pause after spawning, before the first write.
    pub startup_grace: Duration,
    /// Pause between the `initialized` notification and `tools/list`.
    pub settle_delay: Duration,
    /// How long teardown waits after the graceful signal before killing.
    pub terminate_timeout: Duration,
    /// `None` means reads block until the child answers or closes stdout.
    pub read_timeout: Option<Duration>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            startup_grace: default_startup_grace(),
            settle_delay: default_settle_delay(),
            terminate_timeout: default_terminate_timeout(),
            read_timeout: None,
        }
    }
}

impl ProbeConfig {
    /// Default timings, custom child command.
    pub fn for_command<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Defaults, overridden by `MCP_PROBE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(command) = lookup(COMMAND_VAR).filter(|c| !c.trim().is_empty()) {
            config.command = command.trim().to_string();
        }

        if let Some(args) = lookup(ARGS_VAR) {
            config.args = shellwords::split(&args)
                .map_err(|_| ProbeError::Config(format!("{ARGS_VAR} has unmatched quotes")))?;
        }

        if let Some(secs) = lookup(READ_TIMEOUT_VAR) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                ProbeError::Config(format!("{READ_TIMEOUT_VAR}={secs:?} is not a whole number of seconds: {e}"))
            })?;
            config.read_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// The command and its arguments joined for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
