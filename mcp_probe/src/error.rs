use thiserror::Error;

/// Everything that can go wrong during a probe run.
///
/// None of these escape a run: they are logged to the diagnostic stream and
/// recorded in the [`ProbeReport`](crate::ProbeReport).
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to start `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write to child stdin: {0}")]
    Send(#[from] std::io::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("malformed response line {line:?}: {source}")]
    Read {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read child stdout: {0}")]
    ReadIo(std::io::Error),

    #[error("child closed its output without responding")]
    Closed,

    #[error("{0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unexpected fault: {0}")]
    Unexpected(String),
}

impl ProbeError {
    /// True for the read-side faults that leave the caller without a response.
    pub fn is_absent_response(&self) -> bool {
        matches!(
            self,
            ProbeError::Read { .. } | ProbeError::ReadIo(_) | ProbeError::Closed
        )
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
