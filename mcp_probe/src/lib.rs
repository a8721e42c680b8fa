//! Smoke-test probe for line-delimited JSON-RPC (MCP) servers.
//!
//! Launches the server as a child process, runs `initialize`,
//! `notifications/initialized` and `tools/list` against it, reports every
//! step on a diagnostic stream and always tears the child down.

pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod handshake;
pub mod probe;

pub use channel::{Channel, ProcessChannel, TeardownReport};
pub use config::ProbeConfig;
pub use diagnostics::{CapturedOutput, Diagnostics};
pub use error::{ProbeError, Result};
pub use handshake::{read_response, run_handshake, send_message, HandshakeOutcome, ProbeState};
pub use probe::{run_probe, run_session, ProbeReport};
