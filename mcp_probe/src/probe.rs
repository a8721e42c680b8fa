use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{error, info};

use crate::channel::{Channel, ProcessChannel, TeardownReport};
use crate::config::ProbeConfig;
use crate::diagnostics::Diagnostics;
use crate::error::ProbeError;
use crate::handshake::{run_handshake, HandshakeOutcome, ProbeState};

/// Everything a run observed.
#[derive(Debug)]
pub struct ProbeReport {
    /// States in the order they were entered, always ending in `Terminated`.
    pub transitions: Vec<ProbeState>,
    pub tool_count: Option<usize>,
    pub failure: Option<ProbeError>,
    /// `None` only when there was no child to tear down.
    pub teardown: Option<TeardownReport>,
}

impl ProbeReport {
    /// Furthest state reached before termination.
    pub fn reached(&self) -> ProbeState {
        self.transitions
            .iter()
            .rev()
            .find(|s| **s != ProbeState::Terminated)
            .copied()
            .unwrap_or(ProbeState::NotStarted)
    }

    pub fn final_state(&self) -> ProbeState {
        self.transitions.last().copied().unwrap_or(ProbeState::NotStarted)
    }

    pub fn succeeded(&self) -> bool {
        self.reached() == ProbeState::ToolsListed
    }
}

fn transitions_up_to(reached: ProbeState) -> Vec<ProbeState> {
    let mut transitions: Vec<ProbeState> = [
        ProbeState::NotStarted,
        ProbeState::Launched,
        ProbeState::Initialized,
        ProbeState::ToolsListed,
    ]
    .into_iter()
    .filter(|s| *s <= reached)
    .collect();
    transitions.push(ProbeState::Terminated);
    transitions
}

/// Launch the configured child, run the handshake against it, tear it down.
pub async fn run_probe(config: &ProbeConfig, diagnostics: &mut Diagnostics) -> ProbeReport {
    diagnostics.line(format_args!("Starting process: {}", config.command_line()));

    let channel = match ProcessChannel::launch(config) {
        Ok(channel) => channel,
        Err(e) => {
            error!("Launch failed: {}", e);
            diagnostics.failure(format_args!("Error during test: {}", e));
            return ProbeReport {
                transitions: transitions_up_to(ProbeState::NotStarted),
                tool_count: None,
                failure: Some(e),
                teardown: None,
            };
        }
    };

    tokio::time::sleep(config.startup_grace).await;
    run_session(channel, config, diagnostics).await
}

/// Run the handshake over an already launched channel and always tear it
/// down afterwards, even if the handshake panics.
pub async fn run_session<C: Channel>(mut channel: C, config: &ProbeConfig, diagnostics: &mut Diagnostics) -> ProbeReport {
    let handshake = AssertUnwindSafe(run_handshake(&mut channel, diagnostics, config.settle_delay))
        .catch_unwind()
        .await;
    let outcome = handshake.unwrap_or_else(|panic| {
        let message = panic_message(panic.as_ref());
        error!("Handshake panicked: {}", message);
        diagnostics.failure(format_args!("Error during test: {}", message));
        HandshakeOutcome {
            reached: ProbeState::Launched,
            tool_count: None,
            failure: Some(ProbeError::Unexpected(message)),
        }
    });

    info!("Handshake reached {:?}, tearing down", outcome.reached);
    let teardown = channel.teardown(config.terminate_timeout).await;
    if !teardown.stderr.is_empty() {
        diagnostics.line(format_args!("STDERR: {}", teardown.stderr));
    }

    ProbeReport {
        transitions: transitions_up_to(outcome.reached),
        tool_count: outcome.tool_count,
        failure: outcome.failure,
        teardown: Some(teardown),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
