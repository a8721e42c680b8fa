// Runs the probe against the real `mcp_probe_stub` child process.

use mcp_probe::{run_probe, Diagnostics, ProbeConfig, ProbeError, ProbeState};
use std::time::Duration;

const STUB: &str = env!("CARGO_BIN_EXE_mcp_probe_stub");

fn stub_config(args: &[&str]) -> ProbeConfig {
    ProbeConfig {
        startup_grace: Duration::ZERO,
        settle_delay: Duration::ZERO,
        terminate_timeout: Duration::from_secs(5),
        // Keeps a broken stub from hanging the test suite
        read_timeout: Some(Duration::from_secs(10)),
        ..ProbeConfig::for_command(STUB, args.iter().copied())
    }
}

#[tokio::test]
async fn test_stub_with_two_tools() {
    let (mut diagnostics, captured) = Diagnostics::capture();

    let report = run_probe(&stub_config(&["echo", "2"]), &mut diagnostics).await;

    let out = captured.contents();
    assert!(out.contains("Starting process:"), "{out}");
    assert!(out.contains("SENDING: {\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\""), "{out}");
    assert!(out.contains("RECEIVED: "), "{out}");
    assert!(out.contains("INITIALIZE successful!"), "{out}");
    assert!(out.contains("INITIALIZED notification sent!"), "{out}");
    assert!(out.contains("Found 2 tools"), "{out}");
    assert!(out.contains("Tool 1: a"), "{out}");
    assert!(out.contains("Tool 2: b"), "{out}");
    assert!(out.contains("STDERR: stub ready"), "{out}");

    assert!(report.succeeded());
    assert_eq!(report.tool_count, Some(2));
    assert_eq!(report.final_state(), ProbeState::Terminated);
    let teardown = report.teardown.expect("child must be torn down");
    assert!(!teardown.forced);
}

#[tokio::test]
async fn test_stub_with_no_tools() {
    let (mut diagnostics, captured) = Diagnostics::capture();

    let report = run_probe(&stub_config(&["echo", "0"]), &mut diagnostics).await;

    assert!(captured.contents().contains("Found 0 tools"));
    assert_eq!(report.tool_count, Some(0));
}

#[tokio::test]
async fn test_stub_that_exits_immediately() {
    let mut config = stub_config(&["exit"]);
    // Let the stub finish exiting so the first read sees end of stream
    config.startup_grace = Duration::from_millis(300);
    let (mut diagnostics, captured) = Diagnostics::capture();

    let report = run_probe(&config, &mut diagnostics).await;

    let out = captured.contents();
    assert!(out.contains("INITIALIZE failed"), "{out}");
    assert!(!out.contains("INITIALIZED notification sent!"), "{out}");
    assert!(out.contains("STDERR: stub exiting"), "{out}");

    assert_eq!(report.reached(), ProbeState::Launched);
    assert_eq!(report.final_state(), ProbeState::Terminated);
    let failure = report.failure.expect("failure must be recorded");
    // Depending on timing the write hits a closed pipe or the read hits EOF
    assert!(
        failure.is_absent_response() || matches!(failure, ProbeError::Send(_)),
        "{failure}"
    );
    assert!(report.teardown.is_some());
}

#[tokio::test]
async fn test_stub_answering_garbage() {
    let (mut diagnostics, captured) = Diagnostics::capture();

    let report = run_probe(&stub_config(&["garbage"]), &mut diagnostics).await;

    let out = captured.contents();
    assert!(out.contains("RECEIVED: this is not json"), "{out}");
    assert!(out.contains("ERROR reading response:"), "{out}");
    assert!(out.contains("INITIALIZE failed"), "{out}");
    assert!(matches!(report.failure, Some(ProbeError::Read { .. })));
}

#[tokio::test]
async fn test_stub_answering_errors() {
    let (mut diagnostics, captured) = Diagnostics::capture();

    let report = run_probe(&stub_config(&["error"]), &mut diagnostics).await;

    assert!(captured
        .contents()
        .contains("INITIALIZE failed: server returned error -32601: Method not found: initialize"));
    assert!(matches!(report.failure, Some(ProbeError::Protocol(_))));
}

#[tokio::test]
async fn test_silent_stub_hits_read_timeout() {
    let mut config = stub_config(&["silent"]);
    config.read_timeout = Some(Duration::from_millis(200));
    let (mut diagnostics, captured) = Diagnostics::capture();

    let report = run_probe(&config, &mut diagnostics).await;

    let out = captured.contents();
    assert!(out.contains("ERROR reading response:"), "{out}");
    assert!(out.contains("INITIALIZE failed"), "{out}");
    assert!(matches!(report.failure, Some(ProbeError::ReadIo(_))));
    assert!(report.teardown.is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn test_stubborn_stub_is_killed() {
    let mut config = stub_config(&["stubborn", "1"]);
    config.terminate_timeout = Duration::from_millis(300);
    let (mut diagnostics, captured) = Diagnostics::capture();

    let report = run_probe(&config, &mut diagnostics).await;

    assert!(captured.contents().contains("Found 1 tools"));
    assert!(report.succeeded());
    let teardown = report.teardown.as_ref().expect("child must be torn down");
    assert!(teardown.forced, "SIGTERM is ignored, so teardown must kill");
}

#[tokio::test]
async fn test_missing_executable() {
    let config = ProbeConfig {
        startup_grace: Duration::ZERO,
        ..ProbeConfig::for_command("/definitely/not/a/real/server", Vec::<String>::new())
    };
    let (mut diagnostics, captured) = Diagnostics::capture();

    let report = run_probe(&config, &mut diagnostics).await;

    assert!(matches!(report.failure, Some(ProbeError::Launch { .. })));
    assert!(report.teardown.is_none());
    assert_eq!(
        report.transitions,
        vec![ProbeState::NotStarted, ProbeState::Terminated]
    );
    assert!(captured.contents().contains("Error during test: failed to start"));
}
