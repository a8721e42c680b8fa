use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcp_probe::{run_probe, Diagnostics, ProbeConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = ProbeConfig::from_env().context("Invalid probe configuration")?;
    info!("Probe configuration: {:?}", config);

    let mut diagnostics = Diagnostics::stderr();
    let report = run_probe(&config, &mut diagnostics).await;
    info!(
        "Run finished: reached {:?}, tools {:?}, failure {:?}",
        report.reached(),
        report.tool_count,
        report.failure
    );

    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
