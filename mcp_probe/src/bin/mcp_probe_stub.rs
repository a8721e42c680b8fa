//! Minimal line-delimited JSON-RPC server used by the probe's integration tests.
//!
//! Usage: `mcp_probe_stub <mode> [tool-count]`
//!
//! - `echo [N]`: answer `initialize` with an empty result and `tools/list`
//!   with N tools (default 2)
//! - `exit`: exit straight away
//! - `garbage`: answer every request with a line that is not JSON
//! - `error`: answer every request with a JSON-RPC error
//! - `silent`: read requests, never answer
//! - `stubborn [N]`: like `echo`, but ignore SIGTERM and never exit on its own

use serde_json::{json, Value};
use std::io::{BufRead as _, Write};

use probe_protocol::{JSONRPC_VERSION, METHOD_INITIALIZE, METHOD_NOT_FOUND, METHOD_TOOLS_LIST};

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Echo,
    Exit,
    Garbage,
    Error,
    Silent,
    Stubborn,
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let mode = match args.next().as_deref() {
        None | Some("echo") => Mode::Echo,
        Some("exit") => Mode::Exit,
        Some("garbage") => Mode::Garbage,
        Some("error") => Mode::Error,
        Some("silent") => Mode::Silent,
        Some("stubborn") => Mode::Stubborn,
        Some(other) => anyhow::bail!("unknown mode {other:?}"),
    };
    let tool_count: usize = match args.next() {
        Some(n) => n.parse()?,
        None => 2,
    };

    if mode == Mode::Exit {
        eprintln!("stub exiting");
        return Ok(());
    }
    if mode == Mode::Stubborn {
        ignore_sigterm()?;
    }
    eprintln!("stub ready");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if let Some(reply) = handle_line(mode, tool_count, &line) {
            writeln!(stdout, "{reply}")?;
            stdout.flush()?;
        }
    }

    if mode == Mode::Stubborn {
        loop {
            std::thread::park();
        }
    }
    Ok(())
}

fn handle_line(mode: Mode, tool_count: usize, line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let msg: Value = serde_json::from_str(line).ok()?;
    // Notifications carry no id and get no reply
    let id = msg.get("id")?.clone();
    let method = msg.get("method").and_then(Value::as_str).unwrap_or_default();

    let reply = match mode {
        Mode::Silent | Mode::Exit => return None,
        Mode::Garbage => return Some("this is not json".to_string()),
        Mode::Error => error_reply(id, method),
        Mode::Echo | Mode::Stubborn => match method {
            METHOD_INITIALIZE => json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": {}}),
            METHOD_TOOLS_LIST => {
                let tools: Vec<Value> = (0..tool_count).map(|i| json!({"name": tool_name(i)})).collect();
                json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": {"tools": tools}})
            }
            _ => error_reply(id, method),
        },
    };
    Some(reply.to_string())
}

fn error_reply(id: Value, method: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {"code": METHOD_NOT_FOUND, "message": format!("Method not found: {method}")}
    })
}

fn tool_name(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => char::from(b'a' + i).to_string(),
        _ => format!("tool{index}"),
    }
}

#[cfg(unix)]
fn ignore_sigterm() -> anyhow::Result<()> {
    use nix::sys::signal::{signal, SigHandler, Signal};
    // SAFETY: installs SIG_IGN, no handler code runs.
    unsafe { signal(Signal::SIGTERM, SigHandler::SigIgn) }?;
    Ok(())
}

#[cfg(not(unix))]
fn ignore_sigterm() -> anyhow::Result<()> {
    Ok(())
}
