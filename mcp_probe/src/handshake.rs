use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use probe_protocol::{
    IdGenerator, Implementation, InitializeParams, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_TOOLS_LIST,
};

use crate::channel::Channel;
use crate::diagnostics::Diagnostics;
use crate::error::{ProbeError, Result};

pub const CLIENT_NAME: &str = "debug-client";
pub const CLIENT_VERSION: &str = "1.0.0";

/// Where a run is. States only move forward; every run ends in `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProbeState {
    NotStarted,
    Launched,
    Initialized,
    ToolsListed,
    Terminated,
}

/// How far the handshake got and why it stopped, if it did.
#[derive(Debug)]
pub struct HandshakeOutcome {
    pub reached: ProbeState,
    pub tool_count: Option<usize>,
    pub failure: Option<ProbeError>,
}

impl HandshakeOutcome {
    fn stopped_at(reached: ProbeState, failure: ProbeError) -> Self {
        Self {
            reached,
            tool_count: None,
            failure: Some(failure),
        }
    }
}

/// Serialize `message` onto one line, echo it, and write it to the channel.
pub async fn send_message<C, M>(channel: &mut C, diagnostics: &mut Diagnostics, message: &M) -> Result<()>
where
    C: Channel + ?Sized,
    M: Serialize + ?Sized,
{
    let line = serde_json::to_string(message)?;
    diagnostics.line(format_args!("SENDING: {}", line));
    channel.write_line(&line).await?;
    Ok(())
}

/// Read and parse one response line.
///
/// Malformed lines and stream faults are echoed as `ERROR reading response`;
/// end of stream is [`ProbeError::Closed`]. The caller treats every error
/// here as "no response".
pub async fn read_response<C>(channel: &mut C, diagnostics: &mut Diagnostics) -> Result<JsonRpcResponse>
where
    C: Channel + ?Sized,
{
    let line = match channel.read_line().await {
        Ok(Some(line)) => line,
        Ok(None) => return Err(ProbeError::Closed),
        Err(e) => {
            diagnostics.failure(format_args!("ERROR reading response: {}", e));
            return Err(ProbeError::ReadIo(e));
        }
    };

    diagnostics.line(format_args!("RECEIVED: {}", line));
    serde_json::from_str(&line).map_err(|source| {
        diagnostics.failure(format_args!("ERROR reading response: {}", source));
        ProbeError::Read { line, source }
    })
}

/// Send `request` and read the next line as its answer, insisting on a `result`.
async fn call<C>(channel: &mut C, diagnostics: &mut Diagnostics, request: &JsonRpcRequest) -> Result<Value>
where
    C: Channel + ?Sized,
{
    info!("Sending request method: {}, id: {}", request.method, request.id);
    send_message(channel, diagnostics, request).await?;
    let response = read_response(channel, diagnostics).await?;

    if response.id != request.id {
        // Trusted, not enforced
        warn!("Response id {} does not match request id {}", response.id, request.id);
    }
    expect_result(response)
}

fn expect_result(response: JsonRpcResponse) -> Result<Value> {
    match response.result {
        Some(result) => Ok(result),
        None => Err(ProbeError::Protocol(match (response.rpc_error(), &response.error) {
            (Some(error), _) => format!("server returned error {}: {}", error.code, error.message),
            (None, Some(raw)) => format!("server returned error: {}", raw),
            (None, None) => format!(
                "response has no result: {}",
                serde_json::to_string(&response).unwrap_or_default()
            ),
        })),
    }
}

fn initialize_request(ids: &IdGenerator) -> Result<JsonRpcRequest> {
    let params = InitializeParams::new(Implementation {
        name: CLIENT_NAME.to_string(),
        version: CLIENT_VERSION.to_string(),
    });
    Ok(JsonRpcRequest::new(
        ids.next_id(),
        METHOD_INITIALIZE,
        serde_json::to_value(params)?,
    ))
}

/// Entries of a `tools/list` result, taken as-is; a missing `tools` field
/// means none.
pub fn parse_tools(mut result: Value) -> Result<Vec<Value>> {
    match result.get_mut("tools").map(Value::take) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(tools)) => Ok(tools),
        Some(other) => Err(ProbeError::Protocol(format!(
            "malformed tools/list result: tools is not a list: {other}"
        ))),
    }
}

/// Display label for one tool entry: its name, or the raw entry if it has none.
fn tool_label(tool: &Value) -> String {
    match tool.get("name").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => tool.to_string(),
    }
}

/// Drive `initialize`, `notifications/initialized` and `tools/list` over an
/// already launched channel.
///
/// Never returns an error: each step reports its own success or failure on
/// the diagnostic stream and the first failure stops the sequence.
pub async fn run_handshake<C>(channel: &mut C, diagnostics: &mut Diagnostics, settle_delay: Duration) -> HandshakeOutcome
where
    C: Channel + ?Sized,
{
    let ids = IdGenerator::new();

    let initialized = match initialize_request(&ids) {
        Ok(request) => call(channel, diagnostics, &request).await,
        Err(e) => Err(e),
    };
    match initialized {
        Ok(result) => {
            debug!("Initialize result: {}", result);
            diagnostics.success("INITIALIZE successful!");
        }
        Err(e) => {
            diagnostics.failure(format_args!("INITIALIZE failed: {}", e));
            return HandshakeOutcome::stopped_at(ProbeState::Launched, e);
        }
    }

    let notification = JsonRpcNotification::new(METHOD_INITIALIZED, json!({}));
    if let Err(e) = send_message(channel, diagnostics, &notification).await {
        diagnostics.failure(format_args!("Error during test: {}", e));
        return HandshakeOutcome::stopped_at(ProbeState::Launched, e);
    }
    diagnostics.success("INITIALIZED notification sent!");

    tokio::time::sleep(settle_delay).await;

    let request = JsonRpcRequest::new(ids.next_id(), METHOD_TOOLS_LIST, json!({}));
    let tools = match call(channel, diagnostics, &request).await.and_then(parse_tools) {
        Ok(tools) => tools,
        Err(e) => {
            diagnostics.failure(format_args!("TOOLS/LIST failed: {}", e));
            return HandshakeOutcome::stopped_at(ProbeState::Initialized, e);
        }
    };

    diagnostics.success("TOOLS/LIST successful!");
    diagnostics.line(format_args!("Found {} tools", tools.len()));
    for (i, tool) in tools.iter().enumerate() {
        diagnostics.line(format_args!("Tool {}: {}", i + 1, tool_label(tool)));
    }

    HandshakeOutcome {
        reached: ProbeState::ToolsListed,
        tool_count: Some(tools.len()),
        failure: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_protocol::METHOD_NOT_FOUND;

    #[test]
    fn tool_count_for_zero_one_many() {
        for n in [0usize, 1, 7] {
            let tools: Vec<Value> = (0..n).map(|i| json!({"name": format!("t{i}")})).collect();
            let parsed = parse_tools(json!({ "tools": tools })).unwrap();
            assert_eq!(parsed.len(), n);
        }
    }

    #[test]
    fn missing_tools_field_counts_as_none() {
        assert!(parse_tools(json!({})).unwrap().is_empty());
    }

    #[test]
    fn tool_entries_are_opaque() {
        let parsed = parse_tools(json!({"tools": [{"name": "a", "x": 1}, {"name": null}, "b", 3]})).unwrap();
        assert_eq!(parsed.len(), 4);
        assert_eq!(tool_label(&parsed[0]), "a");
        assert_eq!(tool_label(&parsed[1]), r#"{"name":null}"#);
        assert_eq!(tool_label(&parsed[2]), r#""b""#);
    }

    #[test]
    fn tools_must_be_a_list() {
        let err = parse_tools(json!({"tools": {"name": "a"}})).unwrap_err();
        assert!(matches!(err, ProbeError::Protocol(_)));
    }

    #[test]
    fn empty_result_object_still_counts_as_result() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap();
        assert_eq!(expect_result(response).unwrap(), json!({}));
    }

    #[test]
    fn error_response_is_a_protocol_error() {
        let response = JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: json!(1),
            result: None,
            error: Some(json!({"code": METHOD_NOT_FOUND, "message": "Method not found"})),
        };
        let err = expect_result(response).unwrap_err();
        assert_eq!(err.to_string(), "server returned error -32601: Method not found");
    }

    #[test]
    fn nonstandard_error_is_reported_raw() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"error":"backend down"}"#).unwrap();
        let err = expect_result(response).unwrap_err();
        assert_eq!(err.to_string(), r#"server returned error: "backend down""#);
    }

    #[test]
    fn result_wins_over_malformed_error() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":{},"error":"x"}"#).unwrap();
        assert_eq!(expect_result(response).unwrap(), json!({}));
    }

    #[test]
    fn initialize_request_uses_first_id() {
        let ids = IdGenerator::new();
        let request = initialize_request(&ids).unwrap();
        assert_eq!(request.id, json!(1));
        assert_eq!(request.method, "initialize");
        assert_eq!(request.params.unwrap()["clientInfo"]["name"], "debug-client");
        assert_eq!(ids.next_id(), json!(2));
    }
}
