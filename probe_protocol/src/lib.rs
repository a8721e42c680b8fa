use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod id_generator;

pub use id_generator::IdGenerator;

/// JSON-RPC version literal carried by every message
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version the probe announces in `initialize`
pub const PROBE_PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names used by the handshake
pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_TOOLS_LIST: &str = "tools/list";

/// JSON-RPC error code for an unknown method
pub const METHOD_NOT_FOUND: i64 = -32601;

fn default_jsonrpc() -> String {
    JSONRPC_VERSION.to_string()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// A request expects a response carrying the same `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: Value, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id,
            method: method.into(),
            params: Some(params),
        }
    }
}

/// Fire-and-forget message: no `id`, never answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            method: method.into(),
            params: Some(params),
        }
    }
}

/// A response line from the server.
///
/// `jsonrpc` and `id` are optional on the way in and `error` is kept as raw
/// JSON: any JSON object is accepted and it is up to the caller to decide
/// whether it answers anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl JsonRpcResponse {
    /// The `error` member, if it has the standard `{code, message}` shape.
    pub fn rpc_error(&self) -> Option<JsonRpcError> {
        self.error
            .as_ref()
            .and_then(|error| serde_json::from_value(error.clone()).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Name and version of either side of the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCapabilities {
    pub roots: RootsCapability,
    #[serde(default = "empty_object")]
    pub sampling: Value,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            roots: RootsCapability { list_changed: true },
            sampling: empty_object(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RootsCapability {
    #[serde(rename = "listChanged", default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

impl InitializeParams {
    /// Parameters announcing `client_info` with the probe's fixed protocol
    /// version and capabilities.
    pub fn new(client_info: Implementation) -> Self {
        Self {
            protocol_version: PROBE_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info,
        }
    }
}
