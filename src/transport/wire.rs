//! Wire message types for the framed stdio channel.
//!
//! Messages are JSON-RPC 2.0 objects, one per line. Error codes follow
//! JSON-RPC conventions:
//! - -32700 to -32600: standard JSON-RPC errors
//! - -32000: specialist (application-level) failure

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version exchanged during the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "1.0";

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// A bound specialist collaborator failed for one call.
pub const SPECIALIST_FAILURE: i64 = -32000;

/// One framed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Application-level error carried in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// One framed response. Exactly one of `result`/`error` is set. `id` is
/// null only when the request could not be parsed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<u64>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Identity a host reports during the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Result payload of the `initialize` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_info: ServerInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let req = Request::new(7, "call_capability", serde_json::json!({"name": "x"}));
        let line = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.id, 7);
        assert_eq!(parsed.method, "call_capability");
        assert_eq!(parsed.jsonrpc, "2.0");
        assert_eq!(parsed.params["name"], "x");
    }

    #[test]
    fn test_request_params_default_to_null() {
        let parsed: Request =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"list_capabilities"}"#)
                .unwrap();
        assert!(parsed.params.is_null());
    }

    #[test]
    fn test_success_response_omits_error() {
        let resp = Response::success(3, serde_json::json!({"ok": true}));
        let line = serde_json::to_string(&resp).unwrap();
        assert!(!line.contains("\"error\""));
        let parsed: Response = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.id, Some(3));
        assert!(parsed.error.is_none());
    }

    #[test]
    fn test_failure_response_with_null_id() {
        let resp = Response::failure(None, PARSE_ERROR, "Parse error");
        let line = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.id, None);
        assert_eq!(parsed.error.as_ref().unwrap().code, PARSE_ERROR);
        assert!(parsed.result.is_none());
    }
}
