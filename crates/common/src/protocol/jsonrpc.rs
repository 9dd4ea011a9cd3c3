// JSON-RPC 2.0 request/response types for the padsyncd socket protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CURRENT_PROTOCOL_VERSION: &str = "padsync-rpc.v1";
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &[CURRENT_PROTOCOL_VERSION];

#[must_use]
pub fn is_supported_protocol_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

/// A JSON-RPC 2.0 response (success).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: RequestId,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Request ID: integer, string, or null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Application error codes. `data.kind` carries the matching stable name.
pub const MALFORMED_CHANGESET: i32 = -32010;
pub const BANK_UNDERFLOW: i32 = -32011;
pub const DOCUMENT_LENGTH_MISMATCH: i32 = -32012;
pub const UNKNOWN_ATTRIBUTE_ID: i32 = -32013;
pub const SPAN_COVERAGE_MISMATCH: i32 = -32014;
pub const NOT_FOUND: i32 = -32020;
pub const INVALID_IDENTITY: i32 = -32021;
pub const HOST_FAILURE: i32 = -32030;

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            protocol_version: Some(CURRENT_PROTOCOL_VERSION.to_string()),
            method: method.into(),
            params,
            id,
        }
    }
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: Some(result), error: None, id }
    }

    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: None, error: Some(error), id }
    }
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_accepts_numbers_strings_and_null() {
        for (raw, expected) in [
            ("7", RequestId::Number(7)),
            (r#""abc""#, RequestId::String("abc".into())),
            ("null", RequestId::Null),
        ] {
            assert_eq!(serde_json::from_str::<RequestId>(raw).unwrap(), expected);
        }
    }

    #[test]
    fn error_response_omits_result() {
        let response = Response::error(
            RequestId::Number(1),
            RpcError::new(NOT_FOUND, "no such pad").with_data(serde_json::json!({ "kind": "NOT_FOUND" })),
        );
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], NOT_FOUND);
        assert_eq!(value["error"]["data"]["kind"], "NOT_FOUND");
    }

    #[test]
    fn new_requests_carry_the_current_protocol_version() {
        let request = Request::new("rpc.ping", None, RequestId::Number(1));
        assert!(is_supported_protocol_version(request.protocol_version.as_deref().unwrap()));
        assert!(!is_supported_protocol_version("padsync-rpc.v0"));
    }
}
