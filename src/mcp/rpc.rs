//! JSON-RPC 2.0 envelopes and the standard error codes
//!
//! Responses always carry `id` (null when it could not be recovered) and exactly one of
//! `result` or `error`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ToolError;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

const FALLBACK_PARSE_ERROR_LINE: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32700,"message":"Parse error"},"id":null}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    /// Extracts the envelope from an already parsed payload. Anything that is not an
    /// object with a non-empty string `method` yields the matching `InvalidRequest`
    /// response, echoing the id when one was present.
    pub fn from_value(payload: Value) -> Result<Self, JsonRpcResponse> {
        let Value::Object(mut fields) = payload else {
            return Err(JsonRpcResponse::error(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        let id = fields.remove("id").unwrap_or(Value::Null);
        let method = match fields.remove("method") {
            Some(Value::String(method)) if !method.trim().is_empty() => method,
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(JsonRpcResponse::error(
                    id,
                    RpcError::invalid_request("Method is required"),
                ))
            }
            Some(_) => {
                return Err(JsonRpcResponse::error(
                    id,
                    RpcError::invalid_request("Method must be a string"),
                ))
            }
        };
        let jsonrpc = match fields.remove("jsonrpc") {
            Some(Value::String(version)) => version,
            _ => JSONRPC_VERSION.to_string(),
        };

        Ok(Self {
            jsonrpc,
            method,
            params: fields.remove("params"),
            id,
        })
    }
}

impl RpcError {
    pub fn new(code: i32, message: &str, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    pub fn parse_error(data: impl Into<Value>) -> Self {
        Self::new(PARSE_ERROR, "Parse error", Some(data.into()))
    }

    pub fn invalid_request(data: impl Into<Value>) -> Self {
        Self::new(INVALID_REQUEST, "Invalid request", Some(data.into()))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found", Some(Value::from(method)))
    }

    pub fn invalid_params(data: impl Into<Value>) -> Self {
        Self::new(INVALID_PARAMS, "Invalid params", Some(data.into()))
    }

    pub fn internal_error(data: impl Into<Value>) -> Self {
        Self::new(INTERNAL_ERROR, "Internal error", Some(data.into()))
    }
}

impl From<ToolError> for RpcError {
    fn from(err: ToolError) -> Self {
        Self::invalid_params(err.to_string())
    }
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Single-line wire form of the response.
    pub fn to_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize json-rpc response");
                FALLBACK_PARSE_ERROR_LINE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_omits_error_and_keeps_id() {
        let line = JsonRpcResponse::success(json!("abc"), json!({"ok": true})).to_line();
        let value: Value = serde_json::from_str(&line).expect("valid json");

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], "abc");
        assert_eq!(value["result"]["ok"], true);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn error_omits_result_and_serializes_null_id() {
        let line = JsonRpcResponse::error(Value::Null, RpcError::parse_error("eof")).to_line();
        let value: Value = serde_json::from_str(&line).expect("valid json");

        assert!(value.get("result").is_none());
        assert!(value["id"].is_null());
        assert!(value.as_object().expect("object").contains_key("id"));
        assert_eq!(value["error"]["code"], PARSE_ERROR);
        assert_eq!(value["error"]["data"], "eof");
    }

    #[test]
    fn from_value_requires_method() {
        let response = JsonRpcRequest::from_value(json!({"id": "7"})).expect_err("no method");
        assert_eq!(response.id, json!("7"));
        assert_eq!(response.error.map(|err| err.code), Some(INVALID_REQUEST));
    }

    #[test]
    fn from_value_rejects_blank_method() {
        let response =
            JsonRpcRequest::from_value(json!({"method": "  ", "id": 3})).expect_err("blank");
        assert_eq!(response.id, json!(3));
        assert_eq!(response.error.map(|err| err.code), Some(INVALID_REQUEST));
    }

    #[test]
    fn from_value_rejects_non_object_payload() {
        let response = JsonRpcRequest::from_value(json!([1, 2])).expect_err("array");
        assert!(response.id.is_null());
        assert_eq!(response.error.map(|err| err.code), Some(INVALID_REQUEST));
    }

    #[test]
    fn from_value_keeps_params_and_defaults_version() {
        let request = JsonRpcRequest::from_value(json!({
            "method": "getTools",
            "params": {"x": 1},
        }))
        .expect("valid request");

        assert_eq!(request.jsonrpc, JSONRPC_VERSION);
        assert_eq!(request.method, "getTools");
        assert_eq!(request.params, Some(json!({"x": 1})));
        assert!(request.id.is_null());
    }

    #[test]
    fn tool_errors_become_invalid_params() {
        let error = RpcError::from(ToolError::UnknownTool("x".to_string()));
        assert_eq!(error.code, INVALID_PARAMS);
        assert_eq!(error.data, Some(json!("Unknown tool function: x")));
    }
}
