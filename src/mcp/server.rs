//! JSON-RPC method routing shared by the stdio and HTTP transports
//!
//! The dispatcher is a total function from request text to response envelope: every
//! failure below it is turned into an error object, never propagated.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::domain::{
    completions::{CompletionRequest, CompletionService},
    executor::ToolExecutor,
    registry::ToolRegistry,
};
use crate::mcp::rpc::{JsonRpcRequest, JsonRpcResponse, RpcError};

/// Methods understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Completions,
    ExecuteFunction,
    GetTools,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::Initialize,
        Method::Completions,
        Method::ExecuteFunction,
        Method::GetTools,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Completions => "completions",
            Method::ExecuteFunction => "executeFunction",
            Method::GetTools => "getTools",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }
}

#[derive(Clone)]
pub struct RpcDispatcher {
    registry: Arc<ToolRegistry>,
    executor: Arc<ToolExecutor>,
    completions: Arc<dyn CompletionService>,
}

impl RpcDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        executor: Arc<ToolExecutor>,
        completions: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            registry,
            executor,
            completions,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handles one wire line and returns the serialized response line.
    pub async fn handle_line(&self, line: &str) -> String {
        self.handle_text(line).await.to_line()
    }

    pub async fn handle_text(&self, text: &str) -> JsonRpcResponse {
        match serde_json::from_str::<Value>(text) {
            Ok(payload) => self.handle_value(payload).await,
            Err(err) => {
                debug!(error = %err, "rejecting unparseable json-rpc payload");
                JsonRpcResponse::error(Value::Null, RpcError::parse_error(err.to_string()))
            }
        }
    }

    pub async fn handle_value(&self, payload: Value) -> JsonRpcResponse {
        match JsonRpcRequest::from_value(payload) {
            Ok(request) => self.handle_request(request).await,
            Err(response) => {
                debug!(id = ?response.id, "rejecting malformed json-rpc envelope");
                response
            }
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let JsonRpcRequest {
            method, params, id, ..
        } = request;
        let audit_params = redact_audit_params(params.as_ref());

        let outcome = match Method::from_name(&method) {
            Some(known) => self.route(known, params).await,
            None => Err(RpcError::method_not_found(&method)),
        };

        let response = match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        };

        info!(
            method = %method,
            params = %audit_params,
            outcome = if response.is_error() { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }

    async fn route(&self, method: Method, params: Option<Value>) -> Result<Value, RpcError> {
        match method {
            Method::Initialize => Ok(json!({
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            })),
            Method::GetTools => serde_json::to_value(self.registry.list())
                .map_err(|err| RpcError::internal_error(err.to_string())),
            Method::ExecuteFunction => self.execute_function(params),
            Method::Completions => self.completions(params).await,
        }
    }

    fn execute_function(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let mut params = match params {
            Some(Value::Object(params)) => params,
            _ => Map::new(),
        };

        let (Some(function), Some(arguments)) = (params.remove("function"), params.remove("arguments"))
        else {
            return Err(RpcError::invalid_params(
                "Both 'function' and 'arguments' are required",
            ));
        };
        let Value::String(function) = function else {
            return Err(RpcError::invalid_params("'function' must be a string"));
        };

        let arguments = serde_json::to_string(&arguments)
            .map_err(|err| RpcError::internal_error(err.to_string()))?;

        Ok(self.executor.execute(&function, &arguments)?)
    }

    async fn completions(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let request: CompletionRequest = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;

        let response = self
            .completions
            .complete(request)
            .await
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;

        serde_json::to_value(response).map_err(|err| RpcError::internal_error(err.to_string()))
    }
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey" | "cardnumber" | "cvv"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
