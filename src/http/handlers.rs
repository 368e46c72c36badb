//! Axum HTTP handlers for the web server
//!
//! REST endpoints delegate to the same registry, executor and completion service as the
//! JSON-RPC dispatcher. Completions and direct tool executions are recorded in the
//! interaction inspector.

use std::{convert::Infallible, net::SocketAddr, time::Instant};

use axum::{
    body::Bytes,
    extract::{connect_info::ConnectInfo, FromRequestParts, OriginalUri, Path, State},
    http::{header, request::Parts, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::domain::{
    completions::{CompletionRequest, CompletionResponse},
    inspector::{Interaction, NewInteraction},
    registry::Tool,
};
use crate::errors::AppError;
use crate::mcp::rpc::{JsonRpcResponse, RpcError};
use crate::AppState;

/// Caller details recorded alongside inspected interactions.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub method: String,
    pub path: String,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        // Nested routers strip their prefix from `parts.uri`.
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|OriginalUri(uri)| uri.path())
            .unwrap_or_else(|| parts.uri.path())
            .to_string();

        Ok(Self {
            ip,
            user_agent,
            method: parts.method.to_string(),
            path,
        })
    }
}

impl ClientInfo {
    fn additional_info(&self, processing_time_ms: u64) -> Map<String, Value> {
        Map::from_iter([
            ("processingTimeMs".to_string(), json!(processing_time_ms)),
            ("userAgent".to_string(), json!(self.user_agent)),
        ])
    }

    fn interaction(
        self,
        request: CompletionRequest,
        response: CompletionResponse,
        processing_time_ms: u64,
        additional_info: Map<String, Value>,
    ) -> NewInteraction {
        NewInteraction {
            client_ip: self.ip,
            request_path: self.path,
            request_method: self.method,
            request,
            response,
            processing_time_ms,
            additional_info,
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request("invalid_json", format!("invalid request body: {err}")))
}

fn elapsed_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub async fn health() -> &'static str {
    "MCP Server is running"
}

pub async fn completions(
    State(state): State<AppState>,
    client: ClientInfo,
    body: Bytes,
) -> Result<Json<CompletionResponse>, AppError> {
    let request: CompletionRequest = parse_body(&body)?;
    debug!(query = %request.effective_query(), "received completion request");

    let started_at = Instant::now();
    let response = state.completions.complete(request.clone()).await?;
    let processing_time_ms = elapsed_ms(started_at);

    let additional_info = client.additional_info(processing_time_ms);
    state.inspector.record(client.interaction(
        request,
        response.clone(),
        processing_time_ms,
        additional_info,
    ));

    Ok(Json(response))
}

pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<Tool>> {
    Json(state.registry.list().to_vec())
}

pub async fn get_tool(
    State(state): State<AppState>,
    Path(function): Path<String>,
) -> Result<Json<Tool>, AppError> {
    state
        .registry
        .lookup(&function)
        .cloned()
        .map(Json)
        .ok_or_else(|| {
            AppError::not_found("tool_not_found", format!("tool {function} is not registered"))
        })
}

pub async fn execute_tool(
    State(state): State<AppState>,
    Path(function): Path<String>,
    client: ClientInfo,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let arguments: Map<String, Value> = parse_body(&body)?;
    info!(function = %function, "direct tool execution requested");

    let started_at = Instant::now();
    let arguments = Value::Object(arguments);
    let result = state.executor.execute(&function, &arguments.to_string())?;
    let processing_time_ms = elapsed_ms(started_at);

    let request = CompletionRequest {
        query: Some(format!("Direct tool invocation: {function}")),
        context: Some(Map::from_iter([
            ("function".to_string(), json!(function)),
            ("arguments".to_string(), arguments),
        ])),
        ..CompletionRequest::default()
    };
    let response = CompletionResponse {
        content: "Tool execution result".to_string(),
        metadata: Some(Map::from_iter([("result".to_string(), result.clone())])),
        ..CompletionResponse::default()
    };
    let mut additional_info = client.additional_info(processing_time_ms);
    additional_info.insert("toolFunction".to_string(), json!(function));
    state.inspector.record(client.interaction(
        request,
        response,
        processing_time_ms,
        additional_info,
    ));

    Ok(Json(result))
}

pub async fn list_interactions(State(state): State<AppState>) -> Json<Vec<Interaction>> {
    Json(state.inspector.all())
}

pub async fn get_interaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Interaction>, AppError> {
    state.inspector.get(&id).map(Json).ok_or_else(|| {
        AppError::not_found("interaction_not_found", format!("interaction {id} not found"))
    })
}

pub async fn clear_interactions(State(state): State<AppState>) -> StatusCode {
    state.inspector.clear();
    StatusCode::OK
}

/// Single JSON-RPC envelope in, single envelope out. Protocol errors are reported in
/// the envelope, so the status is always 200.
pub async fn jsonrpc_endpoint(State(state): State<AppState>, body: Bytes) -> Json<JsonRpcResponse> {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            return Json(JsonRpcResponse::error(
                Value::Null,
                RpcError::parse_error(err.to_string()),
            ))
        }
    };

    Json(state.dispatcher.handle_value(payload).await)
}
