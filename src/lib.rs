use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;

use domain::{
    completions::{CompletionService, RuleBasedCompletions},
    executor::ToolExecutor,
    inspector::InteractionLog,
    registry::ToolRegistry,
};
use mcp::server::RpcDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub executor: Arc<ToolExecutor>,
    pub completions: Arc<dyn CompletionService>,
    pub inspector: Arc<InteractionLog>,
    pub dispatcher: RpcDispatcher,
}

impl AppState {
    /// Wires the default tool set and the rule-based completion service.
    pub fn new(inspector_capacity: usize) -> Self {
        let registry = Arc::new(ToolRegistry::with_default_tools());
        let executor = Arc::new(ToolExecutor::new(registry.clone()));
        let completions = Arc::new(RuleBasedCompletions::new(executor.clone()));
        Self::with_services(registry, executor, completions, inspector_capacity)
    }

    pub fn with_services(
        registry: Arc<ToolRegistry>,
        executor: Arc<ToolExecutor>,
        completions: Arc<dyn CompletionService>,
        inspector_capacity: usize,
    ) -> Self {
        let dispatcher = RpcDispatcher::new(registry.clone(), executor.clone(), completions.clone());
        Self {
            registry,
            executor,
            completions,
            inspector: Arc::new(InteractionLog::new(inspector_capacity)),
            dispatcher,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(http::handlers::health))
        .route("/completions", post(http::handlers::completions))
        .route("/tools", get(http::handlers::list_tools))
        .route("/tools/{function}", get(http::handlers::get_tool))
        .route("/tools/{function}/execute", post(http::handlers::execute_tool))
        .route(
            "/inspector",
            get(http::handlers::list_interactions).delete(http::handlers::clear_interactions),
        )
        .route("/inspector/{id}", get(http::handlers::get_interaction))
        .route("/jsonrpc", post(http::handlers::jsonrpc_endpoint));

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        extract::connect_info::ConnectInfo,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::domain::completions::{CompletionRequest, CompletionResponse};
    use crate::errors::AppError;

    use super::*;

    struct CannedCompletions;

    #[async_trait::async_trait]
    impl CompletionService for CannedCompletions {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, AppError> {
            Ok(CompletionResponse::text(format!(
                "echo: {}",
                request.effective_query()
            )))
        }
    }

    fn state() -> AppState {
        let registry = Arc::new(ToolRegistry::with_default_tools());
        let executor = Arc::new(ToolExecutor::new(registry.clone()));
        AppState::with_services(registry, executor, Arc::new(CannedCompletions), 10)
    }

    fn app() -> Router {
        build_app(state())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&body).expect("valid json response")
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request build")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .expect("request build")
    }

    #[tokio::test]
    async fn health_reports_running() {
        let response = app()
            .oneshot(get_request("/api/v1/health"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        assert_eq!(body, "MCP Server is running");
    }

    #[tokio::test]
    async fn root_get_is_not_found() {
        let response = app()
            .oneshot(get_request("/"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_listing_matches_registry_order() {
        let response = app()
            .oneshot(get_request("/api/v1/tools"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = body_json(response).await;
        let tools = body_json.as_array().expect("array");
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["function"], "improveAuthorizationRate");
        assert_eq!(tools[1]["function"], "calculate");
        assert_eq!(tools[1]["type"], "function");
        assert_eq!(
            tools[0]["parameters"]["timeframe"]["default"],
            "last_30_days"
        );
    }

    #[tokio::test]
    async fn single_tool_lookup() {
        let response = app()
            .oneshot(get_request("/api/v1/tools/calculate"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = body_json(response).await;
        assert_eq!(body_json["function"], "calculate");
        assert_eq!(body_json["parameters"]["a"]["type"], "number");
    }

    #[tokio::test]
    async fn unknown_tool_lookup_is_not_found() {
        let response = app()
            .oneshot(get_request("/api/v1/tools/launchRocket"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body_json = body_json(response).await;
        assert_eq!(body_json["code"], "tool_not_found");
    }

    #[tokio::test]
    async fn execute_tool_returns_result_and_records_interaction() {
        let state = state();
        let app = build_app(state.clone());

        let mut request = post_json(
            "/api/v1/tools/calculate/execute",
            r#"{"operation":"multiply","a":4,"b":2.5}"#,
        );
        request
            .extensions_mut()
            .insert(ConnectInfo(std::net::SocketAddr::from(([10, 0, 0, 7], 4321))));
        let response = app.oneshot(request).await.expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = body_json(response).await;
        assert_eq!(body_json["result"].as_f64(), Some(10.0));
        assert_eq!(body_json["expression"], "4.0 × 2.5 = 10.0");

        let recorded = state.inspector.all();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].client_ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(recorded[0].request_path, "/api/v1/tools/calculate/execute");
        assert_eq!(recorded[0].additional_info["toolFunction"], "calculate");
    }

    #[tokio::test]
    async fn execute_tool_failure_is_bad_request() {
        let state = state();
        let response = build_app(state.clone())
            .oneshot(post_json(
                "/api/v1/tools/calculate/execute",
                r#"{"operation":"divide","a":1,"b":0}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body_json = body_json(response).await;
        assert_eq!(body_json["code"], "tool_execution_failed");
        assert_eq!(
            body_json["message"],
            "Tool execution failed: Division by zero is not allowed"
        );
        assert!(state.inspector.is_empty());
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_not_found() {
        let response = app()
            .oneshot(post_json("/api/v1/tools/launchRocket/execute", "{}"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body_json = body_json(response).await;
        assert_eq!(body_json["code"], "unknown_tool");
    }

    #[tokio::test]
    async fn execute_tool_rejects_non_object_body() {
        let state = state();
        let response = build_app(state.clone())
            .oneshot(post_json("/api/v1/tools/calculate/execute", "[1,2]"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body_json = body_json(response).await;
        assert_eq!(body_json["code"], "invalid_json");
        assert!(state.inspector.is_empty());
    }

    #[tokio::test]
    async fn malformed_completion_body_is_json_bad_request() {
        let state = state();
        let response = build_app(state.clone())
            .oneshot(post_json("/api/v1/completions", "{not json"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body_json = body_json(response).await;
        assert_eq!(body_json["code"], "invalid_json");
        assert!(body_json["message"]
            .as_str()
            .is_some_and(|message| message.starts_with("invalid request body")));
        assert!(state.inspector.is_empty());
    }

    #[tokio::test]
    async fn completions_are_answered_and_inspectable() {
        let state = state();

        let response = build_app(state.clone())
            .oneshot(post_json("/api/v1/completions", r#"{"query":"hello"}"#))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["content"], "echo: hello");

        let id = state.inspector.all()[0].id.clone();
        let response = build_app(state.clone())
            .oneshot(get_request(&format!("/api/v1/inspector/{id}")))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        let body_json = body_json(response).await;
        assert_eq!(body_json["requestPath"], "/api/v1/completions");
        assert_eq!(body_json["request"]["query"], "hello");
        assert_eq!(body_json["response"]["content"], "echo: hello");
    }

    #[tokio::test]
    async fn inspector_lists_and_clears() {
        let state = state();
        for query in ["first", "second"] {
            build_app(state.clone())
                .oneshot(post_json(
                    "/api/v1/completions",
                    &format!(r#"{{"query":"{query}"}}"#),
                ))
                .await
                .expect("request execution");
        }

        let response = build_app(state.clone())
            .oneshot(get_request("/api/v1/inspector"))
            .await
            .expect("request execution");
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(2));
        assert_eq!(listed[0]["request"]["query"], "second");

        let response = build_app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/v1/inspector")
                    .method("DELETE")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.inspector.is_empty());
    }

    #[tokio::test]
    async fn missing_interaction_is_not_found() {
        let response = app()
            .oneshot(get_request("/api/v1/inspector/does-not-exist"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn jsonrpc_unknown_method_returns_method_not_found() {
        let response = app()
            .oneshot(post_json(
                "/api/v1/jsonrpc",
                r#"{"jsonrpc":"2.0","id":1,"method":"unknown"}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        assert_eq!(
            body,
            "{\"jsonrpc\":\"2.0\",\"error\":{\"code\":-32601,\"message\":\"Method not found\",\"data\":\"unknown\"},\"id\":1}"
        );
    }

    #[tokio::test]
    async fn jsonrpc_execute_function_returns_result() {
        let response = app()
            .oneshot(post_json(
                "/api/v1/jsonrpc",
                r#"{"jsonrpc":"2.0","id":"calc","method":"executeFunction","params":{"function":"calculate","arguments":{"operation":"add","a":2,"b":3}}}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = body_json(response).await;
        assert_eq!(body_json["id"], "calc");
        assert_eq!(body_json["result"]["result"].as_f64(), Some(5.0));
    }

    #[tokio::test]
    async fn jsonrpc_malformed_body_is_parse_error() {
        let response = app()
            .oneshot(post_json("/api/v1/jsonrpc", "{not json"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body_json = body_json(response).await;
        assert_eq!(body_json["error"]["code"], -32700);
        assert!(body_json["id"].is_null());
    }
}
