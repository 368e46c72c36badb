use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not found: {message}")]
    NotFound { code: &'static str, message: String },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

/// Failures raised while resolving or running a registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Unknown tool function: {0}")]
    UnknownTool(String),
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }
}

impl From<ToolError> for AppError {
    fn from(err: ToolError) -> Self {
        let message = err.to_string();
        match err {
            ToolError::UnknownTool(_) => Self::not_found("unknown_tool", message),
            ToolError::InvalidArguments(_) => Self::bad_request("invalid_arguments", message),
            ToolError::ExecutionFailed(_) => Self::bad_request("tool_execution_failed", message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_errors_keep_their_message_on_the_http_side() {
        let err = AppError::from(ToolError::ExecutionFailed(
            "Division by zero is not allowed".to_string(),
        ));

        assert!(matches!(
            err,
            AppError::BadRequest {
                code: "tool_execution_failed",
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "bad request: Tool execution failed: Division by zero is not allowed"
        );
    }

    #[test]
    fn unknown_tool_maps_to_not_found() {
        let response = AppError::from(ToolError::UnknownTool("nope".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_error_hides_details() {
        let response = AppError::internal("database exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
