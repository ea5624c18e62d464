#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::typeset::compiler::CompileError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Compile(CompileError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<CompileError> for AppError {
    fn from(err: CompileError) -> Self {
        match err {
            // Input problems are the caller's to fix; everything else stays a
            // compile-side failure.
            CompileError::Input(msg) => AppError::Validation(msg),
            other => AppError::Compile(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Compile(err) => {
                tracing::error!("Compile error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    compile_error_code(err),
                    err.to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// Stable machine-readable code for each compile failure kind.
fn compile_error_code(err: &CompileError) -> &'static str {
    match err {
        CompileError::Input(_) => "VALIDATION_ERROR",
        CompileError::ToolchainUnavailable => "TOOLCHAIN_UNAVAILABLE",
        CompileError::CompileFailure { .. } => "COMPILE_FAILED",
        CompileError::Timeout { .. } => "COMPILE_TIMEOUT",
        CompileError::OutputMissing => "OUTPUT_MISSING",
        CompileError::Workspace(_) => "WORKSPACE_IO",
    }
}
