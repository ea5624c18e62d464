use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::state::AppState;
use crate::typeset::compiler::compile_markdown;

/// Download name used when the request does not provide one.
const DEFAULT_FILENAME: &str = "resume.pdf";

#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    pub content: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// POST /api/latex/compile
///
/// Compiles markdown content into a PDF and returns it as a download.
/// Input problems come back as 400; toolchain-side failures as 500.
pub async fn handle_compile(
    State(state): State<AppState>,
    Json(req): Json<CompileRequest>,
) -> Result<Response, AppError> {
    let pdf = compile_markdown(
        &req.content,
        state.toolchain.as_ref(),
        &state.config.compile_options(),
    )
    .await?;

    let filename = disposition_filename(req.filename.as_deref());
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, pdf).into_response())
}

/// Builds a safe download filename. Control characters, double quotes, and
/// backslashes would corrupt the `Content-Disposition` header, so they are
/// stripped; when nothing usable remains the default name is used.
fn disposition_filename(requested: Option<&str>) -> String {
    let Some(name) = requested else {
        return DEFAULT_FILENAME.to_string();
    };
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}
