//! HTTP surface: `POST /grade` and `GET /health`.
//!
//! The handler only parses the multipart form and hands a [`Submission`] to
//! the shared [`GradingPipeline`]. Every failure is turned into a JSON
//! `{"error": ...}` body exactly once, here, using
//! [`GradeError::status_code`].

use crate::error::{GradeError, InputError};
use crate::grade::{Evaluation, GradingPipeline, Submission};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::any::Any as PanicPayload;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Multipart field carrying the answer sheet.
pub const FILE_FIELD: &str = "student_answer_pdf";
/// Multipart field carrying the rubric text.
pub const RUBRIC_FIELD: &str = "rubric";

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<GradingPipeline>,
}

impl AppState {
    pub fn new(pipeline: GradingPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/grade", post(grade_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn grade_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Evaluation>, GradeError> {
    let submission = parse_submission(multipart).await?;
    let evaluation = state.pipeline.grade(submission).await?;
    Ok(Json(evaluation))
}

/// Read the two form fields. Unknown fields are drained and ignored.
///
/// Only presence is checked here: an empty file part is left to fail the
/// PDF check, and a rubric counts as missing only when absent or empty.
pub async fn parse_submission(mut multipart: Multipart) -> Result<Submission, InputError> {
    let mut file: Option<Vec<u8>> = None;
    let mut rubric: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read form field", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            FILE_FIELD => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file data", e))?;
                file = Some(data.to_vec());
            }
            RUBRIC_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Failed to read rubric", e))?;
                rubric = Some(text);
            }
            other => {
                field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(&format!("Failed to read field '{other}'"), e))?;
            }
        }
    }

    let answer_pdf = file.ok_or(InputError::MissingFile)?;
    let rubric = rubric
        .filter(|r| !r.is_empty())
        .ok_or(InputError::MissingRubric)?;

    Ok(Submission { rubric, answer_pdf })
}

/// Body-limit overflows become `TooLarge`; everything else is `Malformed`.
fn multipart_error(context: &str, e: MultipartError) -> InputError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        InputError::TooLarge(e.body_text())
    } else {
        InputError::Malformed(format!("{context}: {}", e.body_text()))
    }
}

/// Turn a handler panic into a 500 with the usual `{"error": ...}` body.
fn panic_response(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    GradeError::Internal(format!("Internal error: {detail}")).into_response()
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for GradeError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("Grading failed: {}", self);
        } else {
            warn!("Rejected submission: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Bind `addr` and serve until Ctrl+C / SIGTERM.
pub async fn serve(
    addr: std::net::SocketAddr,
    state: AppState,
    max_upload_bytes: usize,
) -> std::io::Result<()> {
    let app = router(state, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Grading server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown..."),
    }
}
