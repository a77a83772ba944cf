//! HTTP surface.
//!
//! | Route | Response |
//! |---|---|
//! | `GET /agv-proc?dni=<digits>` | card descriptor with the generated file URL |
//! | `GET /status` | liveness and version |
//! | `GET <static_prefix>/*` | generated files from `assets.output_dir` |
//!
//! Validation happens before any I/O: a bad `dni` never reaches the
//! upstream. Every failure leaves this module as JSON through [`ApiError`].

use crate::config::AppConfig;
use crate::pipeline::{Pipeline, PipelineError, PipelineOutcome};
use crate::types::{Dni, ValidationError};
use crate::upstream::UpstreamError;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// `text` value when OCR produced nothing.
pub const NO_TEXT_MESSAGE: &str = "No se pudo extraer texto del documento.";

pub struct AppState {
    pub pipeline: Pipeline,
    pub bot_name: String,
}

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Errors as the HTTP client sees them.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(e) => {
                warn!("Rejected request: {e}");
                let body = serde_json::json!({
                    "error": "invalid_dni",
                    "message": format!("{e}. Example: /agv-proc?dni=12345678"),
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::Pipeline(e) => {
                error!("Request failed: {e}");
                let body = serde_json::json!({
                    "error": "processing_failed",
                    "detail": e.to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProcResponse {
    pub bot: String,
    pub timestamp: String,
    pub fields: BTreeMap<String, String>,
    pub text: String,
    pub urls: FileUrls,
}

#[derive(Debug, Serialize)]
pub struct FileUrls {
    #[serde(rename = "FILE")]
    pub file: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub bot: String,
    pub version: &'static str,
    pub timestamp: String,
}

/// Build the success body, falling back to [`NO_TEXT_MESSAGE`] for empty text.
pub fn proc_response(
    bot: &str,
    fields: BTreeMap<String, String>,
    outcome: PipelineOutcome,
) -> ProcResponse {
    let text = if outcome.ocr.text.trim().is_empty() {
        NO_TEXT_MESSAGE.to_string()
    } else {
        outcome.ocr.text
    };
    ProcResponse {
        bot: bot.to_string(),
        timestamp: timestamp(),
        fields,
        text,
        urls: FileUrls {
            file: outcome.file_url,
        },
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn agv_proc(
    State(state): State<Arc<AppState>>,
    Query(fields): Query<BTreeMap<String, String>>,
) -> Result<Json<ProcResponse>, ApiError> {
    let raw = fields.get("dni").ok_or(ValidationError::MissingDni)?;
    let dni = Dni::parse(raw)?;
    info!("Processing dni={dni}");
    let outcome = state.pipeline.run(&dni).await?;
    Ok(Json(proc_response(&state.bot_name, fields, outcome)))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        bot: state.bot_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: timestamp(),
    })
}

/// Routes plus the static mount for generated files.
pub fn router(config: &AppConfig, pipeline: Pipeline) -> Router {
    let state = Arc::new(AppState {
        pipeline,
        bot_name: config.server.bot_name.clone(),
    });
    Router::new()
        .route("/agv-proc", get(agv_proc))
        .route("/status", get(status))
        .nest_service(
            &config.server.static_prefix,
            ServeDir::new(&config.assets.output_dir),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `server.bind` and serve until Ctrl-C.
pub async fn serve(config: &AppConfig) -> Result<(), ServeError> {
    let pipeline = Pipeline::from_config(config)?;
    let app = router(config, pipeline);
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.server.bind.clone(),
            source,
        })?;
    info!(
        "Listening on {} (files under {} from {})",
        listener.local_addr()?,
        config.server.static_prefix,
        config.assets.output_dir.display()
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RenderReport;
    use crate::ocr::OcrOutcome;

    fn outcome(text: &str) -> PipelineOutcome {
        PipelineOutcome {
            file_url: "http://localhost:3000/generated/agv_1.png".to_string(),
            ocr: OcrOutcome {
                text: text.to_string(),
                failure: None,
            },
            candidates: 2,
            report: RenderReport::default(),
        }
    }

    fn fields() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("dni".to_string(), "12345678".to_string()),
            ("source".to_string(), "bot".to_string()),
        ])
    }

    #[test]
    fn response_echoes_fields_and_file_url() {
        let body = serde_json::to_value(proc_response("agv-proc", fields(), outcome("NOMBRE")))
            .unwrap();
        assert_eq!(body["bot"], "agv-proc");
        assert_eq!(body["fields"]["dni"], "12345678");
        assert_eq!(body["fields"]["source"], "bot");
        assert_eq!(body["text"], "NOMBRE");
        assert_eq!(body["urls"]["FILE"], "http://localhost:3000/generated/agv_1.png");
        assert!(body["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn empty_text_falls_back_to_message() {
        let body = proc_response("agv-proc", fields(), outcome("  \n "));
        assert_eq!(body.text, NO_TEXT_MESSAGE);
    }

    #[test]
    fn validation_error_is_400() {
        let response = ApiError::from(ValidationError::MalformedDni("abc".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn over_long_dni_is_400() {
        let err = Dni::parse(&"1".repeat(300)).unwrap_err();
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn pipeline_error_is_500() {
        let err = PipelineError::Upstream(UpstreamError::MissingFileUrl);
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
