//! One request, end to end: fetch → OCR → scan → render → persist.
//!
//! Stages run strictly in sequence. The OCR subprocess and the
//! decode/scan/render step are CPU-bound and run on tokio's blocking pool;
//! the source bytes are shared between them through an `Arc` and the image
//! is decoded exactly once.
//!
//! OCR failure is absorbed (see [`crate::ocr::recognize_or_empty`]); every
//! other stage failure ends the request with a [`PipelineError`].

use crate::config::AppConfig;
use crate::imaging::{Compositor, GridScanner, RenderError, RenderOutput, RenderRequest};
use crate::imaging::{RenderReport, decode_source};
use crate::ocr::{OcrOutcome, TextRecognizer, recognize_or_empty, recognizer_from_config};
use crate::store::{AssetStore, LocalAssetStore, StoreError};
use crate::types::{Candidate, Dni, TextLine};
use crate::upstream::{HttpUpstream, Upstream, UpstreamError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("upstream: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("render: {0}")]
    Render(#[from] RenderError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Everything a finished request produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub file_url: String,
    pub ocr: OcrOutcome,
    pub candidates: usize,
    pub report: RenderReport,
}

/// A rendered card and the candidates it was built from.
#[derive(Debug, Clone)]
pub struct RenderedCard {
    pub output: RenderOutput,
    pub candidates: Vec<Candidate>,
}

/// Decode `source`, detect candidates and render the card.
pub fn render_card(
    scanner: &GridScanner,
    compositor: &Compositor,
    source: &[u8],
    lines: &[TextLine],
    identifier: &str,
) -> Result<RenderedCard, RenderError> {
    let image = decode_source(source)?;
    let candidates = scanner.detect(&image);
    info!(
        "Detected {} candidates in {}x{} source",
        candidates.len(),
        image.width(),
        image.height()
    );
    let output = compositor.render(&RenderRequest {
        source: &image,
        candidates: &candidates,
        lines,
        identifier,
    })?;
    Ok(RenderedCard { output, candidates })
}

pub struct Pipeline {
    upstream: Arc<dyn Upstream>,
    recognizer: Arc<dyn TextRecognizer>,
    scanner: GridScanner,
    compositor: Arc<Compositor>,
    store: Arc<dyn AssetStore>,
}

impl Pipeline {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        recognizer: Arc<dyn TextRecognizer>,
        scanner: GridScanner,
        compositor: Compositor,
        store: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            upstream,
            recognizer,
            scanner,
            compositor: Arc::new(compositor),
            store,
        }
    }

    /// Production wiring: HTTP upstream, configured OCR, local store.
    pub fn from_config(config: &AppConfig) -> Result<Self, UpstreamError> {
        Ok(Self::new(
            Arc::new(HttpUpstream::new(&config.upstream)?),
            recognizer_from_config(&config.ocr),
            GridScanner::new(config.scanner.clone()),
            Compositor::new(config.canvas.clone(), config.assets.clone()),
            Arc::new(LocalAssetStore::new(&config.assets, &config.server)),
        ))
    }

    pub async fn run(&self, dni: &Dni) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();

        let source = Arc::new(self.upstream.fetch(dni).await?);
        info!("Fetched {} bytes for {dni}", source.len());

        let recognizer = Arc::clone(&self.recognizer);
        let ocr_input = Arc::clone(&source);
        let ocr = tokio::task::spawn_blocking(move || {
            recognize_or_empty(recognizer.as_ref(), &ocr_input)
        })
        .await?;
        let lines = ocr.lines();
        info!("OCR produced {} lines", lines.len());

        let scanner = self.scanner.clone();
        let compositor = Arc::clone(&self.compositor);
        let identifier = dni.to_string();
        let card = tokio::task::spawn_blocking(move || {
            render_card(&scanner, &compositor, &source, &lines, &identifier)
        })
        .await??;

        let file_url = self.store.persist(dni, &card.output.png, "png").await?;
        info!(
            "Finished {dni} in {:.2?}: {} thumbnails, {} lines",
            started.elapsed(),
            card.output.report.thumbnails_placed,
            card.output.report.lines_drawn
        );

        Ok(PipelineOutcome {
            file_url,
            ocr,
            candidates: card.candidates.len(),
            report: card.output.report,
        })
    }
}
