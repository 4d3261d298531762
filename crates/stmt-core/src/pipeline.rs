//! Pipeline orchestrator.
//!
//! Sequences acquisition, semantic extraction, the fallback parser and
//! normalization. Every path ends in a well-formed table: acquisition failure
//! and unsupported formats give an empty one, extraction failure switches to
//! the fallback parser.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::acquire::{AcquisitionMethod, TextAcquirer};
use crate::error::StmtError;
use crate::extract::{CompletionBackend, SemanticExtractor, clean_text, parse_fallback};
use crate::models::config::StmtConfig;
use crate::models::document::Document;
use crate::models::transaction::{NormalizedTable, RecordSource};
use crate::normalize::normalize;
use crate::ocr::PageRecognizer;
use crate::pdf::{PdfExtractor, PdfProcessor};

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Unstarted,
    Acquiring,
    Extracting,
    FallbackParsing,
    Normalizing,
    Done,
    /// Acquisition failed; terminal.
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

/// What happened while processing one document.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Terminal stage, `Done` or `Failed`.
    pub stage: Stage,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition: Option<AcquisitionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<RecordSource>,
    /// Why the document produced no table content (unsupported or unreadable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Why semantic extraction was abandoned for the fallback parser.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub text_length: usize,
    pub rows: usize,
    pub elapsed_ms: u64,
}

impl PipelineReport {
    fn new(document: &Document) -> Self {
        Self {
            stage: Stage::Unstarted,
            format: document.format().to_string(),
            acquisition: None,
            source: None,
            failure: None,
            fallback_reason: None,
            text_length: 0,
            rows: 0,
            elapsed_ms: 0,
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Pipeline stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    fn finish(&mut self, stage: Stage, table: &NormalizedTable, start: Instant) {
        self.enter(stage);
        self.rows = table.len();
        self.elapsed_ms = start.elapsed().as_millis() as u64;
    }

    /// Whether the fallback parser produced the rows.
    pub fn used_fallback(&self) -> bool {
        self.source == Some(RecordSource::Fallback)
    }
}

/// Document to normalized transaction table.
///
/// Holds no per-request state, so one pipeline serves any number of
/// independent documents.
pub struct Pipeline<P, R, B> {
    acquirer: TextAcquirer<P, R>,
    extractor: SemanticExtractor<B>,
}

/// Pipeline reading PDFs with [`PdfExtractor`].
pub type DefaultPipeline<R, B> = Pipeline<PdfExtractor, R, B>;

impl<P, R, B> Pipeline<P, R, B>
where
    P: PdfProcessor + Default,
    R: PageRecognizer,
    B: CompletionBackend,
{
    pub fn new(acquirer: TextAcquirer<P, R>, extractor: SemanticExtractor<B>) -> Self {
        Self {
            acquirer,
            extractor,
        }
    }

    /// Build a pipeline from config with the given collaborators.
    pub fn from_config(config: &StmtConfig, recognizer: R, backend: B) -> Self {
        Self::new(
            TextAcquirer::new(recognizer, config.pdf.clone(), &config.ocr),
            SemanticExtractor::new(backend, &config.extraction),
        )
    }

    pub fn extractor(&self) -> &SemanticExtractor<B> {
        &self.extractor
    }

    /// Process a document into a table. Never fails.
    pub async fn process(&self, document: &Document, is_scanned_hint: bool) -> NormalizedTable {
        self.process_with_report(document, is_scanned_hint).await.0
    }

    /// Process a document and report how the table was produced.
    pub async fn process_with_report(
        &self,
        document: &Document,
        is_scanned_hint: bool,
    ) -> (NormalizedTable, PipelineReport) {
        let start = Instant::now();
        let mut report = PipelineReport::new(document);

        if !document.format().is_supported() {
            let err = StmtError::UnsupportedFormat(document.format().to_string());
            warn!("{}, returning empty table", err);
            report.failure = Some(err.to_string());
            let table = NormalizedTable::empty();
            report.finish(Stage::Done, &table, start);
            return (table, report);
        }

        report.enter(Stage::Acquiring);
        let text = match self.acquirer.acquire_with_method(document, is_scanned_hint) {
            Ok((text, method)) => {
                report.acquisition = Some(method);
                report.text_length = text.len();
                text
            }
            Err(e) => {
                error!("Text acquisition failed: {}", e);
                report.failure = Some(StmtError::from(e).to_string());
                let table = NormalizedTable::empty();
                report.finish(Stage::Failed, &table, start);
                return (table, report);
            }
        };

        report.enter(Stage::Extracting);
        let result = match self.extractor.extract(text.as_str()).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Semantic extraction failed, using fallback parser: {}", e);
                report.fallback_reason = Some(e.to_string());
                report.enter(Stage::FallbackParsing);
                parse_fallback(&clean_text(text.as_str()))
            }
        };
        report.source = Some(result.source);

        report.enter(Stage::Normalizing);
        let table = normalize(result);
        report.finish(Stage::Done, &table, start);

        info!(
            "Processed {} document: {} rows via {:?} in {}ms",
            report.format,
            table.len(),
            report.source,
            report.elapsed_ms
        );

        (table, report)
    }
}
