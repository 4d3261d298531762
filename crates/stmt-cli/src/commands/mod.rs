pub mod batch;
pub mod config;
pub mod process;

use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};

use stmt_core::{
    DefaultPipeline, Document, DocumentFormat, DocumentKind, HttpCompletionBackend,
    PageRecognizer, PureOcrEngine, StmtConfig, UnavailableRecognizer,
};

use crate::spreadsheet;

/// Pipeline used by the CLI: real PDF reader, boxed recognizer, HTTP backend.
pub type CliPipeline = DefaultPipeline<Box<dyn PageRecognizer>, HttpCompletionBackend>;

/// Load the config from `path`, else the default location, else defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<StmtConfig> {
    if let Some(path) = path {
        return StmtConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    let default_path = StmtConfig::default_path();
    if default_path.exists() {
        debug!("Using config at {}", default_path.display());
        Ok(StmtConfig::from_file(&default_path)?)
    } else {
        Ok(StmtConfig::default())
    }
}

/// Build the pipeline. Missing OCR models only disable the OCR fallback.
pub fn build_pipeline(config: &StmtConfig) -> anyhow::Result<CliPipeline> {
    let recognizer: Box<dyn PageRecognizer> = if config.ocr.models_present() {
        match PureOcrEngine::from_config(&config.ocr) {
            Ok(engine) => Box::new(engine),
            Err(e) => {
                warn!("OCR engine unavailable: {}", e);
                Box::new(UnavailableRecognizer::new(e.to_string()))
            }
        }
    } else {
        debug!("No OCR models in {}", config.ocr.model_dir.display());
        Box::new(UnavailableRecognizer::new(format!(
            "OCR models not found in {}",
            config.ocr.model_dir.display()
        )))
    };

    let backend = HttpCompletionBackend::from_config(&config.extraction)?;
    Ok(CliPipeline::from_config(config, recognizer, backend))
}

/// Read an input file into a document, converting spreadsheets to text.
pub fn load_document(path: &Path, is_scanned: bool) -> anyhow::Result<Document> {
    let kind = DocumentKind::from_scanned_flag(is_scanned);
    match DocumentFormat::from_path(path) {
        DocumentFormat::Spreadsheet => {
            let text = spreadsheet::to_pipe_text(path)?;
            Ok(Document::spreadsheet_text(text))
        }
        _ => Document::from_path(path, kind)
            .with_context(|| format!("failed to read {}", path.display())),
    }
}
