//! Core library for bank statement transaction extraction.
//!
//! This crate provides:
//! - Text acquisition from PDFs (text layer, then OCR of rendered pages)
//! - Semantic extraction through a text-completion backend
//! - A rule-based pipe-table parser used as fallback
//! - Normalization to a fixed seven-column transaction table

pub mod acquire;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod pdf;
pub mod pipeline;

pub use acquire::{AcquisitionMethod, ExtractedText, TextAcquirer};
pub use error::{
    AcquisitionError, ConfigError, OcrError, PdfError, Result, SemanticExtractionError, StmtError,
};
pub use extract::{
    CompletionBackend, CompletionRequest, HttpCompletionBackend, SemanticExtractor, parse_fallback,
};
pub use models::config::StmtConfig;
pub use models::document::{Document, DocumentFormat, DocumentKind};
pub use models::transaction::{
    Column, NormalizedRow, NormalizedTable, ParseResult, RecordSource, TransactionRecord,
};
pub use normalize::normalize;
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use ocr::{OcrResult, PageRecognizer, TextBox, UnavailableRecognizer};
pub use pdf::{PdfExtractor, PdfProcessor};
pub use pipeline::{DefaultPipeline, Pipeline, PipelineReport, Stage};
