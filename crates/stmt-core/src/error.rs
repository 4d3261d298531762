//! Error types for the stmt-core library.

use thiserror::Error;

/// Main error type for the stmt library.
#[derive(Error, Debug)]
pub enum StmtError {
    /// The document format is not one the pipeline accepts.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Neither text extraction path produced text.
    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Semantic extraction failed (recoverable through the fallback parser).
    #[error("semantic extraction error: {0}")]
    Semantic(#[from] SemanticExtractionError),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The text layer is missing or too short to be useful.
    #[error("no usable text layer ({0} characters)")]
    NoText(usize),

    /// Failed to render a page to an image.
    #[error("failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Recognition failed for an image.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// No OCR engine is available in this build or configuration.
    #[error("no OCR engine available: {0}")]
    Unavailable(String),
}

/// Both acquisition paths failed, or the document could not be decoded at all.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// Native text extraction failed and so did the OCR path.
    #[error("native extraction failed ({native}); OCR failed ({ocr})")]
    BothPathsFailed { native: String, ocr: String },

    /// Native extraction was skipped because of the scanned hint and OCR failed.
    #[error("OCR failed: {0}")]
    OcrOnly(String),

    /// The acquirer was handed a format it has no extraction path for.
    #[error("no acquisition path for {0}")]
    UnsupportedFormat(String),

    /// Spreadsheet content handed to the pipeline was not valid UTF-8 text.
    #[error("spreadsheet text is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
}

/// Failures of the semantic (language model) extraction stage.
#[derive(Error, Debug)]
pub enum SemanticExtractionError {
    /// The backend call itself failed (network, HTTP status, auth).
    #[error("backend request failed: {0}")]
    Backend(String),

    /// The backend did not answer within the configured timeout.
    #[error("backend timed out after {0} ms")]
    Timeout(u64),

    /// The response was not a JSON document.
    #[error("response is not valid JSON: {0}")]
    MalformedResponse(String),

    /// The response was JSON but did not hold a usable `transactions` array.
    #[error("response has no usable `transactions` array: {0}")]
    MissingTransactions(String),
}

/// Errors related to configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read or write the config file.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for the expected shape.
    #[error("invalid config: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Result type for the stmt library.
pub type Result<T> = std::result::Result<T, StmtError>;
