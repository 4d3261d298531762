//! Input documents handed to the pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Whether the document was produced digitally or scanned from paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Born-digital document with a text layer.
    #[default]
    Digital,
    /// Scanned document, usually image-only.
    Scanned,
}

impl DocumentKind {
    /// Map the caller's "is scanned" flag to a kind.
    pub fn from_scanned_flag(is_scanned: bool) -> Self {
        if is_scanned { Self::Scanned } else { Self::Digital }
    }
}

/// Format tag of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Paginated PDF document.
    Pdf,
    /// Spreadsheet whose content has already been converted to text.
    Spreadsheet,
    /// Anything else, tagged with its lowercase extension.
    Other(String),
}

impl DocumentFormat {
    /// Derive the format from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "xlsx" | "xls" | "xlsm" | "ods" | "csv" => Self::Spreadsheet,
            _ => Self::Other(ext),
        }
    }

    /// Derive the format from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(path.extension().and_then(|e| e.to_str()).unwrap_or(""))
    }

    /// Whether the pipeline accepts this format.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => f.write_str("pdf"),
            Self::Spreadsheet => f.write_str("spreadsheet"),
            Self::Other(ext) if ext.is_empty() => f.write_str("<no extension>"),
            Self::Other(ext) => write!(f, ".{}", ext),
        }
    }
}

/// Opaque document content plus its declared kind and format.
///
/// Fields are private so a document cannot change after it is received.
#[derive(Debug, Clone)]
pub struct Document {
    data: Vec<u8>,
    kind: DocumentKind,
    format: DocumentFormat,
}

impl Document {
    /// Create a document from raw bytes.
    pub fn new(data: Vec<u8>, kind: DocumentKind, format: DocumentFormat) -> Self {
        Self { data, kind, format }
    }

    /// Create a spreadsheet document from text an external converter already produced.
    pub fn spreadsheet_text(text: impl Into<String>) -> Self {
        Self::new(
            text.into().into_bytes(),
            DocumentKind::Digital,
            DocumentFormat::Spreadsheet,
        )
    }

    /// Read a document from disk, deriving its format from the extension.
    pub fn from_path(path: &Path, kind: DocumentKind) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::new(data, kind, DocumentFormat::from_path(path)))
    }

    /// Raw content.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Declared kind.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Format tag.
    pub fn format(&self) -> &DocumentFormat {
        &self.format
    }
}
