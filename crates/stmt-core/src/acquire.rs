//! Text acquisition: document bytes to plain text.
//!
//! PDFs go through the native text layer first and fall back to OCR of the
//! rasterized pages when that fails. Spreadsheets arrive already converted
//! to text and are only decoded.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AcquisitionError, OcrError, PdfError, StmtError};
use crate::models::config::{OcrConfig, PdfConfig};
use crate::models::document::{Document, DocumentFormat, DocumentKind};
use crate::ocr::PageRecognizer;
use crate::pdf::PdfProcessor;

/// Full text of a document after acquisition. Never null; may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which path produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMethod {
    TextLayer,
    Ocr,
    Spreadsheet,
}

/// Turns documents into text using a PDF processor and a page recognizer.
///
/// A fresh `P` is created for every document, so one acquirer can serve any
/// number of independent requests.
pub struct TextAcquirer<P, R> {
    recognizer: R,
    pdf: PdfConfig,
    skip_failed_pages: bool,
    _processor: PhantomData<fn() -> P>,
}

impl<P, R> TextAcquirer<P, R>
where
    P: PdfProcessor + Default,
    R: PageRecognizer,
{
    pub fn new(recognizer: R, pdf: PdfConfig, ocr: &OcrConfig) -> Self {
        Self {
            recognizer,
            pdf,
            skip_failed_pages: ocr.skip_failed_pages,
            _processor: PhantomData,
        }
    }

    /// Acquire the text of a document.
    pub fn acquire(
        &self,
        document: &Document,
        is_scanned_hint: bool,
    ) -> Result<ExtractedText, AcquisitionError> {
        self.acquire_with_method(document, is_scanned_hint)
            .map(|(text, _)| text)
    }

    /// Acquire the text of a document and report which path produced it.
    ///
    /// A document declared as [`DocumentKind::Scanned`] counts as hinted.
    pub fn acquire_with_method(
        &self,
        document: &Document,
        is_scanned_hint: bool,
    ) -> Result<(ExtractedText, AcquisitionMethod), AcquisitionError> {
        let is_scanned_hint = is_scanned_hint || document.kind() == DocumentKind::Scanned;

        match document.format() {
            DocumentFormat::Spreadsheet => {
                let text = String::from_utf8(document.data().to_vec())?;
                debug!("Spreadsheet text: {} characters", text.len());
                Ok((ExtractedText::new(text), AcquisitionMethod::Spreadsheet))
            }
            DocumentFormat::Pdf => self.acquire_pdf(document.data(), is_scanned_hint),
            DocumentFormat::Other(_) => Err(AcquisitionError::UnsupportedFormat(
                document.format().to_string(),
            )),
        }
    }

    fn acquire_pdf(
        &self,
        data: &[u8],
        is_scanned_hint: bool,
    ) -> Result<(ExtractedText, AcquisitionMethod), AcquisitionError> {
        let mut processor = P::default();
        let loaded = processor.load(data);

        if is_scanned_hint && self.pdf.honor_scanned_hint {
            info!("Document marked as scanned, skipping the text layer");
            return loaded
                .map_err(StmtError::from)
                .and_then(|_| self.ocr_text(&processor))
                .map(|text| (text, AcquisitionMethod::Ocr))
                .map_err(|e| AcquisitionError::OcrOnly(e.to_string()));
        }

        let native = loaded.and_then(|_| self.native_text(&processor));
        match native {
            Ok(text) => {
                info!("Extracted {} characters from the text layer", text.len());
                Ok((text, AcquisitionMethod::TextLayer))
            }
            Err(native_err) => {
                warn!("Native PDF extraction failed: {}", native_err);
                match self.ocr_text(&processor) {
                    Ok(text) => {
                        info!("Extracted {} characters via OCR", text.len());
                        Ok((text, AcquisitionMethod::Ocr))
                    }
                    Err(ocr_err) => Err(AcquisitionError::BothPathsFailed {
                        native: native_err.to_string(),
                        ocr: ocr_err.to_string(),
                    }),
                }
            }
        }
    }

    /// Page-by-page text layer, one newline after each page.
    fn native_text(&self, processor: &P) -> Result<ExtractedText, PdfError> {
        let pages = processor.extract_pages_text()?;

        let mut text = String::new();
        for page in &pages {
            text.push_str(page);
            text.push('\n');
        }

        let usable = text.trim().chars().count();
        if usable < self.pdf.min_text_length {
            return Err(PdfError::NoText(usable));
        }

        Ok(ExtractedText::new(text))
    }

    /// Rasterize each page and recognize it, one newline after each page.
    fn ocr_text(&self, processor: &P) -> Result<ExtractedText, StmtError> {
        let page_count = processor.page_count();
        if page_count == 0 {
            return Err(PdfError::NoPages.into());
        }

        let last_page = match self.pdf.max_pages {
            0 => page_count,
            max => page_count.min(max as u32),
        };

        let mut text = String::new();
        let mut recognized = 0;

        for page in 1..=last_page {
            let page_text = processor
                .render_page(page, self.pdf.render_dpi)
                .map_err(StmtError::from)
                .and_then(|image| self.recognizer.recognize(&image).map_err(StmtError::from));

            match page_text {
                Ok(page_text) => {
                    debug!("Page {}: recognized {} characters", page, page_text.len());
                    text.push_str(&page_text);
                    text.push('\n');
                    recognized += 1;
                }
                Err(e) if self.skip_failed_pages => {
                    warn!("Skipping page {}: {}", page, e);
                }
                Err(e) => return Err(e),
            }
        }

        if recognized == 0 {
            return Err(OcrError::Recognition("no page could be recognized".to_string()).into());
        }

        Ok(ExtractedText::new(text))
    }
}
