//! End-to-end pipeline tests with fake collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::DynamicImage;
use pretty_assertions::assert_eq;

use stmt_core::error::{OcrError, PdfError};
use stmt_core::models::config::{ExtractionConfig, OcrConfig, PdfConfig};
use stmt_core::pdf;
use stmt_core::{
    CompletionBackend, CompletionRequest, Document, DocumentFormat, DocumentKind,
    NormalizedTable, PageRecognizer, PdfProcessor, Pipeline, RecordSource,
    SemanticExtractionError, SemanticExtractor, Stage, TextAcquirer,
};

const COLUMNS: [&str; 7] = [
    "Date",
    "Description",
    "Amount",
    "Debit",
    "Credit",
    "Closing Balance",
    "Category",
];

const STATEMENT: &str = "ACME Bank statement May 2025\n\
|Date|Description|Amount|Debit|Credit|Closing Balance|Category|\n\
| 2025-05-08 | Company XYZ Payroll | 8315.40 | 0.00 | 8315.40 | 38315.40 | Salary |\n\
| 2025-05-09 | City Pharmacy | -42.10 | 42.10 | 0.00 | 38273.30 | Medical |\n";

const LLM_REPLY: &str = r#"{"transactions": [
  {"date": "2025-05-08", "description": "Company XYZ Payroll", "amount": "8315.40", "debit": "0.00", "credit": "8315.40", "closing_balance": "38315.40", "category": "Salary"},
  {"date": "2025-05-09", "description": "City Pharmacy", "amount": "-42.10", "debit": "42.10", "credit": "0.00", "closing_balance": "38273.30"}
]}"#;

/// PDF whose bytes are its text layer; form feeds separate pages.
///
/// Bytes starting with `%BROKEN` fail to load, `%SCAN` gives one page with no
/// text layer.
#[derive(Default)]
struct TextPdf {
    text: Option<String>,
}

impl PdfProcessor for TextPdf {
    fn load(&mut self, data: &[u8]) -> pdf::Result<()> {
        let text = String::from_utf8_lossy(data).into_owned();
        if text.starts_with("%BROKEN") {
            return Err(PdfError::Parse("missing xref table".to_string()));
        }
        self.text = Some(text);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        match &self.text {
            Some(text) => text.split('\x0c').count() as u32,
            None => 0,
        }
    }

    fn extract_pages_text(&self) -> pdf::Result<Vec<String>> {
        match self.text.as_deref() {
            Some(text) if text.starts_with("%SCAN") => Ok(vec![String::new()]),
            Some(text) => Ok(text.split('\x0c').map(str::to_string).collect()),
            None => Err(PdfError::NoPages),
        }
    }

    fn render_page(&self, page: u32, _dpi: u32) -> pdf::Result<DynamicImage> {
        if page > self.page_count() {
            return Err(PdfError::InvalidPage(page));
        }
        Ok(DynamicImage::new_luma8(10, 10))
    }
}

static COUNTING_LOADS: AtomicUsize = AtomicUsize::new(0);

/// Processor that only counts loads.
#[derive(Default)]
struct CountingPdf;

impl PdfProcessor for CountingPdf {
    fn load(&mut self, _data: &[u8]) -> pdf::Result<()> {
        COUNTING_LOADS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        0
    }

    fn extract_pages_text(&self) -> pdf::Result<Vec<String>> {
        Err(PdfError::NoPages)
    }

    fn render_page(&self, page: u32, _dpi: u32) -> pdf::Result<DynamicImage> {
        Err(PdfError::InvalidPage(page))
    }
}

/// Recognizer returning fixed text, or failing when none is set.
#[derive(Default)]
struct FixedRecognizer {
    text: Option<String>,
    calls: AtomicUsize,
}

impl FixedRecognizer {
    fn reading(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl PageRecognizer for FixedRecognizer {
    fn recognize(&self, _page: &DynamicImage) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| OcrError::Recognition("page is blank".to_string()))
    }
}

enum Reply {
    Text(&'static str),
    Fail,
    Hang,
}

struct FakeBackend {
    reply: Reply,
    calls: AtomicUsize,
}

impl FakeBackend {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }
}

impl CompletionBackend for FakeBackend {
    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> Result<String, SemanticExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Fail => Err(SemanticExtractionError::Backend("401 Unauthorized".to_string())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(LLM_REPLY.to_string())
            }
        }
    }
}

fn pipeline<P: PdfProcessor + Default>(
    recognizer: FixedRecognizer,
    backend: FakeBackend,
) -> Pipeline<P, FixedRecognizer, FakeBackend> {
    let extractor = SemanticExtractor::new(backend, &ExtractionConfig::default())
        .with_timeout(Duration::from_millis(50));
    Pipeline::new(
        TextAcquirer::new(recognizer, PdfConfig::default(), &OcrConfig::default()),
        extractor,
    )
}

fn pdf(content: &str) -> Document {
    Document::new(
        content.as_bytes().to_vec(),
        DocumentKind::Digital,
        DocumentFormat::Pdf,
    )
}

fn dates(table: &NormalizedTable) -> Vec<&str> {
    table.rows().iter().map(|r| r.date.as_str()).collect()
}

#[tokio::test]
async fn test_semantic_success() {
    let backend = FakeBackend::new(Reply::Text(LLM_REPLY));
    let p = pipeline::<TextPdf>(FixedRecognizer::default(), backend);
    let (table, report) = p.process_with_report(&pdf(STATEMENT), false).await;

    assert_eq!(table.columns(), COLUMNS);
    assert_eq!(dates(&table), vec!["2025-05-08", "2025-05-09"]);
    assert_eq!(table.rows()[1].category, "");
    assert_eq!(report.stage, Stage::Done);
    assert_eq!(report.source, Some(RecordSource::Semantic));
    assert!(report.fallback_reason.is_none());
}

#[tokio::test]
async fn test_malformed_response_uses_fallback() {
    let p = pipeline::<TextPdf>(
        FixedRecognizer::default(),
        FakeBackend::new(Reply::Text("Sorry, I cannot help with that.")),
    );
    let (table, report) = p.process_with_report(&pdf(STATEMENT), false).await;

    assert_eq!(dates(&table), vec!["2025-05-08", "2025-05-09"]);
    assert_eq!(table.rows()[0].category, "Salary");
    assert_eq!(table.rows()[1].amount, "-42.10");
    assert!(report.used_fallback());
    assert!(report.fallback_reason.unwrap().contains("not valid JSON"));
}

#[tokio::test]
async fn test_backend_error_uses_fallback() {
    let p = pipeline::<TextPdf>(FixedRecognizer::default(), FakeBackend::new(Reply::Fail));
    let table = p.process(&pdf(STATEMENT), false).await;
    assert_eq!(table.len(), 2);
}

#[tokio::test]
async fn test_timeout_uses_fallback() {
    let p = pipeline::<TextPdf>(FixedRecognizer::default(), FakeBackend::new(Reply::Hang));
    let (table, report) = p.process_with_report(&pdf(STATEMENT), false).await;

    assert_eq!(table.len(), 2);
    assert!(report.used_fallback());
    assert!(report.fallback_reason.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_fallback_without_table_is_empty() {
    let p = pipeline::<TextPdf>(FixedRecognizer::default(), FakeBackend::new(Reply::Fail));
    let (table, report) = p
        .process_with_report(&pdf("Opening balance 30000.00\nNo activity"), false)
        .await;

    assert!(table.is_empty());
    assert_eq!(table.columns(), COLUMNS);
    assert_eq!(report.stage, Stage::Done);
}

#[tokio::test]
async fn test_acquisition_failure_gives_empty_table() {
    let backend = FakeBackend::new(Reply::Text(LLM_REPLY));
    let p = pipeline::<TextPdf>(FixedRecognizer::default(), backend);
    let (table, report) = p.process_with_report(&pdf("%BROKEN"), false).await;

    assert!(table.is_empty());
    assert_eq!(table.columns(), COLUMNS);
    assert_eq!(report.stage, Stage::Failed);
    assert!(report.failure.is_some());
    assert_eq!(p.extractor().backend().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_scanned_pdf_goes_through_ocr() {
    let p = pipeline::<TextPdf>(
        FixedRecognizer::reading(STATEMENT),
        FakeBackend::new(Reply::Fail),
    );
    let (table, report) = p.process_with_report(&pdf("%SCAN"), true).await;

    assert_eq!(report.acquisition, Some(stmt_core::AcquisitionMethod::Ocr));
    assert_eq!(table.len(), 2);
}

#[tokio::test]
async fn test_scanned_document_kind_is_honored() {
    let pdf_config = PdfConfig {
        honor_scanned_hint: true,
        ..PdfConfig::default()
    };
    let acquirer = TextAcquirer::new(
        FixedRecognizer::reading(STATEMENT),
        pdf_config,
        &OcrConfig::default(),
    );
    let backend = FakeBackend::new(Reply::Fail);
    let extractor = SemanticExtractor::new(backend, &ExtractionConfig::default());
    let p: Pipeline<TextPdf, _, _> = Pipeline::new(acquirer, extractor);

    let doc = Document::new(
        STATEMENT.as_bytes().to_vec(),
        DocumentKind::Scanned,
        DocumentFormat::Pdf,
    );
    let (table, report) = p.process_with_report(&doc, false).await;

    assert_eq!(report.acquisition, Some(stmt_core::AcquisitionMethod::Ocr));
    assert_eq!(table.len(), 2);

    let (_, report) = p.process_with_report(&pdf(STATEMENT), false).await;
    assert_eq!(report.acquisition, Some(stmt_core::AcquisitionMethod::TextLayer));
}

#[tokio::test]
async fn test_ocr_failure_after_empty_text_layer_fails() {
    let backend = FakeBackend::new(Reply::Text(LLM_REPLY));
    let p = pipeline::<TextPdf>(FixedRecognizer::default(), backend);
    let (table, report) = p.process_with_report(&pdf("%SCAN"), false).await;

    assert!(table.is_empty());
    assert_eq!(report.stage, Stage::Failed);
    assert!(report.failure.unwrap().contains("page is blank"));
}

#[tokio::test]
async fn test_unsupported_format_skips_acquisition() {
    let p = pipeline::<CountingPdf>(
        FixedRecognizer::reading(STATEMENT),
        FakeBackend::new(Reply::Text(LLM_REPLY)),
    );
    let doc = Document::new(
        STATEMENT.as_bytes().to_vec(),
        DocumentKind::Digital,
        DocumentFormat::from_extension("txt"),
    );
    let (table, report) = p.process_with_report(&doc, false).await;

    assert!(table.is_empty());
    assert_eq!(table.columns(), COLUMNS);
    assert_eq!(report.stage, Stage::Done);
    assert_eq!(report.acquisition, None);
    assert_eq!(COUNTING_LOADS.load(Ordering::SeqCst), 0);
    assert_eq!(p.extractor().backend().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_spreadsheet_text_is_extracted() {
    let p = pipeline::<CountingPdf>(FixedRecognizer::default(), FakeBackend::new(Reply::Fail));
    let table = p.process(&Document::spreadsheet_text(STATEMENT), false).await;
    assert_eq!(dates(&table), vec!["2025-05-08", "2025-05-09"]);
}

#[tokio::test]
async fn test_control_characters_do_not_break_fallback() {
    let noisy = STATEMENT.replace("Payroll", "Pay\u{0}roll");
    let p = pipeline::<TextPdf>(FixedRecognizer::default(), FakeBackend::new(Reply::Fail));
    let table = p.process(&pdf(&noisy), false).await;
    assert_eq!(table.rows()[0].description, "Company XYZ Payroll");
}

#[tokio::test]
async fn test_repeated_runs_are_independent() {
    let backend = FakeBackend::new(Reply::Text(LLM_REPLY));
    let p = pipeline::<TextPdf>(FixedRecognizer::default(), backend);
    let first = p.process(&pdf(STATEMENT), false).await;
    let second = p.process(&pdf(STATEMENT), false).await;

    assert_eq!(first, second);
    assert_eq!(p.extractor().backend().calls.load(Ordering::SeqCst), 2);
}
