//! OCR collaborator: turns a rasterized page into text.
//!
//! The pipeline only depends on [`PageRecognizer`]. The `native` feature
//! provides [`PureOcrEngine`], backed by `pure-onnx-ocr`.

#[cfg(feature = "native")]
mod pure_engine;

#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// Recognizes the text on one page image.
pub trait PageRecognizer {
    /// Return the page's text in reading order.
    fn recognize(&self, page: &DynamicImage) -> Result<String, OcrError>;
}

impl<R: PageRecognizer + ?Sized> PageRecognizer for &R {
    fn recognize(&self, page: &DynamicImage) -> Result<String, OcrError> {
        (**self).recognize(page)
    }
}

impl<R: PageRecognizer + ?Sized> PageRecognizer for Box<R> {
    fn recognize(&self, page: &DynamicImage) -> Result<String, OcrError> {
        (**self).recognize(page)
    }
}

/// Recognizer used when no OCR models are available; every call fails.
#[derive(Debug, Clone)]
pub struct UnavailableRecognizer {
    reason: String,
}

impl UnavailableRecognizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl PageRecognizer for UnavailableRecognizer {
    fn recognize(&self, _page: &DynamicImage) -> Result<String, OcrError> {
        Err(OcrError::Unavailable(self.reason.clone()))
    }
}

/// A detected text box with its coordinates and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Bounding box coordinates (x1, y1, x2, y2, x3, y3, x4, y4) for quadrilateral.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Result of OCR processing on one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    /// Recognized text boxes in reading order.
    pub boxes: Vec<TextBox>,

    /// Page text: boxes on the same visual row joined by spaces, rows by newlines.
    pub text: String,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,

    /// Image dimensions (width, height).
    pub image_size: (u32, u32),
}

/// Vertical distance (pixels) within which boxes count as the same row.
const ROW_TOLERANCE: f32 = 20.0;

impl OcrResult {
    /// Build a result, ordering boxes top-to-bottom, left-to-right.
    pub fn from_boxes(
        mut boxes: Vec<TextBox>,
        image_size: (u32, u32),
        processing_time_ms: u64,
    ) -> Self {
        boxes.sort_by(|a, b| {
            let (ax, ay, _, _) = a.rect();
            let (bx, by, _, _) = b.rect();
            let row_a = (ay / ROW_TOLERANCE) as i32;
            let row_b = (by / ROW_TOLERANCE) as i32;
            row_a
                .cmp(&row_b)
                .then(ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal))
        });

        let text = join_rows(&boxes);

        Self {
            boxes,
            text,
            processing_time_ms,
            image_size,
        }
    }
}

/// Join boxes sharing a row band with spaces and rows with newlines.
fn join_rows(boxes: &[TextBox]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current_row: Option<i32> = None;

    for text_box in boxes {
        let (_, y, _, _) = text_box.rect();
        let row = (y / ROW_TOLERANCE) as i32;

        if current_row == Some(row) {
            if let Some(line) = lines.last_mut() {
                line.push(' ');
                line.push_str(&text_box.text);
                continue;
            }
        }
        lines.push(text_box.text.clone());
        current_row = Some(row);
    }

    lines.join("\n")
}
