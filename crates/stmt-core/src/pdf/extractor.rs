//! PDF text extraction and page rasterization using lopdf and pdf-extract.

use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
    /// Every decodable image in the document, filled on first use.
    document_images: OnceLock<Vec<DynamicImage>>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
            document_images: OnceLock::new(),
        }
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    fn page_id(&self, doc: &Document, page: u32) -> Result<ObjectId> {
        doc.get_pages()
            .get(&page)
            .copied()
            .ok_or(PdfError::InvalidPage(page))
    }

    /// Raster images drawn directly on a page through its XObject resources.
    fn page_images(&self, doc: &Document, page_id: ObjectId) -> Vec<DynamicImage> {
        let mut images = Vec::new();

        let resources = self.inherited_attribute(doc, page_id, b"Resources");
        let Some(Object::Dictionary(resources)) = resources else {
            return images;
        };

        if let Ok(xobjects) = resources.get(b"XObject") {
            if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                for (_name, obj_ref) in xobj_dict.iter() {
                    if let Ok((_, obj)) = doc.dereference(obj_ref) {
                        if let Some(img) = self.try_extract_image_from_object(doc, obj) {
                            images.push(img);
                        }
                    }
                }
            }
        }

        images
    }

    /// Every decodable image object in the document, in object order.
    ///
    /// Decoded once per loaded document.
    fn document_images(&self, doc: &Document) -> &[DynamicImage] {
        self.document_images.get_or_init(|| {
            let images: Vec<DynamicImage> = doc
                .objects
                .values()
                .filter_map(|object| self.try_extract_image_from_object(doc, object))
                .collect();
            debug!("Found {} images in document", images.len());
            images
        })
    }

    fn try_extract_image_from_object(&self, doc: &Document, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

        trace!("Found image object: {}x{}", width, height);

        let data = match stream.decompressed_content() {
            Ok(d) => d,
            Err(_) => stream.content.clone(),
        };

        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) if !arr.is_empty() => arr.first().and_then(|o| o.as_name().ok()),
                _ => None,
            };

            match filter_name {
                Some(b"DCTDecode") => {
                    // JPEG streams stay compressed; decode the raw stream bytes.
                    return image::load_from_memory_with_format(
                        &stream.content,
                        image::ImageFormat::Jpeg,
                    )
                    .ok();
                }
                Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("Skipping unsupported image filter {:?}", filter_name);
                    return None;
                }
                _ => {}
            }
        }

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8) as u8;

        create_image_from_raw(&data, width, height, color_space, bits)
    }

    /// Look up a page attribute, walking up the page tree for inherited values.
    fn inherited_attribute(&self, doc: &Document, node_id: ObjectId, key: &[u8]) -> Option<Object> {
        let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
            return None;
        };

        if let Ok(value) = dict.get(key) {
            if let Ok((_, resolved)) = doc.dereference(value) {
                return Some(resolved.clone());
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.inherited_attribute(doc, *parent_id, key),
            _ => None,
        }
    }

    /// Page size in points from the MediaBox, if it can be read.
    fn page_size_points(&self, doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
        let Object::Array(media_box) = self.inherited_attribute(doc, page_id, b"MediaBox")? else {
            return None;
        };
        if media_box.len() != 4 {
            return None;
        }

        let coords: Vec<f32> = media_box.iter().filter_map(number_value).collect();
        if coords.len() != 4 {
            return None;
        }

        let width = (coords[2] - coords[0]).abs();
        let height = (coords[3] - coords[1]).abs();
        (width > 0.0 && height > 0.0).then_some((width, height))
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Statements are often "encrypted" with an empty user password.
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        self.document_images = OnceLock::new();
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_pages_text(&self) -> Result<Vec<String>> {
        self.document()?;

        // pdf-extract panics on some malformed font programs instead of erroring.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(&self.raw_data)
        }));

        match outcome {
            Ok(Ok(pages)) => {
                debug!("Extracted text layer from {} pages", pages.len());
                Ok(pages)
            }
            Ok(Err(e)) => Err(PdfError::TextExtraction(e.to_string())),
            Err(_) => {
                warn!("pdf-extract panicked while reading the text layer");
                Err(PdfError::TextExtraction(
                    "text extractor aborted on malformed content".to_string(),
                ))
            }
        }
    }

    fn render_page(&self, page: u32, dpi: u32) -> Result<DynamicImage> {
        let doc = self.document()?;
        let page_id = self.page_id(doc, page)?;

        let mut images = self.page_images(doc, page_id);
        if images.is_empty() {
            // Images wrapped in form XObjects are not reachable from the page
            // resources; match them to pages by position instead.
            debug!("No XObject images found on page {}, scanning all objects", page);
            let page_idx = (page - 1) as usize;
            images = self
                .document_images(doc)
                .get(page_idx)
                .cloned()
                .into_iter()
                .collect();
        }

        let image = images
            .into_iter()
            .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
            .ok_or_else(|| PdfError::Render {
                page,
                reason: "page has no raster content".to_string(),
            })?;

        let Some((width_pt, height_pt)) = self.page_size_points(doc, page_id) else {
            debug!("Page {} has no readable MediaBox, keeping native resolution", page);
            return Ok(image);
        };

        let target_width = ((width_pt / POINTS_PER_INCH) * dpi as f32).round().max(1.0) as u32;
        let target_height = ((height_pt / POINTS_PER_INCH) * dpi as f32).round().max(1.0) as u32;

        debug!(
            "Rendering page {} at {} DPI: {}x{} -> {}x{}",
            page,
            dpi,
            image.width(),
            image.height(),
            target_width,
            target_height
        );

        if (image.width(), image.height()) == (target_width, target_height) {
            return Ok(image);
        }
        Ok(image.resize_exact(target_width, target_height, FilterType::Triangle))
    }
}

fn number_value(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn create_image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: u8,
) -> Option<DynamicImage> {
    if bits_per_component != 8 {
        trace!("Unsupported bits per component: {}", bits_per_component);
        return None;
    }

    let pixels = (width as usize) * (height as usize);
    let channels = match color_space {
        b"DeviceRGB" | b"RGB" => 3,
        b"DeviceGray" | b"G" => 1,
        _ => {
            trace!("Unsupported color space: {}", String::from_utf8_lossy(color_space));
            return None;
        }
    };

    if data.len() < pixels * channels {
        trace!(
            "Could not decode image: data_len={}, expected={}",
            data.len(),
            pixels * channels
        );
        return None;
    }

    let mut rgba_data = Vec::with_capacity(pixels * 4);
    for chunk in data[..pixels * channels].chunks_exact(channels) {
        if channels == 3 {
            rgba_data.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
        } else {
            rgba_data.extend_from_slice(&[chunk[0], chunk[0], chunk[0], 255]);
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba_data).map(DynamicImage::ImageRgba8)
}
