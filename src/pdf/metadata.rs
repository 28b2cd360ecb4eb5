//! PDF metadata extraction

use std::path::Path;

use lopdf::{Document, Object};

use crate::error::{Error, Result};

/// PDF metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// PDF version from the file header, e.g. "1.7"
    pub version: String,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
}

fn load(path: &Path) -> Result<Document> {
    Document::load(path).map_err(|e| Error::unreadable(path, e))
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    let doc = load(path)?;
    Ok(metadata_of(&doc))
}

/// Metadata of an already loaded document
pub fn metadata_of(doc: &Document) -> PdfMetadata {
    let info = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_dictionary(id))
        .ok();

    let text = |key: &[u8]| -> Option<String> {
        let bytes = info?.get(key).and_then(Object::as_str).ok()?;
        decode_text_string(bytes)
    };

    PdfMetadata {
        page_count: doc.get_pages().len(),
        version: doc.version.clone(),
        title: text(&b"Title"[..]),
        author: text(&b"Author"[..]),
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, or single-byte)
fn decode_text_string(bytes: &[u8]) -> Option<String> {
    let text = if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        match String::from_utf8(bytes.to_vec()) {
            Ok(s) => s,
            // PDFDocEncoding matches Latin-1 for printable characters
            Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    };

    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Count the number of pages in a PDF file
pub fn count_pages(path: &Path) -> Result<usize> {
    Ok(load(path)?.get_pages().len())
}
