//! PDF page extraction.
//!
//! Turns uploaded PDF bytes into the ordered [`Page`] sequence the chunker
//! consumes. Pages are numbered from 1. Each page is cleaned line by line:
//! lines are trimmed and runs of blank lines collapse to a single blank
//! line, so paragraph breaks survive into chunking.

use legal_lens_core::error::InputError;
use legal_lens_core::models::Page;

/// Extract cleaned per-page text from PDF bytes.
///
/// # Errors
///
/// - [`InputError::Unreadable`] if the bytes are not a parseable PDF.
/// - [`InputError::NoText`] if every page is blank after cleaning
///   (for example a scanned document with no text layer).
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<Page>, InputError> {
    if bytes.is_empty() {
        return Err(InputError::Unreadable("empty file".to_string()));
    }

    let raw = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| InputError::Unreadable(e.to_string()))?;

    let pages: Vec<Page> = raw
        .iter()
        .enumerate()
        .map(|(i, text)| Page::new(i as u32 + 1, clean_text(text)))
        .collect();

    if pages.iter().all(|p| p.text.is_empty()) {
        return Err(InputError::NoText);
    }

    Ok(pages)
}

/// Trim every line, collapse blank-line runs to one, and trim the result.
pub fn clean_text(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut last_blank = true;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !last_blank {
                out.push("");
            }
            last_blank = true;
        } else {
            out.push(line);
            last_blank = false;
        }
    }

    while out.last() == Some(&"") {
        out.pop();
    }
    out.join("\n")
}
