//! Page-aware paragraph chunker.
//!
//! Splits an ordered sequence of [`Page`]s into [`Chunk`]s sized for
//! embedding. Paragraph boundaries (blank lines) are preserved wherever the
//! size policy allows, and every chunk remembers the inclusive page range
//! its text came from.
//!
//! # Algorithm
//!
//! 1. Split each page on blank lines into paragraphs, dropping empty ones,
//!    and stream them in page order.
//! 2. Accumulate paragraphs while the running token total stays within
//!    `target_tokens`.
//! 3. On overflow, absorb the overflowing paragraph first if the buffer is
//!    still below `absorb_below`, then close the buffer as a chunk ending on
//!    the current page. A paragraph that was not absorbed seeds the next
//!    buffer.
//! 4. A trailing buffer below `merge_below` tokens is appended to the
//!    previous chunk. The previous chunk keeps its recorded `page_end`.
//! 5. Chunks above `hard_cap` are re-split on word boundaries; the pieces
//!    inherit the original page range.
//! 6. `chunk_id`s are assigned densely from 0 in output order.
//!
//! # Example
//!
//! ```rust
//! use legal_lens_core::chunk::chunk_pages;
//! use legal_lens_core::models::Page;
//!
//! let pages = vec![Page::new(1, "Loan amount is $5000.\n\nRepayment in 12 months.")];
//! let chunks = chunk_pages(&pages);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!((chunks[0].page_start, chunks[0].page_end), (1, 1));
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Chunk, Page};
use crate::tokens::{estimate_tokens, tokens_for_words};

const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Size policy for the chunker, in estimated tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPolicy {
    /// Soft target size of a chunk.
    pub target_tokens: usize,
    /// A buffer smaller than this absorbs the paragraph that overflows it.
    pub absorb_below: usize,
    /// A trailing buffer smaller than this merges into the previous chunk.
    pub merge_below: usize,
    /// Hard upper bound on any emitted chunk.
    pub hard_cap: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            target_tokens: 800,
            absorb_below: 400,
            merge_below: 250,
            hard_cap: 1000,
        }
    }
}

/// Chunk `pages` with the default [`ChunkPolicy`].
pub fn chunk_pages(pages: &[Page]) -> Vec<Chunk> {
    chunk_pages_with(pages, &ChunkPolicy::default())
}

/// A closed buffer before oversize normalization and id assignment.
struct Draft {
    text: String,
    page_start: u32,
    page_end: u32,
}

/// Chunk `pages` under an explicit policy.
///
/// # Guarantees
///
/// - Empty input (or input with only blank pages) yields no chunks.
/// - Every chunk has non-empty text and `tokens <= policy.hard_cap`.
/// - `chunk_id`s are `0, 1, …, N-1` in output order.
/// - Output is a pure function of the input.
pub fn chunk_pages_with(pages: &[Page], policy: &ChunkPolicy) -> Vec<Chunk> {
    let mut drafts: Vec<Draft> = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut running = 0usize;
    let mut page_start: Option<u32> = None;

    for page in pages {
        for para in paragraphs(&page.text) {
            let t = estimate_tokens(&para);

            if running + t <= policy.target_tokens {
                page_start.get_or_insert(page.number);
                buffer.push(para);
                running += t;
                continue;
            }

            let absorb = !buffer.is_empty() && running < policy.absorb_below;
            let seed = if absorb {
                buffer.push(para);
                None
            } else {
                Some(para)
            };

            if !buffer.is_empty() {
                drafts.push(Draft {
                    text: buffer.join(PARAGRAPH_SEPARATOR),
                    page_start: page_start.unwrap_or(page.number),
                    page_end: page.number,
                });
            }
            buffer.clear();
            running = 0;
            // The next chunk starts on this page even when the paragraph
            // was absorbed into the one just closed.
            page_start = Some(page.number);

            if let Some(para) = seed {
                running = t;
                buffer.push(para);
            }
        }
    }

    if !buffer.is_empty() {
        let tail = buffer.join(PARAGRAPH_SEPARATOR);
        match drafts.last_mut() {
            Some(prev) if estimate_tokens(&tail) < policy.merge_below => {
                // page_end stays at the previous chunk's value.
                prev.text.push_str(PARAGRAPH_SEPARATOR);
                prev.text.push_str(&tail);
            }
            _ => {
                let start = page_start.unwrap_or(1);
                let last_page = pages.last().map(|p| p.number).unwrap_or(start);
                drafts.push(Draft {
                    text: tail,
                    page_start: start,
                    page_end: last_page.max(start),
                });
            }
        }
    }

    let mut chunks = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if estimate_tokens(&draft.text) <= policy.hard_cap {
            chunks.push(make_chunk(
                chunks.len(),
                &draft.text,
                draft.page_start,
                draft.page_end,
            ));
        } else {
            for piece in split_words(&draft.text, policy.hard_cap) {
                chunks.push(make_chunk(
                    chunks.len(),
                    &piece,
                    draft.page_start,
                    draft.page_end,
                ));
            }
        }
    }

    chunks
}

/// Split `text` into contiguous word groups of at most `cap` estimated tokens.
///
/// Each group grows one word at a time and is flushed once adding another
/// word would push it past `cap`. Words are re-joined with single spaces.
pub fn split_words(text: &str, cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        if !buf.is_empty() && tokens_for_words(buf.len() + 1) > cap {
            out.push(buf.join(" "));
            buf.clear();
        }
        buf.push(word);
    }
    if !buf.is_empty() {
        out.push(buf.join(" "));
    }

    out
}

/// Split page text into trimmed, non-empty paragraphs on blank lines.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut lines, &mut out);
        } else {
            lines.push(line);
        }
    }
    flush_paragraph(&mut lines, &mut out);

    out
}

fn flush_paragraph(lines: &mut Vec<&str>, out: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let para = lines.join("\n");
    let para = para.trim();
    if !para.is_empty() {
        out.push(para.to_string());
    }
    lines.clear();
}

/// Create a [`Chunk`] with its token estimate and SHA-256 content hash.
fn make_chunk(chunk_id: usize, text: &str, page_start: u32, page_end: u32) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        chunk_id,
        text: text.to_string(),
        page_start,
        page_end,
        tokens: estimate_tokens(text),
        hash,
    }
}
