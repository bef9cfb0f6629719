//! Character-window text chunking.
//!
//! Splitting happens on character windows, not bytes, so multi-byte
//! text never gets cut mid-codepoint. Consecutive windows overlap by a
//! configurable amount; every character of the input lands in at least
//! one chunk.

use quarry_core::{QuarryError, QuarryResult, VectorError};

/// One chunk of a larger text, with its position in the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// Split `text` into windows of `chunk_size` characters, each window
/// starting `chunk_size - chunk_overlap` characters after the last.
///
/// The final chunk may be shorter than `chunk_size`. Empty input
/// yields no chunks. `chunk_overlap` must be strictly smaller than
/// `chunk_size`, otherwise the window would never advance.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> QuarryResult<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(QuarryError::Vector(VectorError::InvalidChunking {
            reason: "chunk_size must be greater than zero".to_string(),
        }));
    }
    if chunk_overlap >= chunk_size {
        return Err(QuarryError::Vector(VectorError::InvalidChunking {
            reason: format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            ),
        }));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let step = chunk_size - chunk_overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(Chunk {
            index: chunks.len(),
            text: chars[start..end].iter().collect(),
        });
        if end == chars.len() {
            break;
        }
        start += step;
    }
    Ok(chunks)
}

// =============================================================================
// TESTS
// =============================================================================
