//! Overlapping-window text chunker.
//!
//! Splits extracted page text into bounded segments for embedding. Windows
//! prefer to end just after a sentence terminator, then at a word boundary,
//! then at the raw window edge. Successive windows overlap by a configured
//! amount, with a minimum-advance floor so pathological `overlap >=
//! target_size` configurations still make forward progress.

/// Window sizing for [`chunk_text`].
#[derive(Clone, Debug)]
pub struct ChunkerConfig {
    /// Target chunk length in bytes.
    pub target_size: usize,
    /// Bytes of overlap carried into the next window.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkerConfig {
    /// Effective window size; a zero target is treated as one byte.
    fn target(&self) -> usize {
        self.target_size.max(1)
    }

    /// Smallest distance the window start must move each iteration.
    ///
    /// A quarter of the target keeps overlap useful while ruling out the
    /// near-zero-progress loop that a large overlap would otherwise cause.
    fn min_advance(&self) -> usize {
        (self.target() / 4).max(1)
    }
}

/// Splits `text` into trimmed, non-empty, order-preserving chunks.
///
/// Deterministic: identical input always yields identical output. The
/// number of chunks is bounded by `text.len() / min_advance + 2`, enforced
/// with an explicit iteration cap rather than trusting the advance
/// arithmetic.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let target = config.target();
    if text.len() <= target {
        return vec![text.trim().to_string()];
    }

    let min_advance = config.min_advance();
    let max_windows = text.len() / min_advance + 2;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    for _ in 0..max_windows {
        if start >= text.len() {
            break;
        }

        let mut end = floor_char_boundary(text, (start + target).min(text.len()));
        if end < text.len() {
            let window = &text[start..end];
            if let Some(after_terminator) = last_sentence_end(window) {
                end = start + after_terminator;
            } else if let Some(space) = window.rfind(' ').filter(|&s| s > 0) {
                end = start + space;
            }
        }

        let chunk = text[start..end].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= text.len() {
            break;
        }
        let next = end.saturating_sub(config.overlap).max(start + min_advance);
        start = ceil_char_boundary(text, next);
    }

    chunks
}

/// Byte offset just past the last sentence terminator in `window`, if any.
///
/// A terminator only counts when followed by a space and not sitting at the
/// window start (which would produce an empty chunk).
fn last_sentence_end(window: &str) -> Option<usize> {
    [". ", "! ", "? "]
        .iter()
        .filter_map(|pat| window.rfind(pat))
        .max()
        .filter(|&pos| pos > 0)
        .map(|pos| pos + 1)
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}
