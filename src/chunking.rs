//! Chunking strategies for the three content shapes the analyzer handles.
//!
//! - Generic text: recursive splitting that prefers paragraph, then line,
//!   then sentence, then word boundaries, with overlap between chunks.
//! - Tabular data: fixed-size row blocks under a repeated header row.
//! - Structured data: JSON arrays and objects grouped into fixed-size
//!   blocks, falling back to generic splitting for anything unparsable.

use serde_json::Value;

/// Target chunk size in characters for generic text.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Overlap between adjacent text chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Data rows per tabular chunk (the header row is repeated on top).
pub const ROWS_PER_CHUNK: usize = 10;

/// Array items per structured-data chunk.
pub const ARRAY_ITEMS_PER_CHUNK: usize = 5;

/// Key/value pairs per structured-data chunk.
pub const OBJECT_PAIRS_PER_CHUNK: usize = 3;

/// Boundary preference for recursive splitting, most significant first.
/// When none of these produce a split, text falls back to fixed
/// character windows.
const SEPARATORS: &[&str] = &["\n\n", "\n", ".", "!", "?", " "];

/// Split text into chunks of at most `chunk_size` characters with
/// `overlap` characters carried between adjacent chunks.
///
/// Splitting is recursive: the text is broken at the most significant
/// boundary that yields fragments, oversized fragments are re-split at the
/// next boundary down, and the resulting fragments are merged back into
/// chunks near the target size.
///
/// # Examples
///
/// ```
/// use askdocs::chunking::{split_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
///
/// let chunks = split_text("one short paragraph", DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP);
/// assert_eq!(chunks, vec!["one short paragraph"]);
///
/// let long = "sentence one. sentence two. ".repeat(100);
/// let chunks = split_text(&long, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP);
/// assert!(chunks.len() > 1);
/// assert!(chunks.iter().all(|c| c.chars().count() <= DEFAULT_CHUNK_SIZE));
/// ```
pub fn split_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let pieces = split_pieces(text, chunk_size, overlap, SEPARATORS);
    merge_pieces(&pieces, chunk_size, overlap)
}

/// Break text into fragments no longer than `chunk_size`, trying each
/// separator in order and recursing into oversized fragments.
fn split_pieces(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if text.chars().count() <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((sep, rest)) = separators.split_first() else {
        return char_windows(text, chunk_size, overlap);
    };

    let splits = split_inclusive(text, sep);
    if splits.len() <= 1 {
        return split_pieces(text, chunk_size, overlap, rest);
    }

    let mut out = Vec::new();
    for piece in splits {
        if piece.chars().count() <= chunk_size {
            out.push(piece);
        } else {
            out.extend(split_pieces(&piece, chunk_size, overlap, rest));
        }
    }
    out
}

/// Split on `sep`, keeping the separator at the end of each fragment so
/// that concatenating fragments reproduces the input.
fn split_inclusive(text: &str, sep: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut last = 0;
    for (pos, matched) in text.match_indices(sep) {
        let end = pos + matched.len();
        out.push(text[last..end].to_string());
        last = end;
    }
    if last < text.len() {
        out.push(text[last..].to_string());
    }
    out
}

/// Last-resort splitting for text with no usable boundaries: fixed
/// character windows that already carry the overlap.
fn char_windows(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}

/// Merge fragments into chunks close to `chunk_size`, retaining a tail of
/// at most `overlap` characters from one chunk into the next.
fn merge_pieces(
    pieces: &[String],
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut window_len = 0usize;

    for piece in pieces {
        let piece_len = piece.chars().count();

        if window_len + piece_len > chunk_size && !window.is_empty() {
            push_chunk(&mut chunks, &window);

            // Drop fragments from the front until the retained tail fits
            // the overlap budget and leaves room for the next piece.
            while window_len > overlap
                || (window_len + piece_len > chunk_size && window_len > 0)
            {
                let removed = window.remove(0);
                window_len -= removed.chars().count();
            }
        }

        window.push(piece);
        window_len += piece_len;
    }

    push_chunk(&mut chunks, &window);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, window: &[&str]) {
    let joined: String = window.concat();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split row-oriented content into blocks of [`ROWS_PER_CHUNK`] data rows,
/// each block repeating the header row on top. A header is never separated
/// from its rows; content without data rows is returned whole.
///
/// # Examples
///
/// ```
/// use askdocs::chunking::split_rows;
///
/// let mut csv = String::from("name,age\n");
/// for i in 0..25 {
///     csv.push_str(&format!("row{i},{i}\n"));
/// }
/// let chunks = split_rows(&csv);
/// assert_eq!(chunks.len(), 3);
/// assert!(chunks.iter().all(|c| c.starts_with("name,age")));
/// ```
pub fn split_rows(content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= 1 {
        return vec![content.to_string()];
    }

    let header = lines[0];
    let mut chunks = Vec::new();
    for block in lines[1..].chunks(ROWS_PER_CHUNK) {
        let mut rows = Vec::with_capacity(block.len() + 1);
        rows.push(header);
        rows.extend_from_slice(block);
        let chunk = rows.join("\n");
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
    }

    if chunks.is_empty() {
        vec![content.to_string()]
    } else {
        chunks
    }
}

/// Split structured-data content by its logical shape: arrays into blocks
/// of [`ARRAY_ITEMS_PER_CHUNK`] items, objects into blocks of
/// [`OBJECT_PAIRS_PER_CHUNK`] key/value pairs. Content that is not valid
/// JSON (or is a bare scalar) falls back to generic text splitting.
pub fn split_structured(
    content: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => items
            .chunks(ARRAY_ITEMS_PER_CHUNK)
            .filter_map(|block| {
                serde_json::to_string_pretty(&Value::Array(block.to_vec()))
                    .ok()
            })
            .collect(),
        Ok(Value::Object(map)) => {
            let pairs: Vec<(String, Value)> = map.into_iter().collect();
            pairs
                .chunks(OBJECT_PAIRS_PER_CHUNK)
                .filter_map(|block| {
                    let object: serde_json::Map<String, Value> =
                        block.iter().cloned().collect();
                    serde_json::to_string_pretty(&Value::Object(object)).ok()
                })
                .collect()
        }
        _ => split_text(content, chunk_size, overlap),
    }
}
