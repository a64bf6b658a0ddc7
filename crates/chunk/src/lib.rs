//! Pluggable chunking strategies that emit half-open `(start, end)` character
//! offsets over a document's content. Three deterministic strategies: fixed
//! size, by-line, and delimiter-regex.
//!
//! Strategy parameters are validated at construction: an invalid strategy
//! never reaches the chunk loop.

use regex::Regex;
use rlm_core::{ChunkStrategy, Error, Result};

/// Validate a strategy descriptor and return a closure-free iterator builder.
/// Called once per `chunk.create`; the descriptor itself is what's persisted
/// and compared for cache-reuse, not this validated form.
pub fn validate(strategy: &ChunkStrategy) -> Result<()> {
    match strategy {
        ChunkStrategy::Fixed { chunk_size, overlap, .. } => {
            if *chunk_size == 0 {
                return Err(Error::InvalidStrategy("chunk_size must be > 0".into()));
            }
            if *overlap >= *chunk_size {
                return Err(Error::InvalidStrategy(
                    "overlap must be less than chunk_size (the chunker would not make forward progress)".into(),
                ));
            }
            Ok(())
        }
        ChunkStrategy::Lines { line_count, overlap, .. } => {
            if *line_count == 0 {
                return Err(Error::InvalidStrategy("line_count must be > 0".into()));
            }
            if *overlap >= *line_count {
                return Err(Error::InvalidStrategy(
                    "overlap must be less than line_count".into(),
                ));
            }
            Ok(())
        }
        ChunkStrategy::Delimiter { delimiter, .. } => {
            if delimiter.is_empty() {
                return Err(Error::InvalidStrategy("delimiter must be non-empty".into()));
            }
            Regex::new(delimiter)
                .map_err(|e| Error::InvalidStrategy(format!("invalid delimiter regex: {e}")))?;
            Ok(())
        }
        ChunkStrategy::Manual => Err(Error::InvalidStrategy(
            "manual is not a constructible chunking strategy".into(),
        )),
    }
}

/// Produce the ordered `(start, end)` offset pairs for `content` under
/// `strategy`. `strategy` must already have passed [`validate`].
pub fn chunk(strategy: &ChunkStrategy, content: &str) -> Result<Vec<(usize, usize)>> {
    validate(strategy)?;
    let chars: Vec<char> = content.chars().collect();
    let raw = match strategy {
        ChunkStrategy::Fixed { chunk_size, overlap, .. } => fixed_chunks(&chars, *chunk_size, *overlap),
        ChunkStrategy::Lines { line_count, overlap, .. } => line_chunks(&chars, *line_count, *overlap),
        ChunkStrategy::Delimiter { delimiter, .. } => delimiter_chunks(content, &chars, delimiter)?,
        ChunkStrategy::Manual => unreachable!("rejected by validate()"),
    };
    let max_chunks = match strategy {
        ChunkStrategy::Fixed { max_chunks, .. }
        | ChunkStrategy::Lines { max_chunks, .. }
        | ChunkStrategy::Delimiter { max_chunks, .. } => *max_chunks,
        ChunkStrategy::Manual => None,
    };
    Ok(match max_chunks {
        Some(n) => raw.into_iter().take(n).collect(),
        None => raw,
    })
}

fn fixed_chunks(chars: &[char], chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + chunk_size).min(len);
        spans.push((start, end));
        if end >= len {
            break;
        }
        start = if overlap > 0 { end - overlap } else { end };
    }
    spans
}

fn line_chunks(chars: &[char], line_count: usize, overlap: usize) -> Vec<(usize, usize)> {
    let mut line_offsets = vec![0usize];
    for (idx, ch) in chars.iter().enumerate() {
        if *ch == '\n' {
            line_offsets.push(idx + 1);
        }
    }
    // `lines` has one entry per line as `str::split('\n')` would produce;
    // line_offsets[i] is the start offset of line i, with a trailing
    // sentinel at the content end.
    let num_lines = line_offsets.len();
    let mut offsets = line_offsets.clone();
    offsets.push(chars.len());

    let mut spans = Vec::new();
    let mut i = 0;
    loop {
        let end_idx = (i + line_count).min(num_lines);
        let start_offset = offsets[i];
        let end_offset = offsets[end_idx];
        spans.push((start_offset, end_offset));
        if end_idx >= num_lines {
            break;
        }
        i = if overlap > 0 { end_idx - overlap } else { end_idx };
    }
    spans
}

fn delimiter_chunks(content: &str, chars: &[char], delimiter: &str) -> Result<Vec<(usize, usize)>> {
    let re = Regex::new(delimiter)
        .map_err(|e| Error::InvalidStrategy(format!("invalid delimiter regex: {e}")))?;

    // Matches are found on the byte-indexed `content`; convert to char
    // offsets since every other offset in this system is char-indexed.
    let byte_to_char = byte_to_char_table(content);
    let matches: Vec<(usize, usize)> = re
        .find_iter(content)
        .map(|m| (byte_to_char[m.start()], byte_to_char[m.end()]))
        .collect();

    if matches.is_empty() {
        return Ok(vec![(0, chars.len())]);
    }

    let mut spans = Vec::new();
    if matches[0].0 > 0 {
        spans.push((0, matches[0].0));
    }
    for (i, m) in matches.iter().enumerate() {
        let start = m.0;
        let end = if i + 1 < matches.len() { matches[i + 1].0 } else { chars.len() };
        spans.push((start, end));
    }
    Ok(spans)
}

fn byte_to_char_table(content: &str) -> Vec<usize> {
    let mut table = vec![0usize; content.len() + 1];
    let mut char_idx = 0;
    for (byte_idx, ch) in content.char_indices() {
        table[byte_idx] = char_idx;
        char_idx += 1;
        let _ = ch;
    }
    table[content.len()] = char_idx;
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_chunks_advance_and_truncate_last_window() {
        let strategy = ChunkStrategy::Fixed { chunk_size: 4, overlap: 0, max_chunks: None };
        let spans = chunk(&strategy, "abcdefghij").unwrap();
        assert_eq!(spans, vec![(0, 4), (4, 8), (8, 10)]);
    }

    #[test]
    fn fixed_chunks_with_overlap_reuse_trailing_window() {
        let strategy = ChunkStrategy::Fixed { chunk_size: 4, overlap: 2, max_chunks: None };
        let spans = chunk(&strategy, "abcdefgh").unwrap();
        assert_eq!(spans, vec![(0, 4), (2, 6), (4, 8)]);
    }

    #[test]
    fn fixed_overlap_ge_chunk_size_is_rejected() {
        let strategy = ChunkStrategy::Fixed { chunk_size: 4, overlap: 4, max_chunks: None };
        assert!(validate(&strategy).is_err());
    }

    #[test]
    fn line_chunks_include_trailing_newline() {
        let strategy = ChunkStrategy::Lines { line_count: 1, overlap: 0, max_chunks: None };
        let spans = chunk(&strategy, "a\nbb\nccc").unwrap();
        // line 0: "a\n" -> (0,2); line 1: "bb\n" -> (2,5); line 2: "ccc" -> (5,8)
        assert_eq!(spans, vec![(0, 2), (2, 5), (5, 8)]);
    }

    #[test]
    fn delimiter_chunks_include_delimiter_at_chunk_start() {
        let strategy = ChunkStrategy::Delimiter { delimiter: "---".into(), max_chunks: None };
        let spans = chunk(&strategy, "intro---first---second").unwrap();
        let content = "intro---first---second";
        let rendered: Vec<&str> = spans.iter().map(|(s, e)| &content[*s..*e]).collect();
        assert_eq!(rendered, vec!["intro", "---first", "---second"]);
    }

    #[test]
    fn delimiter_with_no_matches_is_one_chunk() {
        let strategy = ChunkStrategy::Delimiter { delimiter: "ZZZ".into(), max_chunks: None };
        let spans = chunk(&strategy, "no delimiter here").unwrap();
        assert_eq!(spans, vec![(0, 18)]);
    }

    #[test]
    fn max_chunks_truncates_the_stream() {
        let strategy = ChunkStrategy::Fixed { chunk_size: 2, overlap: 0, max_chunks: Some(2) };
        let spans = chunk(&strategy, "abcdefgh").unwrap();
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn delimiter_offsets_are_char_indexed_not_byte_indexed() {
        let strategy = ChunkStrategy::Delimiter { delimiter: "-".into(), max_chunks: None };
        let spans = chunk(&strategy, "héllo-world").unwrap();
        let chars: Vec<char> = "héllo-world".chars().collect();
        let rendered: String = chars[spans[1].0..spans[1].1].iter().collect();
        assert_eq!(rendered, "-world");
    }

    proptest! {
        /// Fixed chunking with no overlap and no cap must tile the document
        /// exactly once: spans are contiguous, the first starts at 0, the
        /// last ends at the char count, and no char falls outside every span.
        #[test]
        fn fixed_chunks_cover_the_whole_document_without_overlap(
            content in "[a-zA-Z0-9 \n]{0,200}",
            chunk_size in 1usize..20,
        ) {
            let strategy = ChunkStrategy::Fixed { chunk_size, overlap: 0, max_chunks: None };
            let spans = chunk(&strategy, &content).unwrap();
            let len = content.chars().count();
            if len == 0 {
                prop_assert!(spans.is_empty());
            } else {
                prop_assert_eq!(spans[0].0, 0);
                prop_assert_eq!(spans.last().unwrap().1, len);
                for window in spans.windows(2) {
                    prop_assert_eq!(window[0].1, window[1].0);
                }
            }
        }
    }
}
