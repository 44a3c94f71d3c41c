//! Greedy fixed-window text splitter.
//!
//! Splits raw text into overlapping chunks of `chunk_size` characters,
//! advancing by `chunk_size - overlap` each step. No semantic awareness:
//! sentence and word boundaries are ignored. This is a deliberate
//! simplicity/speed tradeoff, not a bug.

use crate::error::{RagError, Result};

/// Character-window splitter with a validated size/overlap pair.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Create a splitter.
    ///
    /// Fails with a configuration error if `chunk_size` is zero or
    /// `overlap >= chunk_size` (the window would never advance).
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be > 0".to_string()));
        }
        if overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into overlapping chunks.
    ///
    /// Empty input yields an empty sequence. A final remainder shorter
    /// than `chunk_size` is still emitted. Windows are measured in
    /// characters, so multi-byte input never splits inside a code point.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_example() {
        let splitter = TextSplitter::new(4, 1).unwrap();
        let chunks = splitter.split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn empty_input_yields_empty_sequence() {
        let splitter = TextSplitter::new(4, 1).unwrap();
        assert!(splitter.split("").is_empty());
    }

    #[test]
    fn short_input_single_chunk() {
        let splitter = TextSplitter::new(100, 10).unwrap();
        assert_eq!(splitter.split("hello"), vec!["hello"]);
    }

    #[test]
    fn remainder_is_emitted() {
        let splitter = TextSplitter::new(4, 1).unwrap();
        // 11 chars: windows at 0, 3, 6, 9
        let chunks = splitter.split("abcdefghijk");
        assert_eq!(chunks, vec!["abcd", "defg", "ghij", "jk"]);
    }

    #[test]
    fn overlap_equal_to_size_is_rejected() {
        let err = TextSplitter::new(4, 4).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn overlap_greater_than_size_is_rejected() {
        let err = TextSplitter::new(4, 8).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = TextSplitter::new(0, 0).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn reconstruction_with_overlap_removed() {
        let text = "The quick brown fox jumps over the lazy dog, twice.";
        let chunk_size = 12;
        let overlap = 4;
        let splitter = TextSplitter::new(chunk_size, overlap).unwrap();
        let chunks = splitter.split(text);

        // Rebuild by tracking absolute positions: chunk i starts at
        // i * (chunk_size - overlap).
        let step = chunk_size - overlap;
        let mut rebuilt: Vec<char> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let start = i * step;
            let chars: Vec<char> = chunk.chars().collect();
            let already = rebuilt.len().saturating_sub(start);
            rebuilt.extend_from_slice(&chars[already..]);
        }
        let rebuilt: String = rebuilt.into_iter().collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_input_splits_on_char_boundaries() {
        let splitter = TextSplitter::new(3, 1).unwrap();
        let chunks = splitter.split("héllö wörld");
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
        assert!(chunks[0].starts_with('h'));
    }

    #[test]
    fn deterministic() {
        let splitter = TextSplitter::new(7, 2).unwrap();
        let text = "determinism is a property worth testing for";
        assert_eq!(splitter.split(text), splitter.split(text));
    }
}
