//! Splits a story's text into fixed-size word chunks.
//!
//! Chunk boundaries are a pure function of the text and the chunk size, so a
//! session resumed from a persisted word count lands on exactly the same
//! words it would have seen before the restart.

/// A contiguous slice of the story's word sequence, presented to the reader
/// at once. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub words: Vec<String>,
    pub is_last: bool,
}

#[derive(Debug, Clone)]
pub struct TextChunker {
    words: Vec<String>,
    chunk_size: usize,
}

impl TextChunker {
    pub fn new(full_text: &str, chunk_size: usize) -> Self {
        Self {
            words: full_text.split_whitespace().map(str::to_string).collect(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn total_words(&self) -> usize {
        self.words.len()
    }

    pub fn total_chunks(&self) -> usize {
        self.words.len().div_ceil(self.chunk_size)
    }

    pub fn chunk_at(&self, index: usize) -> Option<Chunk> {
        let start = index.checked_mul(self.chunk_size)?;
        if start >= self.words.len() {
            return None;
        }
        let end = (start + self.chunk_size).min(self.words.len());
        Some(Chunk {
            index,
            words: self.words[start..end].to_vec(),
            is_last: end == self.words.len(),
        })
    }

    /// Chunk index to resume at after reading `words_read` words, clamped to
    /// the final chunk for counts at or past the end of the story.
    pub fn resume_index(&self, words_read: u64) -> usize {
        let raw = (words_read / self.chunk_size as u64) as usize;
        raw.min(self.total_chunks().saturating_sub(1))
    }
}
