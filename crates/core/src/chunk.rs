use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use ragconf_index::{ChunkMetadata, DocumentRecord, EmbeddingRecord};

use crate::embedding::Vectorizer;
use crate::error::Result;
use crate::text::{prefix_chars, term_stats};

const CHUNK_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub window_words: usize,
    pub overlap_words: usize,
    pub min_chunk_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window_words: 1000,
            overlap_words: 200,
            min_chunk_chars: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// With a `text_limit` shorter than the chunk, the record keeps the lexical
    /// statistics of the full text so a reloaded index scores the same.
    pub fn to_record(&self, text_limit: Option<usize>) -> EmbeddingRecord {
        let text_prefix = match text_limit {
            Some(limit) => prefix_chars(&self.text, limit),
            None => self.text.as_str(),
        };
        let stats = (text_prefix.len() < self.text.len()).then(|| term_stats(&self.text));
        EmbeddingRecord {
            chunk_id: self.chunk_id.clone(),
            text_prefix: text_prefix.to_string(),
            vector: self.vector.clone(),
            metadata: self.metadata.clone(),
            term_stats: stats,
        }
    }

    pub fn from_record(document_id: &str, chunk_index: usize, record: EmbeddingRecord) -> Self {
        Self {
            document_id: document_id.to_string(),
            chunk_id: record.chunk_id,
            chunk_index,
            text: record.text_prefix,
            vector: record.vector,
            metadata: record.metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    pub chunk_index: usize,
    pub word_start: usize,
    pub text: String,
}

pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Overlapping word windows. Windows shorter than `min_chunk_chars` are
    /// dropped; when none qualifies the whole text becomes the only window.
    pub fn windows(&self, text: &str) -> Vec<TextWindow> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let window = self.config.window_words.max(1);
        let overlap = self.config.overlap_words.min(window.saturating_sub(1));
        let mut start = 0usize;
        let mut windows = Vec::new();
        while start < words.len() {
            let end = (start + window).min(words.len());
            let joined = words[start..end].join(" ");
            if joined.chars().count() >= self.config.min_chunk_chars {
                windows.push(TextWindow {
                    chunk_index: windows.len(),
                    word_start: start,
                    text: joined,
                });
            }
            if end == words.len() {
                break;
            }
            start = end - overlap;
        }
        if windows.is_empty() {
            windows.push(TextWindow {
                chunk_index: 0,
                word_start: 0,
                text: text.trim().to_string(),
            });
        }
        windows
    }

    pub fn chunk_document(
        &self,
        document: &DocumentRecord,
        vectorizer: &dyn Vectorizer,
    ) -> Result<Vec<Chunk>> {
        let windows = self.windows(&document.extracted_text);
        let texts: Vec<String> = windows.iter().map(|w| w.text.clone()).collect();
        let vectors = vectorizer.vectorize_batch(&texts)?;
        let metadata = document.metadata();
        debug!(
            document_id = %document.document_id,
            chunks = windows.len(),
            backend = vectorizer.name(),
            "document chunked"
        );
        Ok(windows
            .into_iter()
            .zip(vectors)
            .map(|(window, vector)| Chunk {
                document_id: document.document_id.clone(),
                chunk_id: stable_chunk_id(&document.document_id, window.chunk_index, window.word_start),
                chunk_index: window.chunk_index,
                text: window.text,
                vector,
                metadata: metadata.clone(),
            })
            .collect())
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkConfig::default())
    }
}

fn stable_chunk_id(document_id: &str, chunk_index: usize, word_start: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(CHUNK_VERSION.to_be_bytes());
    hasher.update(chunk_index.to_be_bytes());
    hasher.update(word_start.to_be_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{document_id}:{chunk_index:04}:{}", &digest[..12])
}
