use serde::Deserialize;

use ragconf_core::{ChunkConfig, HashVectorizerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    Hash,
    #[serde(rename = "openai")]
    OpenAi,
}

impl EmbeddingProvider {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "hash" => Some(EmbeddingProvider::Hash),
            "openai" | "open_ai" => Some(EmbeddingProvider::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub dimensions: usize,
    pub max_tokens: usize,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hash,
            dimensions: 1536,
            max_tokens: 100,
            model: "text-embedding-3-small".to_string(),
            timeout_secs: 10,
        }
    }
}

impl EmbeddingSettings {
    pub fn hash_config(&self) -> HashVectorizerConfig {
        HashVectorizerConfig {
            dimensions: self.dimensions,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub window_words: usize,
    pub overlap_words: usize,
    pub min_chunk_chars: usize,
    /// Characters of chunk text kept in persisted embedding records; unset keeps all of it.
    pub persist_text_limit: Option<usize>,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let chunk = ChunkConfig::default();
        Self {
            window_words: chunk.window_words,
            overlap_words: chunk.overlap_words,
            min_chunk_chars: chunk.min_chunk_chars,
            persist_text_limit: None,
        }
    }
}

impl ChunkingSettings {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            window_words: self.window_words,
            overlap_words: self.overlap_words,
            min_chunk_chars: self.min_chunk_chars,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k1: f64,
    pub b: f64,
    pub lexical_weight: f64,
    pub semantic_weight: f64,
    pub min_semantic_similarity: f64,
    pub chunks_per_document: usize,
    pub default_max_results: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            lexical_weight: 0.4,
            semantic_weight: 0.6,
            min_semantic_similarity: 0.1,
            chunks_per_document: 3,
            default_max_results: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizerProvider {
    Template,
    #[serde(rename = "openai")]
    OpenAi,
    Local,
}

impl SummarizerProvider {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "template" => Some(SummarizerProvider::Template),
            "openai" | "open_ai" => Some(SummarizerProvider::OpenAi),
            "local" => Some(SummarizerProvider::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    pub provider: SummarizerProvider,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            provider: SummarizerProvider::Template,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub summarizer: SummarizerSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_sections_keep_defaults() {
        let config: RagConfig = serde_json::from_str(
            r#"{"embedding": {"dimensions": 64}, "retrieval": {"k1": 1.2}}"#,
        )
        .unwrap();
        assert_eq!(config.embedding.dimensions, 64);
        assert_eq!(config.embedding.max_tokens, 100);
        assert_eq!(config.retrieval.k1, 1.2);
        assert_eq!(config.retrieval.b, 0.75);
        assert_eq!(config.chunking.window_words, 1000);
        assert_eq!(config.summarizer.provider, SummarizerProvider::Template);
    }
}
