mod chunk;
mod embedding;
mod error;
mod text;

pub use chunk::{Chunk, ChunkConfig, Chunker, TextWindow};
pub use embedding::{
    cosine_similarity, ensure_dimensions, normalize, HashVectorizer, HashVectorizerConfig,
    Vectorizer,
};
pub use error::{CoreError, Result};
pub use ragconf_index::{ChunkMetadata, DocumentRecord, EmbeddingRecord, TermStats};
pub use text::{prefix_chars, term_stats, tokenize, MIN_TERM_CHARS};
