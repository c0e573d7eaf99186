pub mod bm25;
pub mod builder;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod hybrid;
pub mod semantic;
pub mod source;
pub mod store;
pub mod summarizer;

pub use bm25::{Bm25Params, Bm25Scorer, ScoredChunk};
pub use builder::{BuildReport, IndexBuilder};
pub use config::{
    ChunkingSettings, EmbeddingProvider, EmbeddingSettings, RagConfig, RetrievalSettings,
    SummarizerProvider, SummarizerSettings,
};
pub use context::{
    is_general, DocumentRef, EnhancementStrategy, RagContext, RelevantChunk, RetrievedDocument,
};
pub use embedding::{build_vectorizer, OpenAiVectorizer};
pub use error::{Result, RetrievalError};
pub use hybrid::{fuse, FusionWeights, HybridRetriever};
pub use semantic::SemanticScorer;
pub use source::{DocumentSource, InMemorySource, JsonlCorpus};
pub use store::{ChunkStore, IndexSnapshot, IndexStats, IndexedChunk};
pub use summarizer::{
    build_summarizer, summarize_or_template, ContextSummarizer, LlmSummarizer, TemplateSummarizer,
};
