use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;
use tracing::{debug, warn};

use ragconf_core::ChunkMetadata;

use crate::bm25::{Bm25Params, Bm25Scorer, ScoredChunk};
use crate::builder::IndexBuilder;
use crate::config::RetrievalSettings;
use crate::context::{
    is_general, DocumentRef, EnhancementStrategy, RagContext, RelevantChunk, RetrievedDocument,
};
use crate::error::{Result, RetrievalError};
use crate::semantic::SemanticScorer;
use crate::source::DocumentSource;
use crate::store::ChunkStore;
use crate::summarizer::{summarize_or_template, ContextSummarizer, TemplateSummarizer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub lexical: f64,
    pub semantic: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            lexical: 0.4,
            semantic: 0.6,
        }
    }
}

/// Fuses lexical and semantic scores into one ranking, best first, ties broken
/// by chunk id.
///
/// BM25 scores are divided by `max(maxScore, 1)`. With only one signal present
/// the ranking is that signal alone; with both, chunks seen by one signal keep
/// that signal's weighted score.
pub fn fuse<'a>(
    lexical: &[ScoredChunk<'a>],
    semantic: &[ScoredChunk<'a>],
    weights: FusionWeights,
) -> Vec<ScoredChunk<'a>> {
    let max_bm25 = lexical.iter().map(|s| s.score).fold(1.0f64, f64::max);
    let mut fused: Vec<ScoredChunk<'a>> = match (lexical.is_empty(), semantic.is_empty()) {
        (true, true) => Vec::new(),
        (true, false) => semantic.to_vec(),
        (false, true) => lexical
            .iter()
            .map(|s| ScoredChunk {
                chunk: s.chunk,
                score: s.score / max_bm25,
            })
            .collect(),
        (false, false) => {
            let mut by_id: BTreeMap<&str, (ScoredChunk<'a>, Option<f64>, Option<f64>)> =
                BTreeMap::new();
            for s in lexical {
                by_id.entry(s.chunk_id()).or_insert((*s, None, None)).1 = Some(s.score / max_bm25);
            }
            for s in semantic {
                by_id.entry(s.chunk_id()).or_insert((*s, None, None)).2 = Some(s.score);
            }
            by_id
                .into_values()
                .map(|(entry, lex, sem)| {
                    let score = match (lex, sem) {
                        (Some(l), Some(s)) => weights.lexical * l + weights.semantic * s,
                        (Some(l), None) => weights.lexical * l,
                        (None, Some(s)) => weights.semantic * s,
                        (None, None) => 0.0,
                    };
                    ScoredChunk {
                        chunk: entry.chunk,
                        score,
                    }
                })
                .collect()
        }
    };
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id().cmp(b.chunk_id()))
    });
    fused
}

pub struct HybridRetriever {
    store: Arc<ChunkStore>,
    source: Option<Arc<dyn DocumentSource>>,
    builder: IndexBuilder,
    summarizer: Arc<dyn ContextSummarizer>,
    settings: RetrievalSettings,
    build_lock: Mutex<()>,
}

impl HybridRetriever {
    pub fn new(store: Arc<ChunkStore>, settings: RetrievalSettings) -> Self {
        Self {
            store,
            source: None,
            builder: IndexBuilder::default(),
            summarizer: Arc::new(TemplateSummarizer),
            settings,
            build_lock: Mutex::new(()),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn DocumentSource>, builder: IndexBuilder) -> Self {
        self.source = Some(source);
        self.builder = builder;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn ContextSummarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Never fails: retrieval errors yield an explicitly degraded, empty context.
    pub fn retrieve(
        &self,
        query: &str,
        industry: &str,
        document_type: Option<&str>,
        max_results: usize,
    ) -> RagContext {
        match self.try_retrieve(query, industry, document_type, max_results) {
            Ok(context) => context,
            Err(err) => {
                warn!(query, industry, error = %err, "retrieval degraded");
                RagContext::degraded(query, &err.to_string())
            }
        }
    }

    pub fn ensure_indexed(&self) -> Result<()> {
        if self.store.is_indexed() {
            return Ok(());
        }
        let _guard = self.build_lock.lock();
        if self.store.is_indexed() {
            return Ok(());
        }
        match &self.source {
            Some(source) => {
                self.builder.build(&self.store, source.as_ref())?;
            }
            None => self.store.mark_indexed(),
        }
        Ok(())
    }

    pub fn try_retrieve(
        &self,
        query: &str,
        industry: &str,
        document_type: Option<&str>,
        max_results: usize,
    ) -> Result<RagContext> {
        self.ensure_indexed()?;
        let snapshot = self.store.snapshot();
        let population = snapshot.eligible(industry, document_type);
        let documents_searched = population
            .iter()
            .map(|c| c.chunk.document_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let lexical = Bm25Scorer::new(Bm25Params {
            k1: self.settings.k1,
            b: self.settings.b,
        })
        .score(query, &population);
        let query_vector = self
            .store
            .vectorizer()
            .vectorize(query)
            .map_err(RetrievalError::QueryVector)?;
        let semantic =
            SemanticScorer::new(self.settings.min_semantic_similarity).score(&query_vector, &population);
        let fused = fuse(
            &lexical,
            &semantic,
            FusionWeights {
                lexical: self.settings.lexical_weight,
                semantic: self.settings.semantic_weight,
            },
        );
        debug!(
            eligible = population.len(),
            lexical = lexical.len(),
            semantic = semantic.len(),
            fused = fused.len(),
            "hybrid scoring complete"
        );

        let retrieved = self.group_documents(fused, industry, document_type, max_results);
        let average_similarity = if retrieved.is_empty() {
            0.0
        } else {
            retrieved.iter().map(|d| d.similarity).sum::<f64>() / retrieved.len() as f64
        };
        let strategy = EnhancementStrategy::select(average_similarity, industry, retrieved.len());
        let summary = summarize_or_template(self.summarizer.as_ref(), query, &retrieved);
        Ok(RagContext {
            query: query.to_string(),
            retrieved_documents: retrieved,
            total_documents_searched: documents_searched,
            average_similarity,
            context_summary: summary,
            enhancement_strategy: strategy,
            degraded: false,
        })
    }

    fn group_documents(
        &self,
        fused: Vec<ScoredChunk<'_>>,
        industry: &str,
        document_type: Option<&str>,
        max_results: usize,
    ) -> Vec<RetrievedDocument> {
        let grouped = fused
            .into_iter()
            .take(max_results.saturating_mul(2))
            .into_group_map_by(|scored| scored.chunk.chunk.document_id.clone());

        let mut documents: Vec<RetrievedDocument> = grouped
            .into_iter()
            .map(|(document_id, mut chunks)| {
                let similarity =
                    chunks.iter().map(|c| c.score).sum::<f64>() / chunks.len() as f64;
                chunks.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.chunk_id().cmp(b.chunk_id()))
                });
                let metadata = chunks[0].chunk.chunk.metadata.clone();
                let reason = relevance_reason(similarity, &metadata, industry, document_type);
                RetrievedDocument {
                    document: DocumentRef {
                        document_id,
                        industry: metadata.industry.clone(),
                        document_type: metadata.document_type.clone(),
                    },
                    similarity: similarity.clamp(0.0, 1.0),
                    relevant_chunks: chunks
                        .into_iter()
                        .take(self.settings.chunks_per_document)
                        .map(|scored| RelevantChunk {
                            chunk_id: scored.chunk.chunk.chunk_id.clone(),
                            text: scored.chunk.chunk.text.clone(),
                            similarity: scored.score.clamp(0.0, 1.0),
                            metadata: scored.chunk.chunk.metadata.clone(),
                        })
                        .collect(),
                    reason_for_relevance: reason,
                }
            })
            .collect();
        documents.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.document_id.cmp(&b.document.document_id))
        });
        documents.truncate(max_results);
        documents
    }
}

fn relevance_reason(
    similarity: f64,
    metadata: &ChunkMetadata,
    industry: &str,
    document_type: Option<&str>,
) -> String {
    let strength = match similarity {
        s if s > 0.8 => "Very high content similarity",
        s if s > 0.6 => "High content similarity",
        s if s > 0.4 => "Moderate content similarity",
        _ => "Partial content overlap",
    };
    let mut parts = vec![format!("{strength} ({similarity:.2})")];
    if !is_general(industry) && metadata.industry.eq_ignore_ascii_case(industry) {
        parts.push(format!("same industry ({})", metadata.industry));
    }
    if let Some(doc_type) = document_type {
        if metadata.document_type.eq_ignore_ascii_case(doc_type) {
            parts.push(format!("same document type ({})", metadata.document_type));
        }
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IndexedChunk;
    use chrono::Utc;
    use ragconf_core::Chunk;

    fn indexed(id: &str) -> IndexedChunk {
        IndexedChunk::new(Chunk {
            document_id: id.to_string(),
            chunk_id: id.to_string(),
            chunk_index: 0,
            text: String::new(),
            vector: Vec::new(),
            metadata: ChunkMetadata {
                industry: "finance".to_string(),
                document_type: "invoice".to_string(),
                entity_types: Default::default(),
                confidence: 0.8,
                created_at: Utc::now(),
            },
        })
    }

    fn ids<'a>(scored: &'a [ScoredChunk<'a>]) -> Vec<&'a str> {
        scored.iter().map(|s| s.chunk_id()).collect()
    }

    #[test]
    fn empty_lexical_reduces_to_semantic_ranking() {
        let (a, b, c) = (indexed("a"), indexed("b"), indexed("c"));
        let semantic = vec![
            ScoredChunk { chunk: &a, score: 0.3 },
            ScoredChunk { chunk: &b, score: 0.9 },
            ScoredChunk { chunk: &c, score: 0.3 },
        ];
        let fused = fuse(&[], &semantic, FusionWeights::default());
        assert_eq!(ids(&fused), vec!["b", "a", "c"]);
        assert_eq!(fused[0].score, 0.9);
    }

    #[test]
    fn empty_semantic_reduces_to_normalized_bm25() {
        let (a, b) = (indexed("a"), indexed("b"));
        let lexical = vec![
            ScoredChunk { chunk: &a, score: 2.0 },
            ScoredChunk { chunk: &b, score: 4.0 },
        ];
        let fused = fuse(&lexical, &[], FusionWeights::default());
        assert_eq!(ids(&fused), vec!["b", "a"]);
        assert_eq!(fused[0].score, 1.0);
        assert_eq!(fused[1].score, 0.5);

        let small = vec![ScoredChunk { chunk: &a, score: 0.5 }];
        assert_eq!(fuse(&small, &[], FusionWeights::default())[0].score, 0.5);
    }

    #[test]
    fn single_signal_chunks_keep_their_weight() {
        let (a, b, c) = (indexed("a"), indexed("b"), indexed("c"));
        let lexical = vec![
            ScoredChunk { chunk: &a, score: 2.0 },
            ScoredChunk { chunk: &b, score: 1.0 },
        ];
        let semantic = vec![
            ScoredChunk { chunk: &a, score: 0.5 },
            ScoredChunk { chunk: &c, score: 0.5 },
        ];
        let fused = fuse(&lexical, &semantic, FusionWeights::default());
        assert_eq!(ids(&fused), vec!["a", "c", "b"]);
        assert!((fused[0].score - (0.4 + 0.3)).abs() < 1e-12);
        assert!((fused[1].score - 0.3).abs() < 1e-12);
        assert!((fused[2].score - 0.2).abs() < 1e-12);
    }

    #[test]
    fn both_empty_is_empty() {
        assert!(fuse(&[], &[], FusionWeights::default()).is_empty());
    }

    #[test]
    fn reason_mentions_matches() {
        let meta = indexed("a").chunk.metadata;
        let reason = relevance_reason(0.85, &meta, "finance", Some("invoice"));
        assert_eq!(
            reason,
            "Very high content similarity (0.85); same industry (finance); same document type (invoice)"
        );
        let general = relevance_reason(0.2, &meta, "general", None);
        assert_eq!(general, "Partial content overlap (0.20)");
    }
}
