use serde::{Deserialize, Serialize};

use ragconf_core::ChunkMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementStrategy {
    TerminologySupport,
    PatternRecognition,
    ComparativeAnalysis,
    DomainExpertise,
}

impl EnhancementStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhancementStrategy::TerminologySupport => "terminology_support",
            EnhancementStrategy::PatternRecognition => "pattern_recognition",
            EnhancementStrategy::ComparativeAnalysis => "comparative_analysis",
            EnhancementStrategy::DomainExpertise => "domain_expertise",
        }
    }

    pub fn select(average_similarity: f64, industry: &str, documents_returned: usize) -> Self {
        if average_similarity > 0.8 {
            EnhancementStrategy::ComparativeAnalysis
        } else if !is_general(industry) {
            EnhancementStrategy::DomainExpertise
        } else if documents_returned > 3 {
            EnhancementStrategy::PatternRecognition
        } else {
            EnhancementStrategy::TerminologySupport
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub document_id: String,
    pub industry: String,
    pub document_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevantChunk {
    pub chunk_id: String,
    pub text: String,
    pub similarity: f64,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedDocument {
    pub document: DocumentRef,
    pub similarity: f64,
    pub relevant_chunks: Vec<RelevantChunk>,
    pub reason_for_relevance: String,
}

impl RetrievedDocument {
    pub fn historical_confidence(&self) -> Option<f64> {
        if self.relevant_chunks.is_empty() {
            return None;
        }
        let sum: f64 = self
            .relevant_chunks
            .iter()
            .map(|chunk| chunk.metadata.confidence)
            .sum();
        Some(sum / self.relevant_chunks.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagContext {
    pub query: String,
    pub retrieved_documents: Vec<RetrievedDocument>,
    pub total_documents_searched: usize,
    pub average_similarity: f64,
    pub context_summary: String,
    pub enhancement_strategy: EnhancementStrategy,
    #[serde(default)]
    pub degraded: bool,
}

impl RagContext {
    pub fn degraded(query: &str, reason: &str) -> Self {
        Self {
            query: query.to_string(),
            retrieved_documents: Vec::new(),
            total_documents_searched: 0,
            average_similarity: 0.0,
            context_summary: format!(
                "Historical context unavailable for \"{query}\" ({reason}); analysis proceeds without retrieved documents."
            ),
            enhancement_strategy: EnhancementStrategy::TerminologySupport,
            degraded: true,
        }
    }

    pub fn sample_size(&self) -> usize {
        self.retrieved_documents.len()
    }

    pub fn historical_confidence(&self) -> Option<f64> {
        let values: Vec<f64> = self
            .retrieved_documents
            .iter()
            .filter_map(RetrievedDocument::historical_confidence)
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn is_general(industry: &str) -> bool {
    industry.trim().eq_ignore_ascii_case("general")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_follows_rule_order() {
        assert_eq!(
            EnhancementStrategy::select(0.85, "finance", 1),
            EnhancementStrategy::ComparativeAnalysis
        );
        assert_eq!(
            EnhancementStrategy::select(0.5, "finance", 5),
            EnhancementStrategy::DomainExpertise
        );
        assert_eq!(
            EnhancementStrategy::select(0.5, "general", 4),
            EnhancementStrategy::PatternRecognition
        );
        assert_eq!(
            EnhancementStrategy::select(0.5, "General", 3),
            EnhancementStrategy::TerminologySupport
        );
    }

    #[test]
    fn degraded_context_is_empty() {
        let context = RagContext::degraded("net terms", "vectorizer offline");
        assert!(context.degraded);
        assert!(context.retrieved_documents.is_empty());
        assert_eq!(context.average_similarity, 0.0);
        assert!(context.context_summary.contains("net terms"));
        assert!(context.historical_confidence().is_none());
    }
}
