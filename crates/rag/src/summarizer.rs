use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::warn;

use ragconf_llm::{LlmClient, LlmProvider, LlmRequest};

use crate::config::{SummarizerProvider, SummarizerSettings};
use crate::context::RetrievedDocument;

pub trait ContextSummarizer: Send + Sync {
    fn summarize(&self, query: &str, documents: &[RetrievedDocument]) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSummarizer;

impl TemplateSummarizer {
    pub fn render(query: &str, documents: &[RetrievedDocument]) -> String {
        if documents.is_empty() {
            return format!("No relevant historical documents found for \"{query}\".");
        }
        let mut types: Vec<&str> = documents
            .iter()
            .map(|doc| doc.document.document_type.as_str())
            .collect();
        types.sort_unstable();
        types.dedup();
        format!(
            "Found {} relevant historical document{} for \"{}\" (types: {}).",
            documents.len(),
            if documents.len() == 1 { "" } else { "s" },
            query,
            types.join(", ")
        )
    }
}

impl ContextSummarizer for TemplateSummarizer {
    fn summarize(&self, query: &str, documents: &[RetrievedDocument]) -> Result<String> {
        Ok(Self::render(query, documents))
    }
}

pub struct LlmSummarizer {
    client: LlmClient,
}

impl LlmSummarizer {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn prompt(query: &str, documents: &[RetrievedDocument]) -> String {
        let mut prompt = format!(
            "Summarize in two sentences how these prior documents help analyse a new document.\nQuery: {query}\n\n"
        );
        for doc in documents {
            prompt.push_str(&format!(
                "[{} / {} / similarity {:.2}]\n",
                doc.document.document_id, doc.document.document_type, doc.similarity
            ));
            for chunk in &doc.relevant_chunks {
                prompt.push_str(ragconf_core::prefix_chars(&chunk.text, 300));
                prompt.push('\n');
            }
        }
        prompt
    }
}

impl ContextSummarizer for LlmSummarizer {
    fn summarize(&self, query: &str, documents: &[RetrievedDocument]) -> Result<String> {
        if documents.is_empty() {
            return Ok(TemplateSummarizer::render(query, documents));
        }
        let response = self.client.complete_blocking(&LlmRequest {
            system: Some("You write terse analyst notes.".to_string()),
            user: Self::prompt(query, documents),
            max_tokens: Some(160),
        })?;
        let content = response.trim();
        if content.is_empty() {
            return Err(anyhow!("summarizer returned empty content"));
        }
        Ok(content.to_string())
    }
}

pub fn summarize_or_template(
    summarizer: &dyn ContextSummarizer,
    query: &str,
    documents: &[RetrievedDocument],
) -> String {
    match summarizer.summarize(query, documents) {
        Ok(summary) => summary,
        Err(err) => {
            warn!(error = ?err, "context summarizer failed; using template");
            TemplateSummarizer::render(query, documents)
        }
    }
}

pub fn build_summarizer(settings: &SummarizerSettings) -> Result<Arc<dyn ContextSummarizer>> {
    let timeout = Duration::from_secs(settings.timeout_secs.max(1));
    match settings.provider {
        SummarizerProvider::Template => Ok(Arc::new(TemplateSummarizer)),
        SummarizerProvider::Local => Ok(Arc::new(LlmSummarizer::new(LlmClient::new(
            LlmProvider::Local,
            "local",
            timeout,
        )?))),
        SummarizerProvider::OpenAi => Ok(Arc::new(LlmSummarizer::new(LlmClient::new(
            LlmProvider::OpenAi,
            settings.model.clone(),
            timeout,
        )?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    impl ContextSummarizer for Offline {
        fn summarize(&self, _query: &str, _documents: &[RetrievedDocument]) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    #[test]
    fn failing_summarizer_falls_back_to_template() {
        let summary = summarize_or_template(&Offline, "payment terms", &[]);
        assert_eq!(
            summary,
            "No relevant historical documents found for \"payment terms\"."
        );
    }

    #[test]
    fn local_llm_summarizer_skips_empty_context() {
        let summarizer = LlmSummarizer::new(LlmClient::local());
        let summary = summarizer.summarize("lease terms", &[]).unwrap();
        assert!(summary.contains("lease terms"));
    }
}
