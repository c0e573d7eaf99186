use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{info, warn};

use ragconf_core::Chunk;
use ragconf_index::AnalysisRecord;

use crate::error::{Result, RetrievalError};
use crate::source::DocumentSource;
use crate::store::ChunkStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub loaded: usize,
    pub rebuilt: usize,
    pub skipped: Vec<String>,
}

pub struct IndexBuilder {
    persist_text_limit: Option<usize>,
}

impl IndexBuilder {
    pub fn new(persist_text_limit: Option<usize>) -> Self {
        Self { persist_text_limit }
    }

    pub fn build(&self, store: &ChunkStore, source: &dyn DocumentSource) -> Result<BuildReport> {
        let persisted = source
            .embedding_records()
            .map_err(|err| RetrievalError::IndexBuild(format!("{err:#}")))?;
        if !persisted.is_empty() {
            let loaded = store.load_persisted(persisted);
            store.mark_indexed();
            info!(documents = loaded, "index loaded from persisted embeddings");
            return Ok(BuildReport {
                loaded,
                ..Default::default()
            });
        }
        self.rebuild(store, source)
    }

    pub fn rebuild(&self, store: &ChunkStore, source: &dyn DocumentSource) -> Result<BuildReport> {
        let since = store.generation();
        let documents = source
            .list_documents()
            .map_err(|err| RetrievalError::IndexBuild(format!("{err:#}")))?;
        let results: Vec<(String, Result<Vec<Chunk>>)> = documents
            .par_iter()
            .map(|doc| (doc.document_id.clone(), store.prepare(doc)))
            .collect();

        let mut report = BuildReport::default();
        let mut built: BTreeMap<String, Vec<Chunk>> = BTreeMap::new();
        for (document_id, result) in results {
            match result {
                Ok(chunks) => {
                    built.insert(document_id, chunks);
                }
                Err(err) => {
                    warn!(document_id = %document_id, error = %err, "skipping document during index build");
                    report.skipped.push(document_id);
                }
            }
        }
        report.rebuilt = built.len();

        let records: Vec<AnalysisRecord> = built
            .iter()
            .map(|(document_id, chunks)| {
                AnalysisRecord::document_embedding(
                    document_id.clone(),
                    chunks
                        .iter()
                        .map(|chunk| chunk.to_record(self.persist_text_limit))
                        .collect(),
                )
            })
            .collect();
        store.replace_all(built, since);
        store.mark_indexed();
        if let Err(err) = source.persist_embeddings(&records) {
            warn!(error = ?err, "failed to persist document embeddings");
        }
        info!(
            documents = report.rebuilt,
            skipped = report.skipped.len(),
            "index rebuilt from corpus"
        );
        Ok(report)
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(None)
    }
}
