use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use ragconf_core::{term_stats, Chunk, ChunkConfig, Chunker, DocumentRecord, TermStats, Vectorizer};
use ragconf_index::AnalysisRecord;

use crate::error::{Result, RetrievalError};

#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub term_freqs: FxHashMap<String, u32>,
    pub term_count: usize,
}

impl IndexedChunk {
    pub fn new(chunk: Chunk) -> Self {
        let stats = term_stats(&chunk.text);
        Self::with_stats(chunk, stats)
    }

    pub fn with_stats(chunk: Chunk, stats: TermStats) -> Self {
        Self {
            chunk,
            term_freqs: stats.term_freqs.into_iter().collect(),
            term_count: stats.term_count,
        }
    }

    pub fn term_frequency(&self, term: &str) -> u32 {
        self.term_freqs.get(term).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    documents: BTreeMap<String, Arc<Vec<IndexedChunk>>>,
    generation: u64,
    // generation of the last insert or removal per document id
    touched: BTreeMap<String, u64>,
}

impl IndexSnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.documents.values().map(|chunks| chunks.len()).sum()
    }

    pub fn document(&self, document_id: &str) -> Option<&[IndexedChunk]> {
        self.documents.get(document_id).map(|chunks| chunks.as_slice())
    }

    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &IndexedChunk> {
        self.documents.values().flat_map(|chunks| chunks.iter())
    }

    pub fn eligible<'a>(
        &'a self,
        industry: &'a str,
        document_type: Option<&'a str>,
    ) -> Vec<&'a IndexedChunk> {
        let filter_industry = !crate::context::is_general(industry);
        self.chunks()
            .filter(|indexed| {
                let meta = &indexed.chunk.metadata;
                (!filter_industry || meta.industry.eq_ignore_ascii_case(industry))
                    && document_type
                        .map(|doc_type| meta.document_type.eq_ignore_ascii_case(doc_type))
                        .unwrap_or(true)
            })
            .collect()
    }

    fn insert(&mut self, document_id: String, chunks: Vec<IndexedChunk>) {
        self.touched.insert(document_id.clone(), self.generation);
        self.documents.insert(document_id, Arc::new(chunks));
    }

    fn remove(&mut self, document_id: &str) -> bool {
        let removed = self.documents.remove(document_id).is_some();
        if removed {
            self.touched.insert(document_id.to_string(), self.generation);
        }
        removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub average_chunk_terms: f64,
}

pub struct ChunkStore {
    vectorizer: Arc<dyn Vectorizer>,
    chunker: Chunker,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    writer: Mutex<()>,
    indexed: AtomicBool,
}

impl ChunkStore {
    pub fn new(vectorizer: Arc<dyn Vectorizer>, chunk_config: ChunkConfig) -> Self {
        Self {
            vectorizer,
            chunker: Chunker::new(chunk_config),
            snapshot: RwLock::new(Arc::new(IndexSnapshot::default())),
            writer: Mutex::new(()),
            indexed: AtomicBool::new(false),
        }
    }

    pub fn vectorizer(&self) -> &Arc<dyn Vectorizer> {
        &self.vectorizer
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.read().generation
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed.load(Ordering::Acquire)
    }

    pub fn mark_indexed(&self) {
        self.indexed.store(true, Ordering::Release);
    }

    pub fn prepare(&self, document: &DocumentRecord) -> Result<Vec<Chunk>> {
        self.chunker
            .chunk_document(document, self.vectorizer.as_ref())
            .map_err(|source| RetrievalError::Indexing {
                document_id: document.document_id.clone(),
                source,
            })
    }

    pub fn add_document(&self, document: &DocumentRecord) -> Result<Vec<Chunk>> {
        let chunks = self.prepare(document)?;
        let indexed: Vec<IndexedChunk> = chunks.iter().cloned().map(IndexedChunk::new).collect();
        self.publish(|next| next.insert(document.document_id.clone(), indexed));
        Ok(chunks)
    }

    pub fn load_persisted(&self, records: Vec<AnalysisRecord>) -> usize {
        let mut loaded: BTreeMap<String, Vec<IndexedChunk>> = BTreeMap::new();
        for record in records {
            if !record.is_document_embedding() {
                warn!(document_id = %record.document_id, analysis_type = %record.analysis_type, "skipping non-embedding record");
                continue;
            }
            let chunks: Vec<IndexedChunk> = record
                .results
                .into_iter()
                .enumerate()
                .map(|(idx, mut embedding)| {
                    let stats = embedding.term_stats.take();
                    let chunk = Chunk::from_record(&record.document_id, idx, embedding);
                    match stats {
                        Some(stats) => IndexedChunk::with_stats(chunk, stats),
                        None => IndexedChunk::new(chunk),
                    }
                })
                .collect();
            loaded.insert(record.document_id, chunks);
        }
        let count = loaded.len();
        self.publish(|next| {
            for (document_id, chunks) in loaded {
                next.insert(document_id, chunks);
            }
        });
        count
    }

    /// Swaps in a rebuilt corpus. Documents added or removed after `since`
    /// (a value of [`ChunkStore::generation`] taken before the build listed its
    /// documents) keep their current state instead of the rebuilt one.
    pub fn replace_all(&self, documents: BTreeMap<String, Vec<Chunk>>, since: u64) -> usize {
        let mut fresh: BTreeMap<String, Arc<Vec<IndexedChunk>>> = documents
            .into_iter()
            .map(|(id, chunks)| (id, Arc::new(chunks.into_iter().map(IndexedChunk::new).collect())))
            .collect();
        let mut preserved = 0;
        self.publish(|next| {
            for (document_id, generation) in &next.touched {
                if *generation <= since {
                    continue;
                }
                preserved += 1;
                match next.documents.get(document_id) {
                    Some(chunks) => {
                        fresh.insert(document_id.clone(), Arc::clone(chunks));
                    }
                    None => {
                        fresh.remove(document_id);
                    }
                }
            }
            next.documents = fresh;
        });
        if preserved > 0 {
            debug!(preserved, "kept documents changed during rebuild");
        }
        preserved
    }

    pub fn remove_document(&self, document_id: &str) -> bool {
        let mut removed = false;
        self.publish(|next| {
            removed = next.remove(document_id);
        });
        removed
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot();
        let chunks = snapshot.chunk_count();
        let terms: usize = snapshot.chunks().map(|c| c.term_count).sum();
        IndexStats {
            documents: snapshot.document_count(),
            chunks,
            average_chunk_terms: if chunks == 0 {
                0.0
            } else {
                terms as f64 / chunks as f64
            },
        }
    }

    // Copy-on-write: chunk lists are shared between snapshots, only the maps are cloned.
    fn publish(&self, update: impl FnOnce(&mut IndexSnapshot)) {
        let _guard = self.writer.lock();
        let mut next = (*self.snapshot()).clone();
        next.generation += 1;
        update(&mut next);
        debug!(
            documents = next.document_count(),
            generation = next.generation,
            "index snapshot published"
        );
        *self.snapshot.write() = Arc::new(next);
    }
}
