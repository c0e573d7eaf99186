use std::fs::{self, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;

use ragconf_index::{read_jsonl, AnalysisRecord, DocumentRecord, JsonlWriter};

pub trait DocumentSource: Send + Sync {
    fn list_documents(&self) -> Result<Vec<DocumentRecord>>;

    fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>>;

    fn embedding_records(&self) -> Result<Vec<AnalysisRecord>>;

    fn persist_embeddings(&self, _records: &[AnalysisRecord]) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySource {
    documents: RwLock<Vec<DocumentRecord>>,
    embeddings: RwLock<Vec<AnalysisRecord>>,
}

impl InMemorySource {
    pub fn new(documents: Vec<DocumentRecord>) -> Self {
        Self {
            documents: RwLock::new(documents),
            embeddings: RwLock::new(Vec::new()),
        }
    }

    pub fn push(&self, document: DocumentRecord) {
        self.documents.write().push(document);
    }
}

impl DocumentSource for InMemorySource {
    fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        Ok(self.documents.read().clone())
    }

    fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self
            .documents
            .read()
            .iter()
            .find(|doc| doc.document_id == document_id)
            .cloned())
    }

    fn embedding_records(&self) -> Result<Vec<AnalysisRecord>> {
        Ok(self.embeddings.read().clone())
    }

    fn persist_embeddings(&self, records: &[AnalysisRecord]) -> Result<()> {
        self.embeddings.write().extend_from_slice(records);
        Ok(())
    }
}

pub struct JsonlCorpus {
    root: PathBuf,
}

impl JsonlCorpus {
    pub const DOCUMENTS: &'static str = "documents.jsonl";
    pub const EMBEDDINGS: &'static str = "embeddings.jsonl";

    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create corpus dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn append_document(&self, document: &DocumentRecord) -> Result<()> {
        self.append(Self::DOCUMENTS, std::slice::from_ref(document))
    }

    pub fn clear_embeddings(&self) -> Result<()> {
        let path = self.root.join(Self::EMBEDDINGS);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    fn append<T: serde::Serialize>(&self, file: &str, records: &[T]) -> Result<()> {
        let path = self.root.join(file);
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut writer = JsonlWriter::new(BufWriter::new(handle));
        for record in records {
            writer.write_record(record)?;
        }
        writer.flush()
    }
}

impl DocumentSource for JsonlCorpus {
    fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        read_jsonl(&self.root.join(Self::DOCUMENTS))
    }

    fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self
            .list_documents()?
            .into_iter()
            .find(|doc| doc.document_id == document_id))
    }

    fn embedding_records(&self) -> Result<Vec<AnalysisRecord>> {
        read_jsonl(&self.root.join(Self::EMBEDDINGS))
    }

    fn persist_embeddings(&self, records: &[AnalysisRecord]) -> Result<()> {
        self.append(Self::EMBEDDINGS, records)
    }
}
