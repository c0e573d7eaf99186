use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DOCUMENT_EMBEDDING: &str = "document_embedding";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub document_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub extracted_text: String,
    pub industry: String,
    pub document_type: String,
    #[serde(default)]
    pub entity_types: BTreeSet<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            industry: self.industry.clone(),
            document_type: self.document_type.clone(),
            entity_types: self.entity_types.clone(),
            confidence: self.confidence,
            created_at: self.created_at,
        }
    }
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub industry: String,
    pub document_type: String,
    #[serde(default)]
    pub entity_types: BTreeSet<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    pub chunk_id: String,
    pub text_prefix: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
    /// Set only when `text_prefix` is shorter than the chunk it came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_stats: Option<TermStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermStats {
    pub term_count: usize,
    pub term_freqs: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub document_id: String,
    pub analysis_type: String,
    pub results: Vec<EmbeddingRecord>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn document_embedding(document_id: impl Into<String>, results: Vec<EmbeddingRecord>) -> Self {
        Self {
            document_id: document_id.into(),
            analysis_type: DOCUMENT_EMBEDDING.to_string(),
            results,
            created_at: Utc::now(),
        }
    }

    pub fn is_document_embedding(&self) -> bool {
        self.analysis_type == DOCUMENT_EMBEDDING
    }
}

pub struct JsonlWriter<W> {
    writer: W,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut buf = serde_json::to_vec(record)?;
        buf.push(b'\n');
        self.writer.write_all(&buf)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), idx + 1))?;
        out.push(record);
    }
    Ok(out)
}
