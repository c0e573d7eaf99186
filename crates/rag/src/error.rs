use thiserror::Error;

use ragconf_core::CoreError;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("indexing failed for {document_id}: {source}")]
    Indexing {
        document_id: String,
        #[source]
        source: CoreError,
    },
    #[error("index build failed: {0}")]
    IndexBuild(String),
    #[error("query vectorization failed: {0}")]
    QueryVector(#[source] CoreError),
    #[error("document source error: {0}")]
    Source(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

impl From<anyhow::Error> for RetrievalError {
    fn from(value: anyhow::Error) -> Self {
        Self::Source(value.to_string())
    }
}
