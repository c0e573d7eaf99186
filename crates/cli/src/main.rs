mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ragconf_confidence::{
    CalibrationKey, ConfidenceEngine, DocumentContext, DocumentContextInput, ModelPrediction,
    StructureContext,
};
use ragconf_index::{read_jsonl, DocumentRecord};
use ragconf_rag::{
    build_summarizer, build_vectorizer, ChunkStore, DocumentSource, HybridRetriever,
    IndexBuilder, JsonlCorpus, RagContext,
};

use crate::config::{EngineConfig, DEFAULT_CONFIG};

#[derive(Parser, Debug)]
#[command(
    name = "ragconf",
    version,
    about = "Retrieval-augmented confidence scoring for document extraction"
)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build (or reload) the chunk index for a corpus directory
    Index {
        corpus: PathBuf,
        /// JSONL file of documents to append to the corpus before indexing
        #[arg(long)]
        add: Option<PathBuf>,
        /// Discard persisted embeddings and re-vectorize every document
        #[arg(long, action = ArgAction::SetTrue)]
        rebuild: bool,
    },
    /// Retrieve historical context for a query
    Query {
        corpus: PathBuf,
        query: String,
        #[arg(long, default_value = "general")]
        industry: String,
        #[arg(long = "document-type")]
        document_type: Option<String>,
        #[arg(long = "max-results")]
        max_results: Option<usize>,
    },
    /// Score model predictions for one document
    Score {
        /// JSON array of model predictions
        predictions: PathBuf,
        /// JSON document context ({industry, documentType, textQuality, processingComplexity})
        #[arg(long)]
        context: PathBuf,
        /// Optional JSON structure analysis ({structureScore, patternMatch, adaptiveScore})
        #[arg(long)]
        structure: Option<PathBuf>,
        /// Corpus directory used for historical context
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Retrieval query; required with --corpus
        #[arg(long)]
        query: Option<String>,
    },
    /// Record an observed extraction accuracy for calibration
    Feedback {
        #[arg(long)]
        industry: String,
        #[arg(long = "document-type")]
        document_type: String,
        #[arg(long)]
        predicted: f64,
        #[arg(long)]
        actual: f64,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = EngineConfig::load(&config_path)?;

    match cli.command {
        Commands::Index {
            corpus,
            add,
            rebuild,
        } => run_index(&config, &corpus, add.as_deref(), rebuild),
        Commands::Query {
            corpus,
            query,
            industry,
            document_type,
            max_results,
        } => {
            let retriever = open_retriever(&config, &corpus)?;
            let max_results = max_results.unwrap_or(config.rag.retrieval.default_max_results);
            let context =
                retriever.retrieve(&query, &industry, document_type.as_deref(), max_results);
            print_json(&context)
        }
        Commands::Score {
            predictions,
            context,
            structure,
            corpus,
            query,
        } => run_score(
            &config,
            &predictions,
            &context,
            structure.as_deref(),
            corpus.as_deref(),
            query.as_deref(),
        ),
        Commands::Feedback {
            industry,
            document_type,
            predicted,
            actual,
        } => run_feedback(&config, &industry, &document_type, predicted, actual),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_store(config: &EngineConfig) -> Result<Arc<ChunkStore>> {
    let vectorizer = build_vectorizer(&config.rag.embedding)?;
    Ok(Arc::new(ChunkStore::new(
        vectorizer,
        config.rag.chunking.chunk_config(),
    )))
}

fn open_retriever(config: &EngineConfig, corpus: &Path) -> Result<HybridRetriever> {
    let source = JsonlCorpus::open(corpus)?;
    let summarizer = build_summarizer(&config.rag.summarizer)?;
    Ok(
        HybridRetriever::new(open_store(config)?, config.rag.retrieval.clone())
            .with_source(
                Arc::new(source),
                IndexBuilder::new(config.rag.chunking.persist_text_limit),
            )
            .with_summarizer(summarizer),
    )
}

fn run_index(config: &EngineConfig, corpus: &Path, add: Option<&Path>, rebuild: bool) -> Result<()> {
    let source = JsonlCorpus::open(corpus)?;
    let mut stale = rebuild;
    if let Some(path) = add {
        let documents: Vec<DocumentRecord> = read_jsonl(path)?;
        for document in &documents {
            source.append_document(document)?;
        }
        info!(added = documents.len(), "documents appended to corpus");
        stale |= !documents.is_empty();
    }
    if stale {
        source.clear_embeddings()?;
    }

    let store = open_store(config)?;
    let builder = IndexBuilder::new(config.rag.chunking.persist_text_limit);
    let report = builder.build(&store, &source)?;
    for document_id in &report.skipped {
        warn!(document_id = %document_id, "document was not indexed");
    }
    let stats = store.stats();
    print_json(&serde_json::json!({
        "corpus": source.root(),
        "documentsInCorpus": source.list_documents()?.len(),
        "loaded": report.loaded,
        "rebuilt": report.rebuilt,
        "skipped": report.skipped,
        "documents": stats.documents,
        "chunks": stats.chunks,
        "averageChunkTerms": stats.average_chunk_terms,
    }))
}

fn run_score(
    config: &EngineConfig,
    predictions: &Path,
    context: &Path,
    structure: Option<&Path>,
    corpus: Option<&Path>,
    query: Option<&str>,
) -> Result<()> {
    let predictions: Vec<ModelPrediction> = read_json(predictions)?;
    let input: DocumentContextInput = read_json(context)?;
    let context = DocumentContext::try_from(input)?;
    let structure: Option<StructureContext> = structure.map(read_json::<StructureContext>).transpose()?;

    let rag: Option<RagContext> = match (corpus, query) {
        (Some(corpus), Some(query)) => {
            let retriever = open_retriever(config, corpus)?;
            Some(retriever.retrieve(
                query,
                &context.industry,
                Some(context.document_type.as_str()),
                config.rag.retrieval.default_max_results,
            ))
        }
        (Some(_), None) => bail!("--corpus requires --query"),
        (None, Some(_)) => bail!("--query requires --corpus"),
        (None, None) => None,
    };

    let engine = ConfidenceEngine::from_settings(&config.calibration)?;
    let report =
        engine.compute_confidence(&predictions, &context, rag.as_ref(), structure.as_ref());
    print_json(&report)
}

fn run_feedback(
    config: &EngineConfig,
    industry: &str,
    document_type: &str,
    predicted: f64,
    actual: f64,
) -> Result<()> {
    if config.calibration.state_path.is_none() {
        bail!("calibration.state_path is not configured; set it in the config or RAGCONF_CALIBRATION_STATE");
    }
    let engine = ConfidenceEngine::from_settings(&config.calibration)?;
    let context = DocumentContext::new(industry, document_type);
    engine.record_outcome(&context, predicted, actual)?;
    engine.save_state(&config.calibration)?;

    let key = CalibrationKey::new(industry, document_type);
    print_json(&serde_json::json!({
        "key": key.to_string(),
        "bins": engine.calibrator().bins(&key),
        "metrics": engine.calibrator().metrics(&key),
        "pattern": engine.patterns().get(&key),
    }))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
