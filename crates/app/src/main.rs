use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use textbook_search_core::{
    index_chunks, ingest_path_best_effort, Docstore, ElasticStore, Embedder, EmbeddingBackend,
    EmbeddingConfig, IngestionOptions, LexicalStoreConfig, PipelineConfig, QdrantStore,
    RerankBackend, RerankerConfig, RetrievalLimits, RetrievalOrchestrator, SearchQuery,
    VectorStoreConfig,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "textbook-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Elasticsearch/OpenSearch base URL
    #[arg(long, env = "ELASTIC_URL", default_value = "http://localhost:9200")]
    elastic_url: String,

    /// Elasticsearch API key
    #[arg(long, env = "ELASTIC_API_KEY")]
    elastic_api_key: Option<String>,

    /// Lexical index name
    #[arg(long, env = "ELASTIC_INDEX", default_value = "maths_chunks")]
    elastic_index: String,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "maths_chunks")]
    qdrant_collection: String,

    /// Embedding server base URL; local n-gram embeddings when unset
    #[arg(long, env = "EMBEDDING_ENDPOINT")]
    embedding_endpoint: Option<String>,

    /// Embedding model served at the endpoint
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "BAAI/bge-base-en-v1.5")]
    embedding_model: String,

    /// Embedding vector size
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value = "128")]
    embedding_dimensions: usize,

    /// Chunks embedded per request during ingest
    #[arg(long, env = "BATCH_SIZE", default_value = "32")]
    batch_size: usize,

    /// Cross-encoder server base URL; term-overlap scoring when unset
    #[arg(long, env = "RERANKER_ENDPOINT")]
    reranker_endpoint: Option<String>,

    /// Cross-encoder model served at the endpoint
    #[arg(
        long,
        env = "RERANKER_MODEL",
        default_value = "cross-encoder/ms-marco-MiniLM-L-6-v2"
    )]
    reranker_model: String,

    /// JSON file mapping chunk ids to text and metadata
    #[arg(long, env = "DOCSTORE_PATH", default_value = "docstore.json")]
    docstore_path: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Parse, chunk, embed and index a PDF or a folder of PDFs.
    Ingest {
        /// PDF file, or folder searched recursively.
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value = "maths")]
        subject: String,
        #[arg(long, default_value = "12")]
        class_level: u32,
        /// Words per chunk window.
        #[arg(long, default_value = "700")]
        max_tokens: usize,
        /// Words shared by consecutive windows.
        #[arg(long, default_value = "120")]
        overlap: usize,
    },
    /// Hybrid search with reranking; prints JSON results.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "maths")]
        subject: String,
        /// Restrict lexical hits to a chapter.
        #[arg(long)]
        chapter: Option<u32>,
        /// Restrict lexical hits to a section label, e.g. 1.2
        #[arg(long)]
        section: Option<String>,
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
}

impl Cli {
    fn pipeline_config(&self, ingestion: IngestionOptions) -> PipelineConfig {
        PipelineConfig {
            lexical: LexicalStoreConfig {
                url: self.elastic_url.clone(),
                api_key: self.elastic_api_key.clone(),
                index: self.elastic_index.clone(),
            },
            vector: VectorStoreConfig {
                url: self.qdrant_url.clone(),
                collection: self.qdrant_collection.clone(),
            },
            embedding: EmbeddingConfig {
                endpoint: non_blank(&self.embedding_endpoint),
                model: self.embedding_model.clone(),
                dimensions: self.embedding_dimensions,
                batch_size: self.batch_size,
            },
            reranker: RerankerConfig {
                endpoint: non_blank(&self.reranker_endpoint),
                model: self.reranker_model.clone(),
            },
            docstore_path: self.docstore_path.clone(),
            retrieval: RetrievalLimits::default(),
            ingestion,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let ingestion = match &cli.command {
        Command::Ingest {
            subject,
            class_level,
            max_tokens,
            overlap,
            ..
        } => IngestionOptions {
            subject: subject.clone(),
            class_level: *class_level,
            chunk_max_tokens: *max_tokens,
            chunk_overlap_tokens: *overlap,
        },
        Command::Search { .. } => IngestionOptions::default(),
    };
    let config = cli.pipeline_config(ingestion);
    config.validate()?;

    let embedder = EmbeddingBackend::from_config(&config.embedding)?;
    let lexical = ElasticStore::new(&config.lexical)?;
    let vector = QdrantStore::new(&config.vector, embedder.dimensions())?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        embedding_model = %config.embedding.model,
        reranker_model = %config.reranker.model,
        "textbook-search boot"
    );

    match cli.command {
        Command::Ingest { path, .. } => {
            ingest(&config, &path, &lexical, &vector, &embedder).await?;
        }
        Command::Search {
            query,
            subject,
            chapter,
            section,
            top_k,
        } => {
            let reranker = RerankBackend::from_config(&config.reranker)?;
            let orchestrator = RetrievalOrchestrator::new(lexical, vector, embedder, reranker)
                .with_limits(config.retrieval);

            let request = SearchQuery {
                query,
                subject,
                chapter,
                section,
                top_k,
            };
            let results = orchestrator.search(&request).await?;

            info!(query = %request.query, hits = results.len(), "search complete");
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "results": results }))?
            );
        }
    }

    Ok(())
}

async fn ingest(
    config: &PipelineConfig,
    path: &Path,
    lexical: &ElasticStore,
    vector: &QdrantStore,
    embedder: &EmbeddingBackend,
) -> anyhow::Result<()> {
    info!(path = %path.display(), "parsing pdfs");
    let report = ingest_path_best_effort(path, &config.ingestion)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if !report.skipped_files.is_empty() {
        warn!(
            "skipped_files={} for path={}",
            report.skipped_files.len(),
            path.display()
        );
        for skipped in &report.skipped_files {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
        }
    }

    let chunks = report.chunks;
    info!(
        blocks = report.block_count,
        chunk_count = chunks.len(),
        "parsed and chunked"
    );

    if chunks.is_empty() {
        println!("0 chunks ingested (all files were skipped)");
        return Ok(());
    }

    lexical.ensure_index().await?;
    vector.ensure_collection().await?;
    index_chunks(&chunks, lexical, vector, embedder, config.embedding.batch_size).await?;

    let mut docstore = Docstore::load(&config.docstore_path)?;
    docstore.insert_chunks(&chunks)?;
    docstore
        .save(&config.docstore_path)
        .with_context(|| format!("failed to write {}", config.docstore_path.display()))?;

    println!(
        "{} chunks from {} blocks ingested at {}",
        chunks.len(),
        report.block_count,
        Utc::now().to_rfc3339()
    );
    Ok(())
}
