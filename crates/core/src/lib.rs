pub mod chunking;
pub mod config;
pub mod docstore;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod rerank;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_blocks, ChunkingConfig};
pub use config::{
    EmbeddingConfig, LexicalStoreConfig, PipelineConfig, RerankerConfig, VectorStoreConfig,
};
pub use docstore::{Docstore, DocstoreEntry};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbeddingBackend, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{Collaborator, IngestError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{
    chunk_pdf, discover_pdf_files, index_chunks, ingest_path_best_effort, IngestionReport,
    SkippedPdf,
};
pub use models::{
    new_doc_id, Block, BlockKind, Candidate, Chunk, ChunkMeta, DocId, IngestionOptions,
    LexicalHit, QueryFilters, RetrievalLimits, SearchQuery, StoredDocument, VectorHit, NO_MATCH,
};
pub use orchestrator::{fuse_candidate_ids, RetrievalOrchestrator};
pub use parser::{parse_pages, parse_pdf, Heading, StructuralParser};
pub use rerank::{rerank, HttpReranker, RerankBackend, Reranker, TermOverlapReranker};
pub use stores::{ElasticStore, QdrantStore};
pub use traits::{LexicalIndex, VectorIndex};
