use crate::models::{Chunk, DocId, LexicalHit, QueryFilters, StoredDocument, VectorHit};
use crate::SearchError;
use async_trait::async_trait;

/// Full-text store. It is also the authoritative source of chunk documents.
#[async_trait]
pub trait LexicalIndex {
    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<(), SearchError>;

    async fn search_lexical(
        &self,
        query: &str,
        k: usize,
        filters: &QueryFilters,
    ) -> Result<Vec<LexicalHit>, SearchError>;

    /// Ids that no longer resolve are omitted from the result.
    async fn fetch_documents(&self, ids: &[DocId]) -> Result<Vec<StoredDocument>, SearchError>;
}

/// Nearest-neighbour index holding only ids and vectors.
#[async_trait]
pub trait VectorIndex {
    async fn index_vectors(&self, ids: &[DocId], vectors: &[Vec<f32>]) -> Result<(), SearchError>;

    /// Hits in rank order. Empty slots may be reported with [`crate::NO_MATCH`].
    async fn search_vector(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>, SearchError>;
}
