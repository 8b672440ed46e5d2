use crate::embeddings::Embedder;
use crate::error::Collaborator;
use crate::models::{
    Candidate, DocId, QueryFilters, RetrievalLimits, SearchQuery, StoredDocument, NO_MATCH,
};
use crate::rerank::{rerank, Reranker};
use crate::traits::{LexicalIndex, VectorIndex};
use crate::SearchError;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Hybrid retrieval: lexical and vector candidates are fused by rank order,
/// resolved against the lexical store and reranked by a cross-encoder.
pub struct RetrievalOrchestrator<L, V, E, R>
where
    L: LexicalIndex,
    V: VectorIndex,
    E: Embedder,
    R: Reranker,
{
    lexical: L,
    vector: V,
    embedder: E,
    reranker: R,
    limits: RetrievalLimits,
}

impl<L, V, E, R> RetrievalOrchestrator<L, V, E, R>
where
    L: LexicalIndex + Send + Sync,
    V: VectorIndex + Send + Sync,
    E: Embedder + Send + Sync,
    R: Reranker + Send + Sync,
{
    pub fn new(lexical: L, vector: V, embedder: E, reranker: R) -> Self {
        Self {
            lexical,
            vector,
            embedder,
            reranker,
            limits: RetrievalLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: RetrievalLimits) -> Self {
        self.limits = limits;
        self
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SearchError> {
        if query.query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let filters = query.filters();
        let (lexical_ids, vector_ids) = tokio::try_join!(
            self.lexical_ids(&query.query, &filters),
            self.vector_ids(&query.query)
        )?;

        let fused = fuse_candidate_ids(&lexical_ids, &vector_ids, self.limits.max_candidates);
        if fused.is_empty() {
            debug!(query = %query.query, "no lexical or vector candidates");
            return Ok(Vec::new());
        }

        let documents = self
            .lexical
            .fetch_documents(&fused)
            .await
            .map_err(SearchError::from_collaborator(Collaborator::DocumentFetch))?;
        let candidates = in_fusion_order(&fused, documents);

        let mut ranked = rerank(&self.reranker, &query.query, candidates)
            .await
            .map_err(SearchError::from_collaborator(Collaborator::Reranker))?;
        ranked.truncate(query.top_k);

        Ok(ranked)
    }

    async fn lexical_ids(&self, query: &str, filters: &QueryFilters) -> Result<Vec<DocId>, SearchError> {
        let hits = self
            .lexical
            .search_lexical(query, self.limits.lexical_k, filters)
            .await
            .map_err(SearchError::from_collaborator(Collaborator::LexicalSearch))?;
        Ok(hits.into_iter().map(|hit| hit.id).collect())
    }

    async fn vector_ids(&self, query: &str) -> Result<Vec<DocId>, SearchError> {
        let vector = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(SearchError::from_collaborator(Collaborator::Embedder))?
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Collaborator {
                collaborator: Collaborator::Embedder,
                details: "no vector returned for the query".to_string(),
            })?;

        let hits = self
            .vector
            .search_vector(&vector, self.limits.vector_k)
            .await
            .map_err(SearchError::from_collaborator(Collaborator::VectorSearch))?;

        let total = hits.len();
        let ids: Vec<DocId> = hits
            .into_iter()
            .map(|hit| hit.id)
            .filter(|id| *id != NO_MATCH)
            .collect();
        if ids.len() < total {
            debug!(dropped = total - ids.len(), "vector search returned empty slots");
        }

        Ok(ids)
    }
}

/// Lexical ids first, then vector ids, keeping the first occurrence of each
/// id, capped at `limit`.
pub fn fuse_candidate_ids(lexical: &[DocId], vector: &[DocId], limit: usize) -> Vec<DocId> {
    let mut seen = HashSet::new();
    lexical
        .iter()
        .chain(vector.iter())
        .copied()
        .filter(|id| seen.insert(*id))
        .take(limit)
        .collect()
}

fn in_fusion_order(fused: &[DocId], documents: Vec<StoredDocument>) -> Vec<Candidate> {
    let mut by_id: HashMap<DocId, StoredDocument> = documents
        .into_iter()
        .map(|document| (document.id, document))
        .collect();

    let candidates: Vec<Candidate> = fused
        .iter()
        .filter_map(|id| by_id.remove(id))
        .map(Candidate::from)
        .collect();

    if candidates.len() < fused.len() {
        debug!(
            stale = fused.len() - candidates.len(),
            "candidate ids missing from the lexical store"
        );
    }

    candidates
}
