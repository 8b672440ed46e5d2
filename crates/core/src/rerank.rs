use crate::config::RerankerConfig;
use crate::models::Candidate;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

/// Pairwise relevance scoring of `(query, text)`; higher is more relevant.
#[async_trait]
pub trait Reranker {
    /// One score per text, in input order.
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, SearchError>;
}

/// Scores every candidate, then stable-sorts by descending score so equal
/// scores keep their incoming order.
pub async fn rerank<R>(
    reranker: &R,
    query: &str,
    mut candidates: Vec<Candidate>,
) -> Result<Vec<Candidate>, SearchError>
where
    R: Reranker + ?Sized + Sync,
{
    if candidates.is_empty() {
        return Ok(candidates);
    }

    let texts: Vec<&str> = candidates.iter().map(|candidate| candidate.text.as_str()).collect();
    let scores = reranker.score(query, &texts).await?;
    if scores.len() != candidates.len() {
        return Err(SearchError::BackendResponse {
            backend: "reranker".to_string(),
            details: format!("{} scores for {} candidates", scores.len(), candidates.len()),
        });
    }

    for (candidate, score) in candidates.iter_mut().zip(scores) {
        candidate.score_rerank = Some(score);
    }
    candidates.sort_by(|left, right| {
        sort_key(right.score_rerank).total_cmp(&sort_key(left.score_rerank))
    });

    Ok(candidates)
}

/// Missing and NaN scores rank last.
fn sort_key(score: Option<f32>) -> f32 {
    match score {
        Some(score) if !score.is_nan() => score,
        _ => f32::NEG_INFINITY,
    }
}

/// Fraction of distinct query terms present in the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapReranker;

impl TermOverlapReranker {
    fn query_terms(query: &str) -> HashSet<String> {
        query
            .split_whitespace()
            .map(|token| token.to_lowercase())
            .filter(|token| token.len() > 2)
            .collect()
    }
}

#[async_trait]
impl Reranker for TermOverlapReranker {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, SearchError> {
        let terms = Self::query_terms(query);
        if terms.is_empty() {
            return Ok(vec![0.0; texts.len()]);
        }

        Ok(texts
            .iter()
            .map(|text| {
                let lowered = text.to_lowercase();
                let found = terms.iter().filter(|term| lowered.contains(term.as_str())).count();
                found as f32 / terms.len() as f32
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct RankedText {
    index: usize,
    score: f32,
}

/// Client for a cross-encoder served behind a text-embeddings-inference style
/// `/rerank` endpoint.
pub struct HttpReranker {
    client: Client,
    endpoint: String,
}

impl HttpReranker {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SearchError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(SearchError::Configuration(
                "reranker endpoint is empty".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/rerank", self.endpoint))
            .json(&json!({ "query": query, "texts": texts, "truncate": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "reranker".to_string(),
                details: response.status().to_string(),
            });
        }

        let ranked: Vec<RankedText> = response.json().await?;
        scores_in_input_order(ranked, texts.len())
    }
}

fn scores_in_input_order(ranked: Vec<RankedText>, expected: usize) -> Result<Vec<f32>, SearchError> {
    let mut scores = vec![None; expected];
    for item in ranked {
        let slot = scores.get_mut(item.index).ok_or_else(|| SearchError::BackendResponse {
            backend: "reranker".to_string(),
            details: format!("score index {} out of range", item.index),
        })?;
        *slot = Some(item.score);
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(index, score)| {
            score.ok_or_else(|| SearchError::BackendResponse {
                backend: "reranker".to_string(),
                details: format!("missing score for text {index}"),
            })
        })
        .collect()
}

/// Reranker chosen from configuration.
pub enum RerankBackend {
    TermOverlap(TermOverlapReranker),
    Http(HttpReranker),
}

impl RerankBackend {
    pub fn from_config(config: &RerankerConfig) -> Result<Self, SearchError> {
        match &config.endpoint {
            Some(endpoint) => Ok(Self::Http(HttpReranker::new(endpoint)?)),
            None => Ok(Self::TermOverlap(TermOverlapReranker)),
        }
    }
}

#[async_trait]
impl Reranker for RerankBackend {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, SearchError> {
        match self {
            Self::TermOverlap(reranker) => reranker.score(query, texts).await,
            Self::Http(reranker) => reranker.score(query, texts).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    struct FixedScores(Vec<f32>);

    #[async_trait]
    impl Reranker for FixedScores {
        async fn score(&self, _query: &str, _texts: &[&str]) -> Result<Vec<f32>, SearchError> {
            Ok(self.0.clone())
        }
    }

    fn candidate(id: i64) -> Candidate {
        Candidate {
            id,
            text: format!("text {id}"),
            meta: Map::new(),
            score_rerank: None,
        }
    }

    #[tokio::test]
    async fn candidates_are_sorted_by_descending_score() {
        let candidates = vec![candidate(1), candidate(2), candidate(3)];
        let ranked = rerank(&FixedScores(vec![0.2, 0.9, 0.5]), "q", candidates)
            .await
            .unwrap();

        let scores: Vec<f32> = ranked.iter().filter_map(|c| c.score_rerank).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
        let ids: Vec<i64> = ranked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn equal_scores_keep_incoming_order() {
        let candidates = vec![candidate(7), candidate(3), candidate(5), candidate(1)];
        let ranked = rerank(&FixedScores(vec![0.4, 0.8, 0.4, 0.8]), "q", candidates)
            .await
            .unwrap();

        let ids: Vec<i64> = ranked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 1, 7, 5]);
    }

    #[tokio::test]
    async fn nan_scores_rank_last() {
        let candidates = vec![candidate(1), candidate(2), candidate(3)];
        let ranked = rerank(&FixedScores(vec![f32::NAN, 0.9, -2.0]), "q", candidates)
            .await
            .unwrap();

        let ids: Vec<i64> = ranked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn score_count_mismatch_is_an_error() {
        let result = rerank(&FixedScores(vec![0.1]), "q", vec![candidate(1), candidate(2)]).await;
        assert!(matches!(result, Err(SearchError::BackendResponse { .. })));
    }

    #[tokio::test]
    async fn term_overlap_counts_distinct_terms() {
        let scores = TermOverlapReranker
            .score(
                "inverse of a matrix",
                &["The inverse of a square matrix", "matrix addition", "nothing"],
            )
            .await
            .unwrap();

        assert_eq!(scores, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn remote_scores_are_restored_to_input_order() {
        let ranked = vec![
            RankedText { index: 2, score: 0.9 },
            RankedText { index: 0, score: 0.4 },
            RankedText { index: 1, score: 0.1 },
        ];
        assert_eq!(scores_in_input_order(ranked, 3).unwrap(), vec![0.4, 0.1, 0.9]);

        let partial = vec![RankedText { index: 0, score: 0.4 }];
        assert!(scores_in_input_order(partial, 2).is_err());
    }
}
