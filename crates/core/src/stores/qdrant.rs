use crate::config::VectorStoreConfig;
use crate::models::{DocId, VectorHit, NO_MATCH};
use crate::traits::VectorIndex;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(config: &VectorStoreConfig, vector_size: usize) -> Result<Self, SearchError> {
        let endpoint = config.url.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(SearchError::Configuration(
                "vector store url is not set".to_string(),
            ));
        }
        if config.collection.trim().is_empty() {
            return Err(SearchError::Configuration(
                "vector collection is not set".to_string(),
            ));
        }

        Ok(Self {
            endpoint,
            collection: config.collection.trim().to_string(),
            client: Client::new(),
            vector_size,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    /// Creates the cosine collection when it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), SearchError> {
        let response = self.client.get(self.collection_url()).send().await?;

        if response.status().is_success() {
            let info: Value = response.json().await?;
            let existing = info
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64);
            return match existing {
                Some(size) if size as usize != self.vector_size => Err(SearchError::Request(format!(
                    "collection {} stores {} dimensional vectors, embedder produces {}",
                    self.collection, size, self.vector_size
                ))),
                _ => Ok(()),
            };
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine"
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), SearchError> {
        if vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "vector dimension {} != {}",
                vector.len(),
                self.vector_size
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn index_vectors(&self, ids: &[DocId], vectors: &[Vec<f32>]) -> Result<(), SearchError> {
        if ids.len() != vectors.len() {
            return Err(SearchError::Request(format!(
                "vector count {} doesn't match id count {}",
                vectors.len(),
                ids.len()
            )));
        }

        let points = ids
            .iter()
            .zip(vectors.iter())
            .map(|(id, vector)| {
                self.check_dimension(vector)?;
                let id = u64::try_from(*id).map_err(|_| {
                    SearchError::Request(format!("negative point id {id} cannot be indexed"))
                })?;
                Ok(json!({ "id": id, "vector": vector }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn search_vector(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>, SearchError> {
        self.check_dimension(vector)?;

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": vector,
                "limit": k,
                "with_payload": false,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parse_points(&parsed))
    }
}

/// Points whose id is not an integer in range are reported as [`NO_MATCH`].
fn parse_points(response: &Value) -> Vec<VectorHit> {
    let hits = response
        .pointer("/result")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    hits.iter()
        .map(|hit| VectorHit {
            id: hit
                .pointer("/id")
                .and_then(Value::as_u64)
                .and_then(|id| DocId::try_from(id).ok())
                .unwrap_or(NO_MATCH),
            score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> QdrantStore {
        let config = VectorStoreConfig {
            url: "http://localhost:6333/".to_string(),
            collection: "maths_chunks".to_string(),
        };
        QdrantStore::new(&config, 4).expect("valid config")
    }

    #[test]
    fn search_results_keep_rank_order_and_flag_unusable_ids() {
        let response = json!({
            "result": [
                {"id": 12, "score": 0.93},
                {"id": "4b7c0d1e-uuid", "score": 0.80},
                {"id": 7, "score": 0.51}
            ]
        });

        let hits = parse_points(&response);
        let ids: Vec<DocId> = hits.iter().map(|hit| hit.id).collect();
        assert_eq!(ids, vec![12, NO_MATCH, 7]);
    }

    #[test]
    fn collection_url_has_no_double_slash() {
        assert_eq!(
            store().collection_url(),
            "http://localhost:6333/collections/maths_chunks"
        );
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        assert!(store().check_dimension(&[0.1, 0.2]).is_err());
        assert!(store().check_dimension(&[0.1, 0.2, 0.3, 0.4]).is_ok());
    }
}
