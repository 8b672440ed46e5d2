use crate::config::LexicalStoreConfig;
use crate::models::{Chunk, DocId, LexicalHit, QueryFilters, StoredDocument};
use crate::traits::LexicalIndex;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Elasticsearch/OpenSearch index holding chunk text and metadata.
pub struct ElasticStore {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
    api_key: Option<String>,
}

impl ElasticStore {
    pub fn new(config: &LexicalStoreConfig) -> Result<Self, SearchError> {
        let endpoint = config.url.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(SearchError::Configuration(
                "lexical store url is not set".to_string(),
            ));
        }
        if config.index.trim().is_empty() {
            return Err(SearchError::Configuration(
                "lexical index name is not set".to_string(),
            ));
        }

        Ok(Self {
            client: Arc::new(Client::new()),
            endpoint,
            index_name: config.index.trim().to_string(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}/{}", self.endpoint, path));
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("ApiKey {key}")),
            None => request,
        }
    }

    pub async fn ensure_index(&self) -> Result<(), SearchError> {
        let response = self.request(Method::HEAD, &self.index_name).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::BackendResponse {
                backend: "elastic".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .request(Method::PUT, &self.index_name)
            .json(&json!({
                "mappings": {
                    "properties": {
                        "text": {"type": "text"},
                        "block_id": {"type": "keyword"},
                        "subject": {"type": "keyword"},
                        "class": {"type": "integer"},
                        "chapter": {"type": "integer"},
                        "section": {"type": "keyword"},
                        "type": {"type": "keyword"},
                        "sequence": {"type": "long"},
                        "page": {"type": "integer"},
                        "chunk_start_word": {"type": "integer"}
                    }
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Request(format!(
                "elastic index setup failed with {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl LexicalIndex for ElasticStore {
    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<(), SearchError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut lines = Vec::with_capacity(chunks.len() * 2);
        for chunk in chunks {
            lines.push(serde_json::to_string(&json!({
                "index": {
                    "_index": self.index_name,
                    "_id": chunk.id.to_string(),
                }
            }))?);
            lines.push(serde_json::to_string(&chunk.to_source()?)?);
        }
        let payload = lines.join("\n") + "\n";

        let response = self
            .request(Method::POST, "_bulk?refresh=true")
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elastic".to_string(),
                details: response.status().to_string(),
            });
        }

        let summary: Value = response.json().await?;
        if summary.get("errors").and_then(Value::as_bool).unwrap_or(false) {
            return Err(SearchError::BackendResponse {
                backend: "elastic".to_string(),
                details: "bulk request reported item failures".to_string(),
            });
        }

        Ok(())
    }

    async fn search_lexical(
        &self,
        query: &str,
        k: usize,
        filters: &QueryFilters,
    ) -> Result<Vec<LexicalHit>, SearchError> {
        let body = json!({
            "size": k,
            "query": {
                "bool": {
                    "must": [
                        {"match": {"text": {"query": query}}}
                    ],
                    "filter": build_filters(filters)
                }
            }
        });

        let response = self
            .request(Method::POST, &format!("{}/_search", self.index_name))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elastic".to_string(),
                details: response.status().to_string(),
            });
        }

        let response_json: Value = response.json().await?;
        Ok(parse_search_hits(&response_json))
    }

    async fn fetch_documents(&self, ids: &[DocId]) -> Result<Vec<StoredDocument>, SearchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ids.iter().map(DocId::to_string).collect();
        let response = self
            .request(Method::POST, &format!("{}/_mget", self.index_name))
            .json(&json!({ "ids": ids }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elastic".to_string(),
                details: response.status().to_string(),
            });
        }

        let response_json: Value = response.json().await?;
        Ok(parse_found_documents(&response_json))
    }
}

fn build_filters(filters: &QueryFilters) -> Vec<Value> {
    let mut predicates = Vec::new();

    if let Some(chapter) = filters.chapter {
        predicates.push(json!({"term": {"chapter": chapter}}));
    }
    if let Some(section) = &filters.section {
        predicates.push(json!({"term": {"section": section}}));
    }

    predicates
}

fn parse_doc_id(raw: &Value) -> Option<DocId> {
    raw.pointer("/_id")
        .and_then(Value::as_str)
        .and_then(|id| id.parse().ok())
}

fn source_of(raw: &Value) -> Map<String, Value> {
    raw.pointer("/_source")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn parse_search_hits(response: &Value) -> Vec<LexicalHit> {
    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    hits.iter()
        .filter_map(|raw| {
            let Some(id) = parse_doc_id(raw) else {
                let raw_id = raw.pointer("/_id").cloned().unwrap_or_default();
                warn!(hit = %raw_id, "skipping lexical hit with a non-numeric id");
                return None;
            };
            Some(LexicalHit {
                id,
                score: raw.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0),
                source: source_of(raw),
            })
        })
        .collect()
}

fn parse_found_documents(response: &Value) -> Vec<StoredDocument> {
    let docs = response
        .pointer("/docs")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    docs.iter()
        .filter(|raw| raw.get("found").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|raw| {
            Some(StoredDocument {
                id: parse_doc_id(raw)?,
                source: source_of(raw),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_only_include_requested_fields() {
        assert!(build_filters(&QueryFilters::default()).is_empty());

        let filters = QueryFilters {
            chapter: Some(2),
            section: Some("2.3".to_string()),
        };
        assert_eq!(
            build_filters(&filters),
            vec![
                json!({"term": {"chapter": 2}}),
                json!({"term": {"section": "2.3"}}),
            ]
        );
    }

    #[test]
    fn search_hits_keep_rank_order() {
        let response = json!({
            "hits": {"hits": [
                {"_id": "30", "_score": 7.5, "_source": {"text": "first"}},
                {"_id": "not-a-number", "_score": 6.0, "_source": {"text": "bad"}},
                {"_id": "10", "_score": 3.2, "_source": {"text": "second", "chapter": 1}}
            ]}
        });

        let hits = parse_search_hits(&response);
        let ids: Vec<DocId> = hits.iter().map(|hit| hit.id).collect();
        assert_eq!(ids, vec![30, 10]);
        assert_eq!(hits[1].source["chapter"], 1);
    }

    #[test]
    fn mget_drops_missing_documents() {
        let response = json!({
            "docs": [
                {"_id": "1", "found": true, "_source": {"text": "kept"}},
                {"_id": "2", "found": false},
                {"_id": "3", "found": true, "_source": {"text": "also kept"}}
            ]
        });

        let documents = parse_found_documents(&response);
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].text(), "kept");
        assert_eq!(documents[1].id, 3);
    }

    #[test]
    fn store_requires_an_endpoint() {
        let config = LexicalStoreConfig {
            url: " ".to_string(),
            api_key: None,
            index: "maths_chunks".to_string(),
        };
        assert!(matches!(
            ElasticStore::new(&config),
            Err(SearchError::Configuration(_))
        ));
    }
}
