use crate::config::EmbeddingConfig;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Batch text embedding. Output order follows input order.
#[async_trait]
pub trait Embedder {
    fn dimensions(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;
}

pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

/// Hashed character-trigram vectors. Needs no model server.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

/// Client for a text-embeddings-inference style `/embed` endpoint.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, dimensions: usize) -> Result<Self, SearchError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(SearchError::Configuration(
                "embedding endpoint is empty".to_string(),
            ));
        }
        if dimensions == 0 {
            return Err(SearchError::Configuration(
                "embedding dimensions must be positive".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            endpoint,
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embed", self.endpoint))
            .json(&json!({ "inputs": texts, "truncate": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "embedder".to_string(),
                details: response.status().to_string(),
            });
        }

        let mut vectors: Vec<Vec<f32>> = response.json().await?;
        if vectors.len() != texts.len() {
            return Err(SearchError::BackendResponse {
                backend: "embedder".to_string(),
                details: format!("{} vectors for {} inputs", vectors.len(), texts.len()),
            });
        }

        for vector in &mut vectors {
            if vector.len() != self.dimensions {
                return Err(SearchError::BackendResponse {
                    backend: "embedder".to_string(),
                    details: format!(
                        "embedding dimension {} != {}",
                        vector.len(),
                        self.dimensions
                    ),
                });
            }
            l2_normalize(vector);
        }

        Ok(vectors)
    }
}

/// Embedder chosen from configuration.
pub enum EmbeddingBackend {
    Local(CharacterNgramEmbedder),
    Http(HttpEmbedder),
}

impl EmbeddingBackend {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, SearchError> {
        match &config.endpoint {
            Some(endpoint) => Ok(Self::Http(HttpEmbedder::new(endpoint, config.dimensions)?)),
            None => Ok(Self::Local(CharacterNgramEmbedder {
                dimensions: config.dimensions,
            })),
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingBackend {
    fn dimensions(&self) -> usize {
        match self {
            Self::Local(embedder) => embedder.dimensions(),
            Self::Http(embedder) => embedder.dimensions(),
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        match self {
            Self::Local(embedder) => embedder.embed(texts).await,
            Self::Http(embedder) => embedder.embed(texts).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_one("Derivative of a composite function");
        let second = embedder.embed_one("Derivative of a composite function");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed_one("abc");
        assert_eq!(vector.len(), 32);
    }

    #[tokio::test]
    async fn batch_embedding_keeps_input_order() {
        let embedder = CharacterNgramEmbedder::default();
        let texts = vec!["matrices".to_string(), "integrals".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embedder.embed_one("matrices"));
        assert_eq!(vectors[1], embedder.embed_one("integrals"));
    }

    #[test]
    fn normalized_vectors_have_unit_length() {
        let mut vector = vec![3.0, 4.0];
        l2_normalize(&mut vector);
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);

        let mut zeros = vec![0.0, 0.0];
        l2_normalize(&mut zeros);
        assert_eq!(zeros, vec![0.0, 0.0]);
    }

    #[test]
    fn http_embedder_requires_endpoint() {
        assert!(matches!(
            HttpEmbedder::new("", 768),
            Err(SearchError::Configuration(_))
        ));
    }
}
