use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
use crate::models::{IngestionOptions, RetrievalLimits};
use crate::SearchError;
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone)]
pub struct LexicalStoreConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub index: String,
}

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Local n-gram embeddings are used when no endpoint is set.
    pub endpoint: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "BAAI/bge-base-en-v1.5".to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Term-overlap scoring is used when no endpoint is set.
    pub endpoint: Option<String>,
    pub model: String,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
        }
    }
}

/// Everything one ingest or query pipeline needs, passed explicitly to
/// constructors so independently configured pipelines can share a process.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub lexical: LexicalStoreConfig,
    pub vector: VectorStoreConfig,
    pub embedding: EmbeddingConfig,
    pub reranker: RerankerConfig,
    pub docstore_path: PathBuf,
    pub retrieval: RetrievalLimits,
    pub ingestion: IngestionOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lexical: LexicalStoreConfig {
                url: "http://localhost:9200".to_string(),
                api_key: None,
                index: "maths_chunks".to_string(),
            },
            vector: VectorStoreConfig {
                url: "http://localhost:6333".to_string(),
                collection: "maths_chunks".to_string(),
            },
            embedding: EmbeddingConfig::default(),
            reranker: RerankerConfig::default(),
            docstore_path: PathBuf::from("docstore.json"),
            retrieval: RetrievalLimits::default(),
            ingestion: IngestionOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        require_url("lexical store url", &self.lexical.url)?;
        require_name("lexical index", &self.lexical.index)?;
        require_url("vector store url", &self.vector.url)?;
        require_name("vector collection", &self.vector.collection)?;

        if let Some(endpoint) = &self.embedding.endpoint {
            require_url("embedding endpoint", endpoint)?;
        }
        if let Some(endpoint) = &self.reranker.endpoint {
            require_url("reranker endpoint", endpoint)?;
        }
        if self.embedding.dimensions == 0 {
            return Err(SearchError::Configuration(
                "embedding dimensions must be positive".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(SearchError::Configuration(
                "embedding batch size must be positive".to_string(),
            ));
        }
        if self.retrieval.max_candidates == 0 {
            return Err(SearchError::Configuration(
                "candidate pool size must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn require_url(name: &str, value: &str) -> Result<Url, SearchError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SearchError::Configuration(format!("{name} is not set")));
    }
    Url::parse(trimmed)
        .map_err(|error| SearchError::Configuration(format!("{name} `{trimmed}`: {error}")))
}

fn require_name(name: &str, value: &str) -> Result<(), SearchError> {
    if value.trim().is_empty() {
        return Err(SearchError::Configuration(format!("{name} is not set")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_lexical_url_is_a_configuration_error() {
        let mut config = PipelineConfig::default();
        config.lexical.url = String::new();
        assert!(matches!(
            config.validate(),
            Err(SearchError::Configuration(message)) if message.contains("lexical store url")
        ));
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let mut config = PipelineConfig::default();
        config.reranker.endpoint = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(SearchError::Configuration(_))));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = PipelineConfig::default();
        config.embedding.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
