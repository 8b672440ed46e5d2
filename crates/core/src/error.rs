use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("indexing failed: {0}")]
    Index(#[from] SearchError),
}

/// External service the retrieval pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collaborator {
    Embedder,
    VectorSearch,
    LexicalSearch,
    DocumentFetch,
    Reranker,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embedder => "embedder",
            Self::VectorSearch => "vector search",
            Self::LexicalSearch => "lexical search",
            Self::DocumentFetch => "document fetch",
            Self::Reranker => "reranker",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("{collaborator} failed: {details}")]
    Collaborator {
        collaborator: Collaborator,
        details: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),
}

impl SearchError {
    /// Tags an adapter error with the collaborator call that produced it.
    pub fn from_collaborator(collaborator: Collaborator) -> impl FnOnce(SearchError) -> SearchError {
        move |error| match error {
            tagged @ SearchError::Collaborator { .. } => tagged,
            other => SearchError::Collaborator {
                collaborator,
                details: other.to_string(),
            },
        }
    }

    pub fn collaborator(&self) -> Option<Collaborator> {
        match self {
            SearchError::Collaborator { collaborator, .. } => Some(*collaborator),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_tag_wraps_backend_errors() {
        let error = SearchError::BackendResponse {
            backend: "qdrant".to_string(),
            details: "503 Service Unavailable".to_string(),
        };

        let tagged = SearchError::from_collaborator(Collaborator::VectorSearch)(error);
        assert_eq!(tagged.collaborator(), Some(Collaborator::VectorSearch));
        assert!(tagged.to_string().starts_with("vector search failed"));
    }

    #[test]
    fn collaborator_tag_keeps_the_first_tag() {
        let error = SearchError::Collaborator {
            collaborator: Collaborator::Embedder,
            details: "timeout".to_string(),
        };

        let tagged = SearchError::from_collaborator(Collaborator::Reranker)(error);
        assert_eq!(tagged.collaborator(), Some(Collaborator::Embedder));
    }
}
