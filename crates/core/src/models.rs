use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identifier shared by the lexical store, the vector index and the docstore.
pub type DocId = i64;

/// Id a vector index reports for an empty result slot.
pub const NO_MATCH: DocId = -1;

/// Random non-negative 63-bit id, wide enough to be unique per ingest run and
/// still accepted as an unsigned point id by vector stores.
pub fn new_doc_id() -> DocId {
    (Uuid::new_v4().as_u128() & i64::MAX as u128) as DocId
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    ChapterTitle,
    SectionTitle,
    ExampleTitle,
    ExampleBody,
    ExerciseTitle,
    Exercise,
    Paragraph,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChapterTitle => "chapter_title",
            Self::SectionTitle => "section_title",
            Self::ExampleTitle => "example_title",
            Self::ExampleBody => "example_body",
            Self::ExerciseTitle => "exercise_title",
            Self::Exercise => "exercise",
            Self::Paragraph => "paragraph",
        }
    }

    /// Worked examples, exercises and proofs are indexed whole.
    pub fn is_atomic(self) -> bool {
        let name = self.as_str();
        name.starts_with("example")
            || name.starts_with("exercise")
            || name.to_ascii_lowercase().contains("proof")
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub id: String,
    pub subject: String,
    pub class_level: u32,
    pub chapter: Option<u32>,
    pub section: Option<String>,
    pub kind: BlockKind,
    pub sequence: u64,
    pub text: String,
    pub page: u32,
}

/// Block attributes carried by every chunk. Field names match the lexical
/// store mapping so the metadata can be indexed and filtered as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMeta {
    pub block_id: String,
    pub subject: String,
    #[serde(rename = "class")]
    pub class_level: u32,
    pub chapter: Option<u32>,
    pub section: Option<String>,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub sequence: u64,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_start_word: Option<usize>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl From<&Block> for ChunkMeta {
    fn from(block: &Block) -> Self {
        Self {
            block_id: block.id.clone(),
            subject: block.subject.clone(),
            class_level: block.class_level,
            chapter: block.chapter,
            section: block.section.clone(),
            kind: block.kind,
            sequence: block.sequence,
            page: block.page,
            chunk_start_word: None,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: DocId,
    pub text: String,
    pub meta: ChunkMeta,
}

impl Chunk {
    /// Document body as stored in the lexical index: the text next to the
    /// flattened metadata fields.
    pub fn to_source(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut source = match serde_json::to_value(&self.meta)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        source.insert("text".to_string(), Value::String(self.text.clone()));
        Ok(source)
    }
}

/// A document resolved from the lexical store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocId,
    pub source: Map<String, Value>,
}

impl StoredDocument {
    pub fn text(&self) -> &str {
        self.source
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub id: DocId,
    pub score: f64,
    pub source: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub id: DocId,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: DocId,
    pub text: String,
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_rerank: Option<f32>,
}

impl From<StoredDocument> for Candidate {
    fn from(document: StoredDocument) -> Self {
        Self {
            id: document.id,
            text: document.text().to_string(),
            meta: document.source,
            score_rerank: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct QueryFilters {
    pub chapter: Option<u32>,
    pub section: Option<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.chapter.is_none() && self.section.is_none()
    }
}

fn default_subject() -> String {
    "maths".to_string()
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default)]
    pub chapter: Option<u32>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            subject: default_subject(),
            chapter: None,
            section: None,
            top_k: default_top_k(),
        }
    }

    pub fn filters(&self) -> QueryFilters {
        QueryFilters {
            chapter: self.chapter,
            section: self.section.clone(),
        }
    }
}

/// Candidate pool sizes for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalLimits {
    pub lexical_k: usize,
    pub vector_k: usize,
    pub max_candidates: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            lexical_k: 30,
            vector_k: 30,
            max_candidates: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub subject: String,
    pub class_level: u32,
    pub chunk_max_tokens: usize,
    pub chunk_overlap_tokens: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            class_level: 12,
            chunk_max_tokens: 700,
            chunk_overlap_tokens: 120,
        }
    }
}
