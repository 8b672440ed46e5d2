use crate::error::IngestError;
use crate::models::{Chunk, ChunkMeta, DocId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocstoreEntry {
    pub meta: ChunkMeta,
    pub text: String,
}

/// JSON file mapping chunk ids to their text and metadata. Entries are kept
/// as raw JSON so files written by other tools survive a rewrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Docstore {
    entries: Map<String, Value>,
}

impl Docstore {
    /// A missing, empty or syntactically broken file loads as an empty store.
    /// Valid JSON that is not an object is an error, so it is never overwritten.
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => return Err(error.into()),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(entries)) => Ok(Self { entries }),
            Ok(_) => Err(IngestError::InvalidArgument(format!(
                "docstore {} is not a json object",
                path.display()
            ))),
            Err(error) => {
                warn!(path = %path.display(), %error, "docstore is not valid json, starting empty");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), IngestError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn insert_chunks(&mut self, chunks: &[Chunk]) -> Result<(), IngestError> {
        for chunk in chunks {
            let entry = DocstoreEntry {
                meta: chunk.meta.clone(),
                text: chunk.text.clone(),
            };
            self.entries
                .insert(chunk.id.to_string(), serde_json::to_value(entry)?);
        }
        Ok(())
    }

    /// Entries that do not have the chunk shape read as `None`.
    pub fn get(&self, id: DocId) -> Option<DocstoreEntry> {
        self.entries
            .get(&id.to_string())
            .and_then(|raw| DocstoreEntry::deserialize(raw).ok())
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.entries.contains_key(&id.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, BlockKind};
    use tempfile::tempdir;

    fn chunk(id: DocId, text: &str) -> Chunk {
        let block = Block {
            id: "b1".to_string(),
            subject: "maths".to_string(),
            class_level: 12,
            chapter: Some(1),
            section: None,
            kind: BlockKind::Paragraph,
            sequence: 1,
            text: text.to_string(),
            page: 3,
        };
        Chunk {
            id,
            text: text.to_string(),
            meta: ChunkMeta::from(&block),
        }
    }

    #[test]
    fn missing_empty_and_corrupt_files_load_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(Docstore::load(&dir.path().join("absent.json"))?.is_empty());

        let empty = dir.path().join("empty.json");
        fs::write(&empty, "  \n")?;
        assert!(Docstore::load(&empty)?.is_empty());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{not json")?;
        assert!(Docstore::load(&corrupt)?.is_empty());
        Ok(())
    }

    #[test]
    fn saved_entries_load_back() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("docstore.json");

        let mut store = Docstore::default();
        store.insert_chunks(&[chunk(11, "first"), chunk(12, "second")])?;
        store.save(&path)?;

        let mut loaded = Docstore::load(&path)?;
        assert_eq!(loaded, store);
        assert_eq!(loaded.get(12).map(|entry| entry.text), Some("second".to_string()));

        loaded.insert_chunks(&[chunk(13, "third")])?;
        assert_eq!(loaded.len(), 3);
        Ok(())
    }

    #[test]
    fn foreign_entries_survive_a_rewrite() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("docstore.json");
        fs::write(
            &path,
            r#"{"123": {"meta": {"id": "b1", "class_": 12, "seq": 1}, "text": "kept"}}"#,
        )?;

        let mut store = Docstore::load(&path)?;
        assert_eq!(store.len(), 1);
        assert!(store.contains(123));
        assert!(store.get(123).is_none());

        store.insert_chunks(&[chunk(7, "new")])?;
        store.save(&path)?;

        let saved: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(saved["123"]["text"], "kept");
        assert_eq!(saved["123"]["meta"]["class_"], 12);
        assert_eq!(saved["7"]["meta"]["block_id"], "b1");
        Ok(())
    }

    #[test]
    fn non_object_json_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("docstore.json");
        fs::write(&path, "[1, 2, 3]")?;

        assert!(matches!(
            Docstore::load(&path),
            Err(IngestError::InvalidArgument(_))
        ));
        Ok(())
    }
}
