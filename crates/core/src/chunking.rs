use crate::error::IngestError;
use crate::models::{new_doc_id, Block, Chunk, ChunkMeta, IngestionOptions};

/// Window sizes are counted in whitespace-delimited words, which stand in for
/// model tokens. Changing the counting changes chunk boundaries of indexed
/// content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 700,
            overlap: 120,
        }
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_tokens: value.chunk_max_tokens,
            overlap: value.chunk_overlap_tokens,
        }
    }
}

impl ChunkingConfig {
    /// Distance between the starts of consecutive windows.
    pub fn step(&self) -> Result<usize, IngestError> {
        if self.overlap >= self.max_tokens {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max_tokens {}",
                self.overlap, self.max_tokens
            )));
        }
        Ok(self.max_tokens - self.overlap)
    }
}

pub fn chunk_blocks(blocks: &[Block], config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    let step = config.step()?;
    let mut chunks = Vec::new();

    for block in blocks {
        let text = block.text.trim();
        if text.is_empty() {
            continue;
        }

        if block.kind.is_atomic() {
            chunks.push(whole_block(block, text));
            continue;
        }

        let words = text.split_whitespace().collect::<Vec<_>>();
        if words.len() <= config.max_tokens {
            chunks.push(whole_block(block, text));
            continue;
        }

        for (start, window) in word_windows(&words, config.max_tokens, step) {
            let mut meta = ChunkMeta::from(block);
            meta.chunk_start_word = Some(start);
            chunks.push(Chunk {
                id: new_doc_id(),
                text: window,
                meta,
            });
        }
    }

    Ok(chunks)
}

fn whole_block(block: &Block, text: &str) -> Chunk {
    Chunk {
        id: new_doc_id(),
        text: text.to_string(),
        meta: ChunkMeta::from(block),
    }
}

fn word_windows(words: &[&str], size: usize, step: usize) -> Vec<(usize, String)> {
    (0..words.len())
        .step_by(step)
        .map(|start| {
            let end = (start + size).min(words.len());
            (start, words[start..end].join(" "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockKind;

    fn block(kind: BlockKind, text: &str) -> Block {
        Block {
            id: "b1".to_string(),
            subject: "maths".to_string(),
            class_level: 12,
            chapter: Some(3),
            section: Some("3.2".to_string()),
            kind,
            sequence: 1,
            text: text.to_string(),
            page: 41,
        }
    }

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|index| format!("w{index}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn long_examples_stay_whole() {
        let blocks = vec![block(BlockKind::ExampleBody, &numbered_words(5_000))];
        let chunks = chunk_blocks(&blocks, ChunkingConfig::default()).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].meta.chunk_start_word, None);
        assert_eq!(chunks[0].text.split_whitespace().count(), 5_000);
    }

    #[test]
    fn long_exercises_stay_whole() {
        let config = ChunkingConfig {
            max_tokens: 10,
            overlap: 3,
        };
        let blocks = vec![
            block(BlockKind::Exercise, &numbered_words(40)),
            block(BlockKind::ExerciseTitle, &numbered_words(40)),
        ];
        let chunks = chunk_blocks(&blocks, config).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn long_paragraphs_are_windowed_with_overlap() {
        let config = ChunkingConfig {
            max_tokens: 10,
            overlap: 3,
        };
        let blocks = vec![block(BlockKind::Paragraph, &numbered_words(25))];
        let chunks = chunk_blocks(&blocks, config).unwrap();

        let starts: Vec<Option<usize>> = chunks
            .iter()
            .map(|chunk| chunk.meta.chunk_start_word)
            .collect();
        assert_eq!(starts, vec![Some(0), Some(7), Some(14), Some(21)]);
        assert!(chunks[..3]
            .iter()
            .all(|chunk| chunk.text.split_whitespace().count() == 10));
        assert_eq!(chunks[3].text, "w21 w22 w23 w24");
        assert_eq!(chunks[1].meta.chapter, Some(3));
        assert_eq!(chunks[1].meta.page, 41);
    }

    #[test]
    fn short_paragraphs_are_trimmed_but_not_split() {
        let blocks = vec![block(BlockKind::Paragraph, "  a  short\nparagraph \n")];
        let chunks = chunk_blocks(&blocks, ChunkingConfig::default()).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a  short\nparagraph");
        assert_eq!(chunks[0].meta.chunk_start_word, None);
    }

    #[test]
    fn empty_blocks_produce_nothing() {
        let blocks = vec![
            block(BlockKind::Paragraph, "   \n "),
            block(BlockKind::ExampleBody, ""),
        ];
        let chunks = chunk_blocks(&blocks, ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn block_order_is_preserved() {
        let config = ChunkingConfig {
            max_tokens: 4,
            overlap: 1,
        };
        let mut first = block(BlockKind::Paragraph, &numbered_words(6));
        first.id = "b1".to_string();
        let mut second = block(BlockKind::ExampleTitle, "Example 2");
        second.id = "b2".to_string();

        let chunks = chunk_blocks(&[first, second], config).unwrap();
        let owners: Vec<&str> = chunks.iter().map(|chunk| chunk.meta.block_id.as_str()).collect();
        assert_eq!(owners, vec!["b1", "b1", "b2"]);
    }

    #[test]
    fn overlap_not_below_window_is_rejected() {
        let blocks = vec![block(BlockKind::Paragraph, "text")];
        for (max_tokens, overlap) in [(10, 10), (10, 12), (0, 0)] {
            let result = chunk_blocks(&blocks, ChunkingConfig { max_tokens, overlap });
            assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
        }
    }
}
