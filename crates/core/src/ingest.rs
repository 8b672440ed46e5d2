use crate::chunking::{chunk_blocks, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::models::{Chunk, DocId, IngestionOptions};
use crate::parser::StructuralParser;
use crate::traits::{LexicalIndex, VectorIndex};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub block_count: usize,
    pub chunks: Vec<Chunk>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Parses and chunks one PDF. Returns the block count next to the chunks.
pub fn chunk_pdf(
    path: &Path,
    parser: &StructuralParser,
    extractor: &dyn PdfExtractor,
    options: &IngestionOptions,
) -> Result<(usize, Vec<Chunk>), IngestError> {
    let pages = extractor.extract_pages(path)?;
    let blocks = parser.parse(&pages, &options.subject, options.class_level);
    let chunks = chunk_blocks(&blocks, ChunkingConfig::from(options))?;
    debug!(
        path = %path.display(),
        pages = pages.len(),
        blocks = blocks.len(),
        chunks = chunks.len(),
        "chunked pdf"
    );
    Ok((blocks.len(), chunks))
}

/// Chunks a single PDF, or every PDF below a folder. Folder ingestion skips
/// unreadable files and reports them instead of failing.
pub fn ingest_path_best_effort(
    path: &Path,
    options: &IngestionOptions,
) -> Result<IngestionReport, IngestError> {
    ChunkingConfig::from(options).step()?;
    let parser = StructuralParser::new()?;
    let extractor = LopdfExtractor;

    if path.is_file() {
        let (block_count, chunks) = chunk_pdf(path, &parser, &extractor, options)?;
        return Ok(IngestionReport {
            block_count,
            chunks,
            skipped_files: Vec::new(),
        });
    }

    let files = discover_pdf_files(path);
    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            path.display()
        )));
    }

    let mut report = IngestionReport {
        block_count: 0,
        chunks: Vec::new(),
        skipped_files: Vec::new(),
    };

    for file in files {
        match chunk_pdf(&file, &parser, &extractor, options) {
            Ok((block_count, chunks)) => {
                report.block_count += block_count;
                report.chunks.extend(chunks);
            }
            Err(error) => {
                warn!(path = %file.display(), %error, "skipping pdf");
                report.skipped_files.push(SkippedPdf {
                    path: file,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Embeds chunks in batches and writes them to the vector index, then to
/// the lexical store.
pub async fn index_chunks<L, V, E>(
    chunks: &[Chunk],
    lexical: &L,
    vector: &V,
    embedder: &E,
    batch_size: usize,
) -> Result<(), IngestError>
where
    L: LexicalIndex + Sync,
    V: VectorIndex + Sync,
    E: Embedder + Sync,
{
    if batch_size == 0 {
        return Err(IngestError::InvalidArgument(
            "embedding batch size must be positive".to_string(),
        ));
    }

    for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(IngestError::InvalidArgument(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            )));
        }

        let ids: Vec<DocId> = batch.iter().map(|chunk| chunk.id).collect();
        vector.index_vectors(&ids, &vectors).await?;
        debug!(batch = batch_no, size = batch.len(), "indexed vectors");
    }

    lexical.index_chunks(chunks).await?;
    info!(chunk_count = chunks.len(), "indexed chunks");
    Ok(())
}
