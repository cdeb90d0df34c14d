//! Offline index build from internal policy documents
//!
//! ```text
//! docs_dir ─► walk ─► allowlist ─► read (concurrent) ─► chunk
//!                                                        │
//!                  drop ◄── suspicious? ◄────────────────┘
//!                  drop ◄── empty or still suspicious after sanitize?
//!                                                        │
//!                                      embed ─► upsert ◄─┘
//! ```

use super::chunk::{chunk_text, infer_metadata, truncate_on_word, DocumentChunk, SourceAllowlist};
use super::embedding::Embedder;
use super::index::{IndexedChunk, VectorIndex};
use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::leakage::Sanitizer;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Counters returned by a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub documents_seen: usize,
    pub chunks_indexed: usize,
    pub chunks_skipped: usize,
}

/// Builds the policy index from the document root
pub struct IndexBuilder {
    config: RagConfig,
    sanitizer: Arc<Sanitizer>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl IndexBuilder {
    pub fn new(
        config: RagConfig,
        sanitizer: Arc<Sanitizer>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            config,
            sanitizer,
            embedder,
            index,
        }
    }

    /// Rebuild the index from scratch.
    ///
    /// A missing document root is `NotFound`. Zero kept chunks is a valid
    /// outcome.
    pub async fn build(&self) -> Result<BuildStats> {
        let root = &self.config.docs_dir;
        if !tokio::fs::try_exists(root).await? {
            return Err(Error::NotFound(format!(
                "documents directory {}",
                root.display()
            )));
        }
        let root = tokio::fs::canonicalize(root).await?;
        let allowlist = SourceAllowlist::from_config(&self.config).with_root(&root);

        let mut candidates: Vec<(PathBuf, String)> = collect_files(&root)
            .await?
            .into_iter()
            .filter_map(|path| {
                let source = allowlist.source_path_of(&path)?;
                Some((path, source))
            })
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1));

        let documents: Vec<(PathBuf, String, String)> = stream::iter(candidates)
            .map(|(path, source)| async move {
                let text = tokio::fs::read_to_string(&path).await?;
                Ok::<_, Error>((path, source, text))
            })
            .buffered(self.config.build_concurrency.max(1))
            .try_collect()
            .await?;

        self.index.clear().await?;

        let mut stats = BuildStats {
            documents_seen: documents.len(),
            ..BuildStats::default()
        };
        let mut kept: Vec<DocumentChunk> = Vec::new();

        for (path, source, text) in &documents {
            let metadata = infer_metadata(path);
            let raw_chunks =
                chunk_text(text, self.config.chunk_size, self.config.chunk_overlap)?;

            for (chunk_index, raw) in raw_chunks.iter().enumerate() {
                match self.clean_chunk(raw) {
                    Some(clean) => kept.push(DocumentChunk {
                        id: DocumentChunk::chunk_id(&metadata.doc_id, chunk_index),
                        text: clean,
                        source_path: source.clone(),
                        chunk_index,
                        metadata: metadata.clone(),
                    }),
                    None => {
                        stats.chunks_skipped += 1;
                        tracing::warn!(
                            source = %source,
                            chunk_index,
                            "Skipped suspicious or empty chunk during indexing"
                        );
                    }
                }
            }
        }

        if !kept.is_empty() {
            let texts: Vec<&str> = kept.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts);
            let entries: Vec<IndexedChunk> = kept
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
                .collect();
            stats.chunks_indexed = entries.len();
            self.index.upsert(entries).await?;
        }

        tracing::info!(
            documents_seen = stats.documents_seen,
            chunks_indexed = stats.chunks_indexed,
            chunks_skipped = stats.chunks_skipped,
            "Index build complete"
        );
        Ok(stats)
    }

    /// The cleaned chunk text, or `None` if the chunk must be dropped
    fn clean_chunk(&self, raw: &str) -> Option<String> {
        let outcome = self.sanitizer.sanitize(raw);
        if outcome.suspicious {
            return None;
        }
        let clean = truncate_on_word(&outcome.text, self.config.max_chunk_chars);
        if clean.is_empty() || self.sanitizer.is_suspicious(&clean) {
            return None;
        }
        Some(clean)
    }
}

/// Every regular file under `root`; symlinks are not followed
async fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    Ok(files)
}
