//! Vector index abstraction and the in-memory implementation
//!
//! The index is treated as an opaque store keyed by chunk id. Nothing read
//! back from it is trusted: the retriever re-checks source and content of
//! every candidate.

use super::chunk::DocumentChunk;
use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::privacy::Language;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;

use super::embedding::cosine_distance;

/// A chunk together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

/// A query hit; smaller distance is closer
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub distance: f32,
}

/// Metadata constraints applied inside the index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub language: Option<Language>,
    pub policy_type: Option<String>,
}

impl MetadataFilter {
    pub fn language(language: Language) -> Self {
        Self {
            language: Some(language),
            policy_type: None,
        }
    }

    pub fn matches(&self, chunk: &DocumentChunk) -> bool {
        let language_ok = self
            .language
            .map_or(true, |lang| chunk.metadata.language == lang);
        let policy_ok = self
            .policy_type
            .as_ref()
            .map_or(true, |p| chunk.metadata.policy_type.eq_ignore_ascii_case(p));
        language_ok && policy_ok
    }
}

/// Similarity store for document chunks
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Remove every entry
    async fn clear(&self) -> Result<()>;

    /// Insert or replace entries by chunk id
    async fn upsert(&self, entries: Vec<IndexedChunk>) -> Result<()>;

    /// Up to `limit` entries matching `filter`, closest first
    async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>>;

    async fn get(&self, id: &str) -> Option<DocumentChunk>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    dimensions: usize,
    chunks: Vec<IndexedChunk>,
}

/// In-process index with brute-force cosine search and JSON snapshots
pub struct InMemoryIndex {
    dimensions: usize,
    entries: RwLock<BTreeMap<String, IndexedChunk>>,
}

impl InMemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Load the configured snapshot if there is one, else start empty
    pub async fn open(config: &RagConfig) -> Result<Self> {
        match &config.index_path {
            Some(path) if tokio::fs::try_exists(path).await? => {
                let index = Self::load(path).await?;
                if index.dimensions != config.embedding_dimensions {
                    return Err(Error::Index(format!(
                        "snapshot {} has {} dimensions, expected {}",
                        path.display(),
                        index.dimensions,
                        config.embedding_dimensions
                    )));
                }
                Ok(index)
            }
            _ => Ok(Self::new(config.embedding_dimensions)),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = Snapshot {
            dimensions: self.dimensions,
            chunks: self.entries.read().await.values().cloned().collect(),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path, bytes).await?;
        tracing::info!(
            path = %path.display(),
            chunks = snapshot.chunks.len(),
            "Saved index snapshot"
        );
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        let index = Self::new(snapshot.dimensions);
        index.upsert(snapshot.chunks).await?;
        tracing::info!(
            path = %path.display(),
            chunks = index.len().await,
            "Loaded index snapshot"
        );
        Ok(index)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn upsert(&self, entries: Vec<IndexedChunk>) -> Result<()> {
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != self.dimensions) {
            return Err(Error::Index(format!(
                "chunk {} has {} dimensions, index expects {}",
                bad.chunk.id,
                bad.embedding.len(),
                self.dimensions
            )));
        }
        let mut map = self.entries.write().await;
        for entry in entries {
            map.insert(entry.chunk.id.clone(), entry);
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>> {
        if embedding.len() != self.dimensions {
            return Err(Error::Index(format!(
                "query has {} dimensions, index expects {}",
                embedding.len(),
                self.dimensions
            )));
        }

        let map = self.entries.read().await;
        let mut hits: Vec<ScoredChunk> = map
            .values()
            .filter(|entry| filter.matches(&entry.chunk))
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                distance: cosine_distance(embedding, &entry.embedding),
            })
            .collect();

        // BTreeMap iteration is id-ordered, so ties stay deterministic
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Option<DocumentChunk> {
        self.entries.read().await.get(id).map(|e| e.chunk.clone())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
