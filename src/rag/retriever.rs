//! Online policy retrieval
//!
//! Every candidate read back from the index is re-checked: its source must
//! still be on the allowlist and its text must still pass the sanitizer.
//! Index-time sanitization is never trusted on its own.

use super::chunk::{truncate_on_word, SourceAllowlist};
use super::embedding::Embedder;
use super::index::{MetadataFilter, VectorIndex};
use crate::config::RagConfig;
use crate::error::Result;
use crate::leakage::Sanitizer;
use crate::privacy::Language;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A retrieval request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalQuery {
    pub text: String,
    pub language: Language,
    /// Falls back to `default_top_k` when unset
    pub top_k: Option<usize>,
    /// Category filter applied after the similarity query
    pub policy_type: Option<String>,
}

impl RetrievalQuery {
    pub fn new(text: impl Into<String>, language: Language) -> Self {
        Self {
            text: text.into(),
            language,
            top_k: None,
            policy_type: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_policy_type(mut self, policy_type: impl Into<String>) -> Self {
        self.policy_type = Some(policy_type.into());
        self
    }
}

/// A snippet safe to place in model context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    pub id: String,
    pub doc_id: String,
    pub language: Language,
    pub policy_type: String,
    pub source_path: String,
    pub snippet: String,
    pub score: f32,
}

/// Retrieves sanitized policy snippets
pub struct PolicyRetriever {
    config: RagConfig,
    allowlist: SourceAllowlist,
    sanitizer: Arc<Sanitizer>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl PolicyRetriever {
    pub fn new(
        config: RagConfig,
        sanitizer: Arc<Sanitizer>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            allowlist: SourceAllowlist::from_config(&config),
            config,
            sanitizer,
            embedder,
            index,
        }
    }

    /// Top matching snippets in rank order.
    ///
    /// A query that sanitizes to nothing yields an empty list.
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievedSnippet>> {
        let top_k = query.top_k.unwrap_or(self.config.default_top_k);
        let clean_query = truncate_on_word(
            &self.sanitizer.sanitize(&query.text).text,
            self.config.max_query_chars,
        );
        if top_k == 0 || clean_query.is_empty() {
            tracing::debug!("Empty retrieval query after sanitization");
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(&clean_query);
        let fetch_k = top_k.saturating_mul(self.config.oversample_factor.max(1));
        let candidates = self
            .index
            .query(&embedding, fetch_k, &MetadataFilter::language(query.language))
            .await?;

        let mut results = Vec::with_capacity(top_k);
        for candidate in candidates {
            let chunk = candidate.chunk;

            if !self.allowlist.admits_relative(&chunk.source_path) {
                tracing::warn!(
                    source = %chunk.source_path,
                    id = %chunk.id,
                    "Skipped non-internal source in retrieval"
                );
                continue;
            }

            if let Some(wanted) = &query.policy_type {
                if !chunk.metadata.policy_type.eq_ignore_ascii_case(wanted) {
                    continue;
                }
            }

            let outcome = self.sanitizer.sanitize(&chunk.text);
            let snippet = truncate_on_word(&outcome.text, self.config.max_excerpt_chars);
            if outcome.suspicious || snippet.is_empty() || self.sanitizer.is_suspicious(&snippet) {
                tracing::warn!(
                    source = %chunk.source_path,
                    id = %chunk.id,
                    "Skipped suspicious chunk during retrieval"
                );
                continue;
            }

            results.push(RetrievedSnippet {
                id: chunk.id,
                doc_id: chunk.metadata.doc_id,
                language: chunk.metadata.language,
                policy_type: chunk.metadata.policy_type,
                source_path: chunk.source_path,
                snippet,
                score: 1.0 - candidate.distance,
            });
            if results.len() >= top_k {
                break;
            }
        }

        tracing::debug!(
            requested = top_k,
            returned = results.len(),
            language = %query.language,
            "Policy retrieval complete"
        );
        Ok(results)
    }
}
