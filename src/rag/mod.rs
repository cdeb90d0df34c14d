//! Sanitized document indexing and retrieval
//!
//! Internal policy documents feed model context, so they are handled as
//! untrusted input twice:
//!
//! - at build time, [`IndexBuilder`] admits only allowlisted files and drops
//!   any chunk the sanitizer flags
//! - at query time, [`PolicyRetriever`] re-checks every candidate's source
//!   path and content before it becomes a snippet

pub mod builder;
pub mod chunk;
pub mod embedding;
pub mod index;
pub mod retriever;

pub use builder::{BuildStats, IndexBuilder};
pub use chunk::{
    chunk_text, infer_metadata, truncate_on_word, DocumentChunk, DocumentMetadata,
    SourceAllowlist,
};
pub use embedding::{cosine_distance, cosine_similarity, Embedder, HashEmbedder};
pub use index::{InMemoryIndex, IndexedChunk, MetadataFilter, ScoredChunk, VectorIndex};
pub use retriever::{PolicyRetriever, RetrievalQuery, RetrievedSnippet};
