//! Chunking, document metadata and the source allowlist

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::privacy::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Metadata inferred from a policy document's file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub doc_id: String,
    pub language: Language,
    pub policy_type: String,
}

/// One indexed segment of a policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// `<doc_id>::<chunk_index>`
    pub id: String,
    pub text: String,
    /// Path relative to the document root, `/`-separated
    pub source_path: String,
    pub chunk_index: usize,
    pub metadata: DocumentMetadata,
}

impl DocumentChunk {
    pub fn chunk_id(doc_id: &str, chunk_index: usize) -> String {
        format!("{}::{}", doc_id, chunk_index)
    }
}

/// Split `text` into overlapping character windows.
///
/// Whitespace is collapsed first, so chunks never carry line structure.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(Error::Config("chunk_size must be positive".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(Error::Config(
            "chunk_overlap must be smaller than chunk_size".to_string(),
        ));
    }

    let normalized: Vec<char> = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .collect();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < normalized.len() {
        let end = (start + chunk_size).min(normalized.len());
        let chunk: String = normalized[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end == normalized.len() {
            break;
        }
        start = end - chunk_overlap;
    }
    Ok(chunks)
}

/// Cut `text` to at most `max_chars`, backing off to the last space
pub fn truncate_on_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(' ') {
        Some(idx) => cut[..idx].trim_end().to_string(),
        None => cut,
    }
}

/// Infer metadata from a file stem such as `refund_policy_fr`
pub fn infer_metadata(path: &Path) -> DocumentMetadata {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let language = if stem.ends_with("_fr") {
        Language::Fr
    } else {
        Language::En
    };
    let policy_type = stem
        .rsplit_once('_')
        .map(|(head, _)| head)
        .unwrap_or(&stem)
        .to_uppercase();

    DocumentMetadata {
        doc_id: stem.to_uppercase().replace('-', "_"),
        language,
        policy_type,
    }
}

/// Which files under the document root may be ingested or returned
#[derive(Debug, Clone)]
pub struct SourceAllowlist {
    root: PathBuf,
    allowed_dirs: Vec<PathBuf>,
    extensions: HashSet<String>,
}

impl SourceAllowlist {
    pub fn new(
        root: impl Into<PathBuf>,
        allowed_dirs: impl IntoIterator<Item = PathBuf>,
        extensions: impl IntoIterator<Item = String>,
    ) -> Self {
        let root = root.into();
        let allowed_dirs = allowed_dirs
            .into_iter()
            .map(|dir| match dir.strip_prefix(&root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => dir,
            })
            .collect();
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        Self {
            root,
            allowed_dirs,
            extensions,
        }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(
            config.docs_dir.clone(),
            config.allowed_dirs.iter().cloned(),
            config.allowed_extensions.iter().cloned(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Same allowlist anchored at another root (e.g. the canonical one)
    pub fn with_root(&self, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..self.clone()
        }
    }

    /// The `/`-separated source path of `path` if it may be ingested
    pub fn source_path_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Option<_>>()?;
        let source = parts.join("/");
        self.admits_relative(&source).then_some(source)
    }

    /// Whether a stored source path names an allowed internal document.
    ///
    /// Absolute paths and any `..` segment are rejected outright.
    pub fn admits_relative(&self, source_path: &str) -> bool {
        let normalized = source_path.replace('\\', "/");
        if normalized.is_empty() || normalized.starts_with('/') {
            return false;
        }
        let path = Path::new(&normalized);
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return false;
        }

        let extension_ok = path
            .extension()
            .map(|ext| self.extensions.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false);
        if !extension_ok {
            return false;
        }

        self.allowed_dirs.is_empty() || self.allowed_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlist(dirs: &[&str]) -> SourceAllowlist {
        SourceAllowlist::new(
            "/srv/docs",
            dirs.iter().map(PathBuf::from),
            ["md".to_string(), ".TXT".to_string()],
        )
    }

    #[test]
    fn test_chunk_text_overlap() {
        let chunks = chunk_text("abcdefghij", 4, 1).unwrap();
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
        let chunks = chunk_text("abcdefghijk", 4, 1).unwrap();
        assert_eq!(chunks, vec!["abcd", "defg", "ghij", "jk"]);
    }

    #[test]
    fn test_chunk_text_normalizes_whitespace() {
        let chunks = chunk_text("Refunds\n\n  are   issued\twithin 14 days.", 500, 80).unwrap();
        assert_eq!(chunks, vec!["Refunds are issued within 14 days."]);
        assert!(chunk_text("   \n ", 500, 80).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_text_rejects_bad_params() {
        assert!(matches!(chunk_text("x", 0, 0), Err(Error::Config(_))));
        assert!(matches!(chunk_text("x", 10, 10), Err(Error::Config(_))));
    }

    #[test]
    fn test_truncate_on_word() {
        assert_eq!(truncate_on_word("short text", 50), "short text");
        assert_eq!(truncate_on_word("refund within fourteen days", 16), "refund within");
        assert_eq!(truncate_on_word("abcdefgh", 4), "abcd");
    }

    #[test]
    fn test_infer_metadata() {
        let meta = infer_metadata(Path::new("policies/refund_policy_fr.md"));
        assert_eq!(meta.doc_id, "REFUND_POLICY_FR");
        assert_eq!(meta.language, Language::Fr);
        assert_eq!(meta.policy_type, "REFUND_POLICY");

        let meta = infer_metadata(Path::new("late-delivery_en.txt"));
        assert_eq!(meta.doc_id, "LATE_DELIVERY_EN");
        assert_eq!(meta.language, Language::En);
        assert_eq!(meta.policy_type, "LATE-DELIVERY");
    }

    #[test]
    fn test_admits_relative() {
        let list = allowlist(&[]);
        assert!(list.admits_relative("refund_policy_en.md"));
        assert!(list.admits_relative("nested\\voucher_policy_fr.txt"));
        assert!(!list.admits_relative("/etc/passwd.md"));
        assert!(!list.admits_relative("../outside_en.md"));
        assert!(!list.admits_relative("a/../../b_en.md"));
        assert!(!list.admits_relative("script_en.py"));
        assert!(!list.admits_relative(""));
    }

    #[test]
    fn test_allowed_dirs_restrict() {
        let list = allowlist(&["/srv/docs/policies"]);
        assert!(list.admits_relative("policies/refund_policy_en.md"));
        assert!(!list.admits_relative("drafts/refund_policy_en.md"));
    }

    #[test]
    fn test_source_path_of() {
        let list = allowlist(&[]);
        assert_eq!(
            list.source_path_of(Path::new("/srv/docs/policies/refund_policy_en.md")),
            Some("policies/refund_policy_en.md".to_string())
        );
        assert_eq!(list.source_path_of(Path::new("/tmp/refund_policy_en.md")), None);
        assert_eq!(list.source_path_of(Path::new("/srv/docs/notes.pdf")), None);
    }
}
