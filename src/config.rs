//! CaseGuard configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main CaseGuard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseGuardConfig {
    /// Redactor configuration
    pub redaction: RedactionConfig,

    /// Shared sanitizer configuration
    pub sanitizer: SanitizerConfig,

    /// Output guard configuration
    pub output_guard: OutputGuardConfig,

    /// Tool dispatch configuration
    pub tools: ToolsConfig,

    /// Document pipeline configuration
    pub rag: RagConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl CaseGuardConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, apply environment overrides
    /// and validate the result.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "configuration file {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CASEGUARD_*` overrides from the given lookup.
    ///
    /// The lookup is injected so tests do not have to mutate the process
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("CASEGUARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(dir) = lookup("CASEGUARD_DOCS_DIR") {
            self.rag.docs_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("CASEGUARD_INDEX_PATH") {
            self.rag.index_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("CASEGUARD_TOOL_MAX_ATTEMPTS") {
            self.tools.max_attempts = raw.trim().parse().map_err(|_| {
                Error::Config(format!("CASEGUARD_TOOL_MAX_ATTEMPTS is not a number: {raw}"))
            })?;
        }
        Ok(())
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.tools.max_attempts == 0 {
            return Err(Error::Config("tools.max_attempts must be >= 1".to_string()));
        }
        if self.sanitizer.max_input_chars == 0 {
            return Err(Error::Config(
                "sanitizer.max_input_chars must be positive".to_string(),
            ));
        }
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(Error::Config("rag.chunk_size must be positive".to_string()));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(Error::Config(
                "rag.chunk_overlap must be smaller than rag.chunk_size".to_string(),
            ));
        }
        if rag.max_chunk_chars < rag.chunk_size {
            return Err(Error::Config(
                "rag.max_chunk_chars must be >= rag.chunk_size".to_string(),
            ));
        }
        if rag.oversample_factor == 0 {
            return Err(Error::Config("rag.oversample_factor must be >= 1".to_string()));
        }
        if rag.embedding_dimensions == 0 {
            return Err(Error::Config(
                "rag.embedding_dimensions must be positive".to_string(),
            ));
        }
        if rag.allowed_extensions.is_empty() {
            return Err(Error::Config(
                "rag.allowed_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Redactor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Full names of known customers, redacted as `<<CUSTOMER_NAME>>`
    pub known_customer_names: Vec<String>,
}

/// Sanitizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Hard cap on input length in characters; longer input is suspicious
    pub max_input_chars: usize,

    /// Additional directive markers (regex, matched case-insensitively)
    pub extra_markers: Vec<String>,

    /// Decode base64 blocks and look for directives inside them
    pub detect_encoded: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 8000,
            extra_markers: Vec::new(),
            detect_encoded: true,
        }
    }
}

/// Output guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputGuardConfig {
    /// Try one sanitize-and-recheck pass before requiring the fallback
    pub attempt_sanitize: bool,
}

impl Default for OutputGuardConfig {
    fn default() -> Self {
        Self {
            attempt_sanitize: true,
        }
    }
}

/// Tool dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Maximum handler attempts per call (including the first)
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles on each further attempt
    pub base_backoff_ms: u64,

    /// Upper bound for a single backoff delay
    pub max_backoff_ms: u64,

    /// Overall deadline for one call, retries and backoff included
    pub call_deadline_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 50,
            max_backoff_ms: 2000,
            call_deadline_ms: 5000,
        }
    }
}

impl ToolsConfig {
    /// Overall call deadline as a `Duration`
    pub fn call_deadline(&self) -> Duration {
        Duration::from_millis(self.call_deadline_ms)
    }
}

/// Document pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Root directory holding internal policy documents
    pub docs_dir: PathBuf,

    /// Sub-directories of `docs_dir` trusted for ingestion (empty = whole root)
    pub allowed_dirs: Vec<PathBuf>,

    /// File extensions trusted for ingestion, without the dot
    pub allowed_extensions: Vec<String>,

    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Hard cap on a sanitized chunk
    pub max_chunk_chars: usize,

    /// Hard cap on a retrieval query
    pub max_query_chars: usize,

    /// Maximum snippet length handed to the model
    pub max_excerpt_chars: usize,

    /// Candidates fetched per requested result
    pub oversample_factor: usize,

    /// Results returned when the caller does not ask for a count
    pub default_top_k: usize,

    /// Files read concurrently while building the index
    pub build_concurrency: usize,

    /// Hashed embedding width
    pub embedding_dimensions: usize,

    /// Where the index snapshot is persisted, if anywhere
    pub index_path: Option<PathBuf>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("./documents"),
            allowed_dirs: Vec::new(),
            allowed_extensions: vec!["md".to_string(), "txt".to_string()],
            chunk_size: 500,
            chunk_overlap: 80,
            max_chunk_chars: 700,
            max_query_chars: 300,
            max_excerpt_chars: 400,
            oversample_factor: 3,
            default_top_k: 4,
            build_concurrency: 8,
            embedding_dimensions: 96,
            index_path: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CaseGuardConfig::default();
        assert_eq!(config.tools.max_attempts, 3);
        assert_eq!(config.rag.oversample_factor, 3);
        assert!(config.output_guard.attempt_sanitize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CaseGuardConfig::from_toml_str(
            r#"
            [tools]
            max_attempts = 5

            [rag]
            docs_dir = "/srv/policies"
            allowed_dirs = ["refunds", "shipping"]
            "#,
        )
        .unwrap();

        assert_eq!(config.tools.max_attempts, 5);
        assert_eq!(config.tools.base_backoff_ms, 50);
        assert_eq!(config.rag.docs_dir, PathBuf::from("/srv/policies"));
        assert_eq!(config.rag.allowed_dirs.len(), 2);
        assert_eq!(config.rag.chunk_size, 500);
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_chunk() {
        let err = CaseGuardConfig::from_toml_str(
            r#"
            [rag]
            chunk_size = 100
            chunk_overlap = 100
            max_chunk_chars = 200
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = CaseGuardConfig::default();
        config.tools.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CASEGUARD_LOG_LEVEL", "debug"),
            ("CASEGUARD_DOCS_DIR", "/tmp/docs"),
            ("CASEGUARD_TOOL_MAX_ATTEMPTS", "4"),
        ]);
        let mut config = CaseGuardConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.rag.docs_dir, PathBuf::from("/tmp/docs"));
        assert_eq!(config.tools.max_attempts, 4);
        assert!(config.rag.index_path.is_none());
    }

    #[test]
    fn test_env_override_bad_number() {
        let mut config = CaseGuardConfig::default();
        let err = config
            .apply_env_overrides(|key| {
                (key == "CASEGUARD_TOOL_MAX_ATTEMPTS").then(|| "three".to_string())
            })
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = CaseGuardConfig::from_file("/nonexistent/caseguard.toml").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caseguard.toml");
        std::fs::write(
            &path,
            "[redaction]\nknown_customer_names = [\"Jane Doe\"]\n",
        )
        .unwrap();

        let config = CaseGuardConfig::from_file(&path).unwrap();
        assert_eq!(config.redaction.known_customer_names, vec!["Jane Doe"]);
    }

    #[test]
    fn test_config_serialize_roundtrip_preserves_sections() {
        let config = CaseGuardConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("[tools]"));
        assert!(text.contains("[rag]"));
    }
}
