use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::domain::{DomainError, CHUNK_OVERLAP, CHUNK_SIZE};

pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";
pub const DEFAULT_OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_LOCAL_EMBED_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_GEN_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_VERSION: &str = "v1alpha";
pub const DEFAULT_FALLBACK_MODELS: &[&str] = &[
    "gemini-2.0-flash-002",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
    "gemini-1.5-pro",
];
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Credential that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Google,
    OpenAi,
    /// On-device ONNX model, no network after the first download.
    Local,
}

impl FromStr for EmbeddingBackend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            "local" | "huggingface" | "fastembed" => Ok(Self::Local),
            other => Err(DomainError::config(format!(
                "unknown EMBED_BACKEND '{other}' (expected 'google', 'openai' or 'local')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(DomainError::config(format!(
                "unknown STORE_BACKEND '{other}' (expected 'sqlite' or 'memory')"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub rag: RagConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Secret,
    pub base_url: String,
    pub model: String,
    pub fallback_models: Vec<String>,
    pub api_version: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub api_key: Secret,
    pub base_url: String,
    /// Where the local backend keeps downloaded model files.
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub db_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RagConfig {
    pub kb_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            llm: LlmConfig {
                api_key: Secret::default(),
                base_url: GEMINI_BASE_URL.to_string(),
                model: DEFAULT_GEN_MODEL.to_string(),
                fallback_models: DEFAULT_FALLBACK_MODELS
                    .iter()
                    .map(|m| m.to_string())
                    .collect(),
                api_version: DEFAULT_API_VERSION.to_string(),
                timeout_seconds: 60,
            },
            embedding: EmbeddingConfig {
                backend: EmbeddingBackend::Google,
                model: DEFAULT_EMBED_MODEL.to_string(),
                api_key: Secret::default(),
                base_url: GEMINI_BASE_URL.to_string(),
                cache_dir: None,
            },
            store: StoreConfig {
                backend: StoreBackend::Sqlite,
                db_path: PathBuf::from("embeddings.db"),
            },
            rag: RagConfig {
                kb_dir: PathBuf::from("kb_raw"),
                chunk_size: CHUNK_SIZE,
                chunk_overlap: CHUNK_OVERLAP,
                top_k: 5,
            },
        }
    }
}

impl Config {
    /// Builds the configuration from environment-style variables.
    ///
    /// `GOOGLE_API_KEY` is mandatory; `OPENAI_API_KEY` is mandatory only for
    /// the `openai` embedding backend. Everything else has a default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        let google_key = get("GOOGLE_API_KEY")
            .ok_or_else(|| DomainError::config("GOOGLE_API_KEY is not set"))?;
        config.llm.api_key = Secret::new(google_key.clone());

        if let Some(host) = get("SERVER_HOST") {
            config.server.host = host;
        }
        config.server.port = parse_or(get("SERVER_PORT"), "SERVER_PORT", config.server.port)?;

        if let Some(url) = get("GEMINI_BASE_URL") {
            config.llm.base_url = url.clone();
            config.embedding.base_url = url;
        }
        if let Some(model) = get("GEN_MODEL") {
            config.llm.model = model;
        }
        if let Some(list) = get("GEN_FALLBACK_MODELS") {
            config.llm.fallback_models = list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(version) = get("GENAI_API_VERSION") {
            config.llm.api_version = version;
        }
        config.llm.timeout_seconds = parse_or(
            get("GEN_TIMEOUT_SECS"),
            "GEN_TIMEOUT_SECS",
            config.llm.timeout_seconds,
        )?;

        if let Some(backend) = get("EMBED_BACKEND") {
            config.embedding.backend = backend.parse()?;
        }
        config.embedding.model = match (get("EMBED_MODEL"), config.embedding.backend) {
            (Some(model), _) => model,
            (None, EmbeddingBackend::Google) => DEFAULT_EMBED_MODEL.to_string(),
            (None, EmbeddingBackend::OpenAi) => DEFAULT_OPENAI_EMBED_MODEL.to_string(),
            (None, EmbeddingBackend::Local) => DEFAULT_LOCAL_EMBED_MODEL.to_string(),
        };
        config.embedding.cache_dir = get("EMBED_CACHE_DIR").map(PathBuf::from);
        config.embedding.api_key = match config.embedding.backend {
            EmbeddingBackend::Google => Secret::new(google_key),
            EmbeddingBackend::OpenAi => Secret::new(get("OPENAI_API_KEY").ok_or_else(|| {
                DomainError::config("OPENAI_API_KEY is required when EMBED_BACKEND=openai")
            })?),
            EmbeddingBackend::Local => Secret::default(),
        };

        if let Some(backend) = get("STORE_BACKEND") {
            config.store.backend = backend.parse()?;
        }
        if let Some(path) = get("DB_PATH") {
            config.store.db_path = PathBuf::from(path);
        }

        if let Some(dir) = get("KB_DIR") {
            config.rag.kb_dir = PathBuf::from(dir);
        }
        config.rag.chunk_size = parse_or(get("CHUNK_SIZE"), "CHUNK_SIZE", config.rag.chunk_size)?;
        config.rag.chunk_overlap = parse_or(
            get("CHUNK_OVERLAP"),
            "CHUNK_OVERLAP",
            config.rag.chunk_overlap,
        )?;
        if config.rag.chunk_size == 0 {
            return Err(DomainError::config("CHUNK_SIZE must be greater than zero"));
        }

        Ok(config)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, DomainError> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| DomainError::config(format!("{key} has an invalid value '{raw}'"))),
        None => Ok(default),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Answering rules placed at the top of every system instruction.
    pub rules: String,
    pub context_header: String,
    /// Stands in for the context block when nothing was retrieved.
    pub no_results: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            rules: "\
Always answer with a clear, bulleted structure.
If the retrieved fragments do not support an answer, say plainly that no relevant information was found and suggest where the user could look next.
If the question is unrelated to the retrieved fragments, say so and list a few questions the knowledge base can answer.
Explain technical terms so that non-specialists can follow.
When you rely on a retrieved fragment, cite it at the end of the sentence as [1], [2], ... matching the fragment list."
                .to_string(),
            context_header:
                "The following fragments were retrieved and may be cited when needed:\n=== Retrieved fragments ==="
                    .to_string(),
            no_results: "(no retrieved fragments)".to_string(),
        }
    }
}

impl PromptsConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DomainError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::config(format!("invalid prompts file: {e}")))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, DomainError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DomainError::config(format!("cannot read prompts file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&raw)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config: Config,
    pub prompts: PromptsConfig,
}

impl AppConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prompts = match lookup("PROMPTS_PATH").filter(|p| !p.trim().is_empty()) {
            Some(path) => PromptsConfig::from_yaml_file(Path::new(path.trim()))?,
            None => PromptsConfig::default(),
        };
        Ok(Self {
            config: Config::from_lookup(lookup)?,
            prompts,
        })
    }

    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: Config::default(),
            prompts: PromptsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_google_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "k")])).unwrap();
        assert_eq!(config.embedding.backend, EmbeddingBackend::Google);
        assert_eq!(config.embedding.model, DEFAULT_EMBED_MODEL);
        assert_eq!(config.embedding.api_key.expose(), "k");
        assert_eq!(config.llm.model, DEFAULT_GEN_MODEL);
        assert_eq!(config.llm.api_version, "v1alpha");
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.chunk_overlap, 120);
        assert_eq!(config.store.db_path, PathBuf::from("embeddings.db"));
    }

    #[test]
    fn test_openai_backend_needs_its_own_key() {
        let err = Config::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "k"),
            ("EMBED_BACKEND", "openai"),
        ]))
        .unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));

        let config = Config::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "k"),
            ("EMBED_BACKEND", "OpenAI"),
            ("OPENAI_API_KEY", "sk"),
        ]))
        .unwrap();
        assert_eq!(config.embedding.backend, EmbeddingBackend::OpenAi);
        assert_eq!(config.embedding.api_key.expose(), "sk");
        assert_eq!(config.embedding.model, DEFAULT_OPENAI_EMBED_MODEL);
    }

    #[test]
    fn test_local_backend_needs_no_key() {
        let config = Config::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "k"),
            ("EMBED_BACKEND", "huggingface"),
            ("EMBED_CACHE_DIR", "/tmp/models"),
        ]))
        .unwrap();
        assert_eq!(config.embedding.backend, EmbeddingBackend::Local);
        assert_eq!(config.embedding.model, DEFAULT_LOCAL_EMBED_MODEL);
        assert_eq!(config.embedding.api_key.expose(), "");
        assert_eq!(config.embedding.cache_dir, Some(PathBuf::from("/tmp/models")));
    }

    #[test]
    fn test_fallback_list_parsing() {
        let config = Config::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "k"),
            ("GEN_FALLBACK_MODELS", " a, ,b ,"),
            ("STORE_BACKEND", "memory"),
        ]))
        .unwrap();
        assert_eq!(config.llm.fallback_models, vec!["a", "b"]);
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "k"),
            ("SERVER_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "super-secret")])).unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn test_prompts_yaml_partial_override() {
        let prompts = PromptsConfig::from_yaml_str("rules: Be brief.\n").unwrap();
        assert_eq!(prompts.rules, "Be brief.");
        assert_eq!(prompts.no_results, PromptsConfig::default().no_results);
    }
}
