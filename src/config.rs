//! Process-wide configuration (§6)

use std::env;

/// Vector store location and collection naming
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub host: String,
    pub port: u16,
    pub collection: String,
    pub embedding_dims: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6333,
            collection: "mem0".to_string(),
            embedding_dims: 1024,
        }
    }
}

impl VectorStoreConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// LLM provider configuration (§4.3, §6)
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gemma3-27b-q8".to_string(),
        }
    }
}

/// Embedding provider configuration (§6)
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub base_url: String,
    pub model: String,
    pub dims: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "bge-m3".to_string(),
            dims: 1024,
        }
    }
}

/// Top-level process configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Process-wide secret used to derive the master key. Absent => encryption disabled.
    pub master_key: Option<String>,
    pub vector_store: VectorStoreConfig,
    pub llm: LlmConfig,
    pub embedder: EmbedderConfig,
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Mirrors the teacher's plain-struct-with-`Default` configuration pattern
    /// (`StorageConfig`, `EmbeddingConfig`) rather than pulling in a generic
    /// config-file crate.
    pub fn from_env() -> Self {
        let mut config = Config {
            master_key: env::var("MEMORYX_MASTER_KEY").ok().filter(|s| !s.is_empty()),
            ..Default::default()
        };

        if let Ok(host) = env::var("MEMORYX_VECTOR_STORE_HOST") {
            config.vector_store.host = host;
        }
        if let Ok(port) = env::var("MEMORYX_VECTOR_STORE_PORT") {
            if let Ok(port) = port.parse() {
                config.vector_store.port = port;
            }
        }
        if let Ok(collection) = env::var("MEMORYX_VECTOR_STORE_COLLECTION") {
            config.vector_store.collection = collection;
        }
        if let Ok(dims) = env::var("MEMORYX_EMBEDDING_DIMS") {
            if let Ok(dims) = dims.parse::<usize>() {
                config.vector_store.embedding_dims = dims;
                config.embedder.dims = dims;
            }
        }
        if let Ok(model) = env::var("MEMORYX_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(base_url) = env::var("MEMORYX_LLM_BASE_URL") {
            config.llm.base_url = base_url;
        }
        if let Ok(model) = env::var("MEMORYX_EMBED_MODEL") {
            config.embedder.model = model;
        }
        if let Ok(base_url) = env::var("MEMORYX_EMBED_BASE_URL") {
            config.embedder.base_url = base_url;
        }

        if config.master_key.is_none() {
            tracing::info!("MEMORYX_MASTER_KEY not set, envelope encryption disabled process-wide");
        }

        config
    }

    /// Whether envelope encryption is enabled for this process (§4.2)
    pub fn encryption_enabled(&self) -> bool {
        self.master_key.is_some()
    }
}
