use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::application::services::{DEFAULT_MIN_OVERLAP, DEFAULT_PREVIEW_CHARS, DEFAULT_TOP_K};
use crate::infrastructure::embeddings::{DEFAULT_SIMPLE_DIMENSIONS, DEFAULT_SIMPLE_MODEL};

/// Default filename used to persist configuration within the data directory.
const CONFIG_FILENAME: &str = "config.json";

/// Declarative list of embedding backends compiled into the binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Lightweight deterministic hash embedder (always available).
    Simple {
        #[serde(default = "default_simple_model")]
        model: String,
        #[serde(default = "default_simple_dim")]
        dimensions: usize,
    },
    /// Semantic embeddings powered by FastEmbed (feature gated).
    #[cfg(feature = "fastembed-engine")]
    FastEmbed {
        #[serde(default = "default_fastembed_model")]
        model: String,
    },
}

impl EmbeddingBackend {
    pub fn id(&self) -> &'static str {
        match self {
            EmbeddingBackend::Simple { .. } => "simple",
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => "fastembed",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            EmbeddingBackend::Simple { model, .. } => model,
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { model } => model,
        }
    }
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        #[cfg(feature = "fastembed-engine")]
        {
            EmbeddingBackend::FastEmbed {
                model: default_fastembed_model(),
            }
        }
        #[cfg(not(feature = "fastembed-engine"))]
        {
            EmbeddingBackend::Simple {
                model: default_simple_model(),
                dimensions: default_simple_dim(),
            }
        }
    }
}

/// Where the corpus index lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum StorageBackend {
    /// Process-lifetime index; the corpus is re-embedded on every run.
    #[default]
    Memory,
    /// Embedded sled database. `path` defaults to `<data_dir>/index`.
    Sled {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl StorageBackend {
    pub fn id(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Sled { .. } => "sled",
        }
    }
}

/// Retrieval and gating knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalSettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_overlap")]
    pub min_overlap: usize,
    #[serde(default = "default_preview_chars")]
    pub answer_preview_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_overlap: DEFAULT_MIN_OVERLAP,
            answer_preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// Complete persisted configuration payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub embedding: EmbeddingBackend,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub storage: StorageBackend,
}

/// Loads, holds and persists the active `AppConfig`.
pub struct ConfigManager {
    path: PathBuf,
    state: RwLock<AppConfig>,
}

impl ConfigManager {
    /// Create a manager rooted at `data_dir`. The JSON file will be located at
    /// `<data_dir>/config.json`; a missing or unreadable file yields defaults.
    pub fn load(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join(CONFIG_FILENAME);
        let config = fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<AppConfig>(&bytes).ok())
            .unwrap_or_default();

        Self {
            path,
            state: RwLock::new(config),
        }
    }

    /// Load an explicitly named file. Unlike [`ConfigManager::load`], read and
    /// parse failures are reported.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = fs::read(&path)?;
        let config = serde_json::from_slice::<AppConfig>(&bytes)?;

        Ok(Self {
            path,
            state: RwLock::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> AppConfig {
        self.state.read().clone()
    }

    /// Apply an in-memory change (e.g. CLI overrides) without persisting it.
    pub fn update(&self, apply: impl FnOnce(&mut AppConfig)) -> AppConfig {
        let mut guard = self.state.write();
        apply(&mut *guard);
        guard.clone()
    }

    /// Ensure the backing directory exists and write the JSON payload.
    pub fn persist(&self) -> std::io::Result<()> {
        let config = self.current();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(&config)?;
        fs::write(&self.path, payload)
    }
}

const fn default_simple_dim() -> usize {
    DEFAULT_SIMPLE_DIMENSIONS
}

fn default_simple_model() -> String {
    DEFAULT_SIMPLE_MODEL.to_string()
}

#[cfg(feature = "fastembed-engine")]
fn default_fastembed_model() -> String {
    crate::infrastructure::embeddings::DEFAULT_FASTEMBED_MODEL.to_string()
}

const fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

const fn default_min_overlap() -> usize {
    DEFAULT_MIN_OVERLAP
}

const fn default_preview_chars() -> usize {
    DEFAULT_PREVIEW_CHARS
}
