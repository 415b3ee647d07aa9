use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod settings;

use application::services::{
    AnswererConfig, EmbeddingEngine, KeywordOverlapGate, ReflectiveAnswerer, VectorIndex,
};
use domain::Document;
#[cfg(feature = "fastembed-engine")]
use infrastructure::FastEmbedEngine;
use infrastructure::{MemoryVectorIndex, SimpleEmbedEngine, SledVectorIndex};
use settings::{AppConfig, EmbeddingBackend, StorageBackend};

/// Query used when the caller does not supply one.
pub const DEMO_QUERY: &str = "What is the capital of France?";

/// Built-in corpus used when no corpus file is given.
pub const DEMO_CORPUS: [&str; 3] = [
    "RAG combines retrieval with LLM generation.",
    "Chunking splits documents for embedding.",
    "The capital of France is Paris.",
];

/// Collaborators assembled from an `AppConfig`.
pub struct AppHandles {
    pub answerer: Arc<ReflectiveAnswerer>,
    pub index: Arc<dyn VectorIndex>,
    pub config: AppConfig,
    pub data_dir: PathBuf,
}

/// Entry point invoked from `main.rs`.
pub fn run() -> Result<()> {
    init_tracing();
    interfaces::cli::run_from_args()
}

pub fn init_tracing() {
    init_tracing_with_writer(std::io::stderr);
}

fn init_tracing_with_writer<W>(make_writer: fn() -> W)
where
    W: std::io::Write + Send + Sync + 'static,
{
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();

    let _ = INIT.get_or_init(|| {
        let filter = std::env::var("REFLECT_RAG_LOG").unwrap_or_else(|_| "info".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(make_writer)
            .compact()
            .try_init();
    });
}

/// Wires embedder, index and relevance gate according to `config`.
pub fn build_environment(config: AppConfig, data_dir: impl AsRef<Path>) -> Result<AppHandles> {
    let data_dir = data_dir.as_ref().to_path_buf();
    let answerer_config = AnswererConfig::try_new(
        config.retrieval.top_k,
        config.retrieval.answer_preview_chars,
    )
    .map_err(|err| anyhow!(err.to_string()))
    .context("invalid retrieval settings")?;

    let embedder = init_embedder(&config.embedding)
        .context("failed to initialise embedding backend")?;
    let index = init_index(&config.storage, &data_dir).context("failed to open vector index")?;
    let judge = Arc::new(KeywordOverlapGate::new(config.retrieval.min_overlap));

    let answerer = Arc::new(ReflectiveAnswerer::new(
        embedder,
        Arc::clone(&index),
        judge,
        answerer_config,
    ));

    info!(
        target: "reflect_rag::bootstrap",
        embedding = config.embedding.id(),
        model = config.embedding.model_name(),
        storage = config.storage.id(),
        top_k = config.retrieval.top_k,
        min_overlap = config.retrieval.min_overlap,
        "environment ready"
    );

    Ok(AppHandles {
        answerer,
        index,
        config,
        data_dir,
    })
}

fn init_embedder(backend: &EmbeddingBackend) -> Result<Arc<dyn EmbeddingEngine>> {
    match backend {
        EmbeddingBackend::Simple { model, dimensions } => {
            let engine = SimpleEmbedEngine::try_new(model.clone(), *dimensions)
                .map_err(|err| anyhow!(err.to_string()))?;
            Ok(Arc::new(engine))
        }
        #[cfg(feature = "fastembed-engine")]
        EmbeddingBackend::FastEmbed { model } => {
            let engine = FastEmbedEngine::try_new(model).map_err(|err| anyhow!(err.to_string()))?;
            Ok(Arc::new(engine))
        }
    }
}

fn init_index(storage: &StorageBackend, data_dir: &Path) -> Result<Arc<dyn VectorIndex>> {
    match storage {
        StorageBackend::Memory => Ok(Arc::new(MemoryVectorIndex::new())),
        StorageBackend::Sled { path } => {
            let path = path.clone().unwrap_or_else(|| data_dir.join("index"));
            let index = SledVectorIndex::open(&path)
                .map_err(|err| anyhow!(err.to_string()))
                .with_context(|| format!("failed to open sled index at {}", path.display()))?;
            Ok(Arc::new(index))
        }
    }
}

/// Resolves the data directory: explicit override, then `REFLECT_RAG_DATA_DIR`,
/// then the OS data dir.
pub fn resolve_data_dir(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    let from_env = || std::env::var_os("REFLECT_RAG_DATA_DIR").map(PathBuf::from);
    let dir = match override_dir.or_else(from_env) {
        Some(dir) => dir,
        None => directories::ProjectDirs::from("dev", "reflect-rag", "ReflectRag")
            .ok_or_else(|| anyhow!("unable to determine OS data dir"))?
            .data_dir()
            .to_path_buf(),
    };
    std::fs::create_dir_all(&dir).context("failed to create data directory")?;
    Ok(dir)
}

pub fn demo_corpus() -> Vec<Document> {
    Document::numbered(DEMO_CORPUS)
}

/// Reads a corpus file: one document per non-empty line, ids `d_<n>`.
pub fn load_corpus_file(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read corpus file {}", path.display()))?;
    Ok(parse_corpus(&raw))
}

fn parse_corpus(raw: &str) -> Vec<Document> {
    Document::numbered(
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty()),
    )
}
