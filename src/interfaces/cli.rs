//! Command-line surface of the `reflect-rag` binary.
//!
//! Program output goes to stdout; diagnostics go through `tracing` on stderr.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::{
    application::services::{KeywordOverlapGate, RelevanceJudge},
    build_environment, demo_corpus, load_corpus_file, resolve_data_dir,
    settings::{AppConfig, ConfigManager, StorageBackend},
    DEMO_QUERY,
};

#[derive(Parser, Debug)]
#[command(
    name = "reflect-rag",
    version,
    about = "Retrieve context, judge its relevance, then answer or refuse."
)]
pub struct Cli {
    /// Explicit configuration file (defaults to <data-dir>/config.json).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Data directory (also REFLECT_RAG_DATA_DIR).
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a query from the corpus, or refuse when nothing relevant is retrieved.
    Ask(AskArgs),
    /// Show the relevance verdict for a single query/chunk pair.
    Judge(JudgeArgs),
    /// Print the effective configuration.
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question to answer.
    #[arg(default_value = DEMO_QUERY)]
    pub query: String,

    /// Corpus file with one document per line (defaults to the demo corpus).
    #[arg(long, value_name = "FILE")]
    pub corpus: Option<PathBuf>,

    /// Number of candidate chunks to retrieve.
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Distinct query terms a chunk must contain to count as relevant.
    #[arg(long)]
    pub min_overlap: Option<usize>,

    /// Index backend.
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,
}

#[derive(Args, Debug)]
pub struct JudgeArgs {
    pub query: String,
    pub chunk: String,

    #[arg(long)]
    pub min_overlap: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Persist the effective configuration to the config file.
    #[arg(long)]
    pub write: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sled,
}

/// Parses process arguments and dispatches.
pub fn run_from_args() -> Result<()> {
    Cli::parse().run()
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let data_dir = resolve_data_dir(self.data_dir.clone())?;
        let manager = match &self.config {
            Some(path) => ConfigManager::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ConfigManager::load(&data_dir),
        };

        match self.command {
            Command::Ask(args) => run_ask(args, manager, data_dir),
            Command::Judge(args) => run_judge(args, manager.current()),
            Command::Config(args) => run_config(args, &manager),
        }
    }
}

fn run_ask(args: AskArgs, manager: ConfigManager, data_dir: PathBuf) -> Result<()> {
    let config = manager.update(|config| apply_overrides(config, &args));
    let explicit_corpus = args.corpus.is_some();
    let corpus = match &args.corpus {
        Some(path) => load_corpus_file(path)?,
        None => demo_corpus(),
    };

    let handles = build_environment(config, data_dir)?;
    let indexed = handles.index.len().map_err(|err| anyhow!(err.to_string()))?;
    if indexed == 0 {
        handles
            .answerer
            .load_corpus(&corpus)
            .map_err(|err| anyhow!(err.to_string()))
            .context("failed to load corpus")?;
    } else {
        info!(
            target: "reflect_rag::cli",
            documents = indexed,
            ignored_corpus = explicit_corpus,
            "reusing persisted index"
        );
    }

    let outcome = handles
        .answerer
        .answer(&args.query)
        .map_err(|err| anyhow!(err.to_string()))?;
    println!("{outcome}");
    Ok(())
}

fn run_judge(args: JudgeArgs, config: AppConfig) -> Result<()> {
    let gate = KeywordOverlapGate::new(args.min_overlap.unwrap_or(config.retrieval.min_overlap));
    let terms = KeywordOverlapGate::query_terms(&args.query);
    let matched = KeywordOverlapGate::matched_terms(&args.query, &args.chunk);

    println!("Query terms: {:?}", terms.iter().collect::<Vec<_>>());
    println!(
        "Matched: {} of {} (threshold {})",
        matched.len(),
        terms.len(),
        gate.min_overlap()
    );
    println!("Relevant: {}", gate.is_relevant(&args.query, &args.chunk));
    Ok(())
}

fn run_config(args: ConfigArgs, manager: &ConfigManager) -> Result<()> {
    let current = manager.current();
    println!("{}", serde_json::to_string_pretty(&current)?);
    if args.write {
        manager
            .persist()
            .with_context(|| format!("failed to write {}", manager.path().display()))?;
        info!(target: "reflect_rag::cli", path = %manager.path().display(), "configuration written");
    }
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, args: &AskArgs) {
    if let Some(top_k) = args.top_k {
        config.retrieval.top_k = top_k;
    }
    if let Some(min_overlap) = args.min_overlap {
        config.retrieval.min_overlap = min_overlap;
    }
    match args.store {
        Some(StoreKind::Memory) => config.storage = StorageBackend::Memory,
        Some(StoreKind::Sled) if config.storage.id() != "sled" => {
            config.storage = StorageBackend::Sled { path: None }
        }
        _ => {}
    }
}
