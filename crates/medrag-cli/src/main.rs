//! MedRAG CLI - Command-line interface
//!
//! Usage:
//!   medrag ingest [--source <path>] [--index-dir <dir>]
//!   medrag ask <question>
//!   medrag inspect [--index-dir <dir>]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use medrag_core::config::{AppConfig, LoggingConfig};
use medrag_core::LlmClient;
use medrag_parser::TextSplitter;
use medrag_rag::{create_llm_client, Ingestor, RagPipeline};
use medrag_vector::{create_embedding_client, EmbeddingClient, LocalIndex, VectorSearchBackend};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medrag")]
#[command(about = "Medical reference book chatbot CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "MEDRAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index from the source document
    Ingest {
        /// Document to ingest (defaults to the configured source)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Directory to write the index to
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },
    /// Answer a question from the indexed document
    Ask {
        /// Question to ask
        question: String,

        /// Number of chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,

        /// Print the retrieved context before the answer
        #[arg(long)]
        show_context: bool,
    },
    /// Show what an index contains
    Inspect {
        /// Index directory
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let level = &logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("medrag={level},medrag_rag={level},medrag_vector={level},medrag_parser={level}")
            .into()
    });

    // Logs go to stderr so answers and reports on stdout stay clean.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load_from(cli.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging);

    let result = match cli.command {
        Commands::Ingest { source, index_dir } => {
            ingest(
                &config,
                source.unwrap_or_else(|| config.paths.source_document.clone()),
                index_dir.unwrap_or_else(|| config.paths.index_dir.clone()),
            )
            .await
        }
        Commands::Ask {
            question,
            k,
            show_context,
        } => ask(&config, &question, k, show_context).await,
        Commands::Inspect { index_dir } => {
            inspect(index_dir.unwrap_or_else(|| config.paths.index_dir.clone()))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn load_embedder(config: &AppConfig) -> anyhow::Result<Arc<dyn EmbeddingClient>> {
    let embedding = config.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || create_embedding_client(&embedding))
        .await
        .context("Embedding model loader panicked")?
        .context("Failed to load embedding model")?;
    Ok(Arc::from(embedder))
}

async fn ingest(config: &AppConfig, source: PathBuf, index_dir: PathBuf) -> anyhow::Result<()> {
    if !source.is_file() {
        bail!("Source document not found: {}", source.display());
    }

    let splitter = TextSplitter::from_config(&config.rag).context("Invalid splitter settings")?;
    let embedder = load_embedder(config).await?;

    let ingestor = Ingestor::new(embedder, splitter, config.embedding.batch_size);
    let report = ingestor
        .ingest(&source, &index_dir)
        .await
        .with_context(|| format!("Failed to ingest {}", source.display()))?;

    println!(
        "Indexed {} chunks from {} pages ({} dims) into {} in {} ms",
        report.chunks,
        report.pages,
        report.dimension,
        report.index_path.display(),
        report.elapsed_ms
    );
    Ok(())
}

async fn ask(
    config: &AppConfig,
    question: &str,
    k: Option<usize>,
    show_context: bool,
) -> anyhow::Result<()> {
    let index_dir = &config.paths.index_dir;
    if !LocalIndex::exists(index_dir) {
        bail!("Vector database not initialized. Run `medrag ingest` first.");
    }

    let llm_client: Arc<dyn LlmClient> = Arc::from(create_llm_client(&config.llm)?);
    let embedder = load_embedder(config).await?;
    let index = LocalIndex::open_for(index_dir, embedder.model_name(), embedder.dimension())
        .with_context(|| format!("Failed to open index at {}", index_dir.display()))?;

    let search = VectorSearchBackend::new(embedder, Arc::new(index));
    let pipeline = RagPipeline::new(llm_client, k.unwrap_or(config.rag.top_k))
        .with_search(Arc::new(search));

    let answer = if show_context {
        let context = pipeline.get_relevant_context(question, pipeline.top_k()).await?;
        println!("--- context ---\n{context}\n---------------");
        pipeline.chat_with_model(question, &context).await?
    } else {
        pipeline.answer(question).await?
    };
    println!("{answer}");
    Ok(())
}

/// Summary printed by `inspect`
#[derive(Serialize)]
struct IndexSummary {
    index_file: PathBuf,
    embedding_model: String,
    dimension: usize,
    created_at: String,
    source: Option<String>,
    chunks: usize,
    pages: usize,
}

fn inspect(index_dir: PathBuf) -> anyhow::Result<()> {
    let index = LocalIndex::open(&index_dir)
        .with_context(|| format!("Failed to open index at {}", index_dir.display()))?;
    let manifest = index.manifest();

    let pages: BTreeSet<u32> = index.entries().iter().map(|e| e.metadata.page).collect();
    let summary = IndexSummary {
        index_file: LocalIndex::file_path(&index_dir),
        embedding_model: manifest.embedding_model.clone(),
        dimension: manifest.dimension,
        created_at: manifest.created_at.to_rfc3339(),
        source: manifest.source.clone(),
        chunks: index.len(),
        pages: pages.len(),
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
