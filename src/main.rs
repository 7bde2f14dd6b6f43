//! # Apogee CLI (`apg`)
//!
//! The `apg` binary is the primary interface for Apogee. It provides commands
//! for index initialization, corpus ingestion, semantic search, grounded
//! question answering, and batch evaluation.
//!
//! ## Usage
//!
//! ```bash
//! apg --config ./config/apogee.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `apg init` | Create the SQLite vector store and run schema migrations |
//! | `apg sources` | Check corpus roots and count ingestible files |
//! | `apg ingest` | Scan, chunk, embed, and index the corpus |
//! | `apg search "<query>"` | Semantic search over indexed chunks |
//! | `apg ask "<question>"` | Answer a question grounded in retrieved documents |
//! | `apg eval --questions <file>` | Score answers over a batch of test questions |
//! | `apg stats` | Index overview: counts and mission breakdown |
//! | `apg collections` | List collections stored in the index |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the vector store
//! apg init --config ./config/apogee.toml
//!
//! # First ingest (skip mode is the default and is idempotent)
//! apg ingest --config ./config/apogee.toml
//!
//! # Re-ingest after editing documents, replacing their indexed chunks
//! apg ingest --mode replace --config ./config/apogee.toml
//!
//! # Search within one mission
//! apg search "oxygen tank pressure" --mission apollo_13
//!
//! # Ask with the retrieved context printed first
//! apg ask "What happened to Apollo 13?" --show-context
//!
//! # Batch evaluation with a JSON question file
//! apg eval --questions questions.json --output results.json
//! ```

mod answer;
mod chunker;
mod config;
mod context;
mod db;
mod embedder;
mod error;
mod evaluate;
mod index;
mod ingest;
mod metadata;
mod migrate;
mod models;
mod progress;
mod scanner;
mod search;
mod stats;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::index::VectorIndex;
use crate::progress::ProgressMode;

/// Apogee CLI — retrieval-augmented question answering over historical
/// NASA mission documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/apogee.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "apg",
    about = "Apogee — retrieval-augmented question answering over NASA mission documents",
    version,
    long_about = "Apogee ingests historical NASA mission documents (flight transcripts, mission \
    reports, press kits), chunks and embeds them into a SQLite vector index, and answers \
    questions grounded in the retrieved passages."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/apogee.toml`. All corpus, chunking, embedding,
    /// retrieval, and answering settings are read from this file.
    #[arg(long, global = true, default_value = "./config/apogee.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the vector store.
    ///
    /// Creates the SQLite database file and the entries table. This command
    /// is idempotent — running it multiple times is safe.
    Init,

    /// Check corpus roots and count ingestible files.
    ///
    /// Shows which configured roots exist and how many files match the
    /// extension allowlist. Useful for verifying configuration before
    /// running an ingest.
    Sources,

    /// Ingest the corpus: scan, chunk, embed, and index.
    ///
    /// Walks every configured corpus root, splits documents into
    /// sentence-aligned chunks tagged with mission metadata, embeds them in
    /// batches, and reconciles the results into the vector store.
    Ingest {
        /// Update mode: `skip` (only new content), `update` (add new chunks
        /// for changed documents), or `replace` (delete and reindex each
        /// document).
        #[arg(long, default_value = "skip")]
        mode: String,

        /// Show document and chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,

        /// Continue past failed embedding batches instead of aborting the run.
        #[arg(long)]
        keep_going: bool,

        /// Progress reporting: `auto`, `off`, `human`, or `json`.
        /// Progress goes to stderr; `auto` enables human output on a TTY.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Semantic search over indexed chunks.
    ///
    /// Embeds the query and returns the closest chunks by cosine
    /// similarity, with scores, mission tags, and excerpts.
    Search {
        /// The search query string.
        query: String,

        /// Filter results to a single mission (e.g., `apollo_13`).
        #[arg(long)]
        mission: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a question grounded in retrieved documents.
    ///
    /// Retrieves the most relevant chunks, assembles them into a context
    /// block, and asks the configured chat model to answer from them.
    Ask {
        /// The question to answer.
        question: String,

        /// Restrict retrieval to a single mission (e.g., `apollo_13`).
        #[arg(long)]
        mission: Option<String>,

        /// Skip retrieval and answer from general knowledge only.
        #[arg(long)]
        no_context: bool,

        /// Print the assembled context block before the answer.
        #[arg(long)]
        show_context: bool,
    },

    /// Evaluate answer quality over a batch of test questions.
    ///
    /// Runs the full retrieve-and-answer flow for every question in the
    /// file and scores each answer (relevancy, ROUGE-L, BLEU, token F1).
    /// Writes a JSON report with per-question and aggregate metrics.
    Eval {
        /// Question file: `.json` (array of {question, category?, mission?})
        /// or `.txt` (one question per line).
        #[arg(long)]
        questions: PathBuf,

        /// Where to write the JSON results report.
        #[arg(long, default_value = "evaluation_results.json")]
        output: PathBuf,
    },

    /// Show index statistics.
    ///
    /// Document and chunk counts, store size, and the per-mission breakdown.
    Stats,

    /// List collections stored in the index.
    Collections,
}

/// Route diagnostics through `tracing`; `RUST_LOG` overrides the default
/// filter.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("apogee=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = VectorIndex::open(&cfg).await?;
            index.close().await;
            println!("Index initialized successfully.");
        }
        Commands::Sources => {
            stats::run_sources(&cfg)?;
        }
        Commands::Ingest {
            mode,
            dry_run,
            keep_going,
            progress,
        } => {
            let progress_mode = ProgressMode::parse(&progress)?;
            ingest::run_ingest(&cfg, &mode, dry_run, keep_going, progress_mode).await?;
        }
        Commands::Search {
            query,
            mission,
            top_k,
        } => {
            search::run_search(&cfg, &query, mission.as_deref(), top_k).await?;
        }
        Commands::Ask {
            question,
            mission,
            no_context,
            show_context,
        } => {
            answer::run_ask(&cfg, &question, mission.as_deref(), no_context, show_context).await?;
        }
        Commands::Eval { questions, output } => {
            evaluate::run_eval(&cfg, &questions, &output).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Collections => {
            stats::run_collections(&cfg).await?;
        }
    }

    Ok(())
}
