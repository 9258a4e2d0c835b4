//! # KB Bridge CLI (`kbb`)
//!
//! The `kbb` binary is the primary interface for KB Bridge. It provides
//! commands for ledger initialization, document upload, search, a CLI
//! chatbot, and starting the REST server.
//!
//! ## Usage
//!
//! ```bash
//! kbb --config ./config/kbb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbb init` | Create the SQLite upload ledger |
//! | `kbb upload` | Upload documents from the data folder |
//! | `kbb search "<query>"` | Search the indexed corpus |
//! | `kbb ask "<question>"` | One-shot question, top-3 merged results |
//! | `kbb chat` | Interactive question loop |
//! | `kbb serve` | Start the REST server and dashboard |

mod cache;
mod chat;
mod config;
mod db;
mod error;
mod fingerprint;
mod ingest;
mod ledger;
mod models;
mod poller;
mod remote;
mod search;
mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// KB Bridge CLI — upload documents to a hosted knowledge base and search
/// them with comparable strategies.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kbb.example.toml` for a full example. The KB service
/// API key is read from the environment variable named in the config
/// (default `KB_API_KEY`).
#[derive(Parser)]
#[command(
    name = "kbb",
    about = "KB Bridge — a thin CLI/REST bridge over a hosted knowledge-base search service",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kbb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the upload ledger.
    ///
    /// Creates the SQLite database file and the files table. This command
    /// is idempotent — running it multiple times is safe.
    Init,

    /// Upload documents from the data folder.
    ///
    /// Files whose content is unchanged since their last confirmed upload
    /// are skipped without any remote call. New and changed files are
    /// submitted concurrently and polled until the KB service finishes
    /// processing them.
    Upload {
        /// Override the data directory from config.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Return as soon as the service accepts each file instead of
        /// waiting for processing to finish.
        #[arg(long)]
        no_wait: bool,
    },

    /// Search the indexed corpus.
    Search {
        /// The search query string.
        query: String,

        /// Search strategy: `semantic`, `hybrid`, or `merged`.
        #[arg(long, default_value = "merged")]
        strategy: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Ask a question and print the top 3 results.
    Ask {
        /// The question to ask.
        question: String,
    },

    /// Start an interactive chat session. Type `exit` to end.
    Chat,

    /// Start the REST server and comparison dashboard.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.ledger.path).await?;
            ledger::run_migrations(&pool).await?;
            pool.close().await;
            println!("Ledger initialized successfully.");
        }
        Commands::Upload { dir, no_wait } => {
            ingest::run_upload(&cfg, dir, !no_wait).await?;
        }
        Commands::Search {
            query,
            strategy,
            limit,
        } => {
            search::run_search(&cfg, &query, &strategy, limit).await?;
        }
        Commands::Ask { question } => {
            chat::run_ask(&cfg, &question).await?;
        }
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
