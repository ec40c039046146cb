#![forbid(unsafe_code)]

//! sift binary: one invocation handles one platform event.
//!
//! The process always exits 0: recoverable failures become a single
//! `::warning::` annotation line so triage can never block item creation.
//! Non-zero exits are reserved for unrecoverable bugs (panics).

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use sift_core::Store;
use sift_embed::{GitHubModelsConfig, GitHubModelsEmbedder};
use sift_engine::report::TriageReport;
use sift_engine::{Engine, EngineConfig};
use sift_github::{Client, CommentManager, StateManager, parse_event_file, parse_repository};

const EMBED_MAX_RETRIES: u32 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sift: duplicate triage for GitHub issues and pull requests",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run() {
        log_warning(&err);
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SIFT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cfg = Config::from_env()?;
    let (owner, repo) = parse_repository(&cfg.repository)?;

    let index_path = std::env::temp_dir().join("triage-index.db");

    let state = StateManager::new(&owner, &repo, &cfg.token, &cfg.index_branch);
    let found = state.pull(&index_path).context("pull state")?;
    if !found {
        info!("index branch missing, starting from a fresh index");
    }

    let store = Store::open(&index_path).context("open store")?;

    let client = Client::new(&cfg.token).context("create github client")?;

    let mut event = parse_event_file(&cfg.event_name, &cfg.event_path, &cfg.repository)
        .context("parse event")?;
    if event.event_type == "pr" {
        // Fetch failures here only degrade the embeddable payload; the
        // pipeline still runs on title and body.
        match client.list_pull_request_files(&owner, &repo, event.number) {
            Ok(files) => event.files = files,
            Err(err) => log_warning(&err.context("fetch pr files")),
        }
        match client.get_pull_request_diff(&owner, &repo, event.number) {
            Ok(diff) => event.diff = diff,
            Err(err) => log_warning(&err.context("fetch pr diff")),
        }
    }

    let embedder = GitHubModelsEmbedder::new(GitHubModelsConfig {
        token: cfg.token.clone(),
        max_retries: EMBED_MAX_RETRIES,
        ..GitHubModelsConfig::default()
    })
    .context("create embedder")?;

    let engine = Engine {
        embedder,
        index: store,
        comments: CommentManager { api: client },
        formatter: TriageReport {
            duplicate_threshold: cfg.duplicate_threshold,
        },
        config: EngineConfig {
            similarity_threshold: cfg.similarity_threshold,
            duplicate_threshold: cfg.duplicate_threshold,
            max_results: cfg.max_results,
        },
    };
    engine.handle(&event).context("engine handle")?;

    // Close the database handle before the file is shipped off.
    drop(engine);

    state.push(&index_path).context("push state")?;

    Ok(())
}

fn log_warning(err: &anyhow::Error) {
    let message = format!("{err:#}").replace('\n', " ");
    println!("::warning::{}", message.trim());
}
