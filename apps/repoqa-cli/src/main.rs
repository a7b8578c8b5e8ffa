use std::env;

mod answer;
mod shell;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use repoqa_core::chunker::ChunkingConfig;
use repoqa_core::config::{expand_path, Config};
use repoqa_core::types::{FetchFilters, RepoRef};
use repoqa_embed::{default_embedder, DEFAULT_DIM};
use repoqa_github::GithubClient;
use repoqa_index::schema::NODES_TABLE;
use repoqa_index::IndexSearcher;
use repoqa_ingest::{IngestPipeline, PipelineConfig};

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <ingest|ask> [args...]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let (cmd, _args) = parse_args();
    match cmd.as_str() {
        "ingest" => ingest(&config).await?,
        "ask" => ask(&config).await?,
        _ => {
            eprintln!("Unknown command: {}", cmd);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn repo_from(config: &Config) -> RepoRef {
    RepoRef::new(
        config
            .get::<String>("github.owner")
            .unwrap_or_else(|_| "foundry-rs".to_string()),
        config
            .get::<String>("github.repo")
            .unwrap_or_else(|_| "foundry".to_string()),
        config
            .get::<String>("github.branch")
            .unwrap_or_else(|_| "master".to_string()),
    )
}

fn embedder_from(config: &Config) -> Result<std::sync::Arc<dyn repoqa_embed::Embedder>> {
    let base_url: String = config
        .get("embedding.base_url")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    let model: String = config
        .get("embedding.model")
        .unwrap_or_else(|_| "text-embedding-ada-002".to_string());
    let dim: usize = config.get("embedding.dim").unwrap_or(DEFAULT_DIM);
    default_embedder(&base_url, &model, dim)
}

async fn ingest(config: &Config) -> Result<()> {
    let filters = FetchFilters::new(
        config
            .get("github.directories")
            .unwrap_or_else(|_| vec!["docs".to_string()]),
        config
            .get("github.extensions")
            .unwrap_or_else(|_| vec![".md".to_string()]),
    );
    let cache_dir = expand_path(
        config
            .get::<String>("data.cache_dir")
            .unwrap_or_else(|_| "data/cache".to_string()),
    );
    let index_dir = expand_path(
        config
            .get::<String>("data.index_dir")
            .unwrap_or_else(|_| "data/index".to_string()),
    );
    let pipeline_config = PipelineConfig {
        repo: repo_from(config),
        filters,
        cache_dir,
        index_dir,
        batch_size: config.get("ingest.batch_size").unwrap_or(25),
        workers: config.get("ingest.workers").unwrap_or(0),
        chunking: ChunkingConfig::default(),
    };

    let github = GithubClient::from_env()?;
    let embedder = embedder_from(config)?;
    let pipeline = IngestPipeline::new(pipeline_config, github, embedder)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received; joining in-flight batches...");
            interrupt.cancel();
        }
    });

    let report = pipeline.run(&cancel).await?;
    println!(
        "✅ Ingest complete: {} documents, {} nodes indexed ({} batch(es) parsed, {} reused)",
        report.documents, report.nodes_indexed, report.batches_parsed, report.batches_skipped
    );
    Ok(())
}

async fn ask(config: &Config) -> Result<()> {
    let index_dir = expand_path(
        config
            .get::<String>("data.index_dir")
            .unwrap_or_else(|_| "data/index".to_string()),
    );
    let embedder = embedder_from(config)?;
    let searcher = IndexSearcher::open(&index_dir, NODES_TABLE, embedder).await?;
    let answerer = answer::Answerer::from_config(config)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });
    shell::run(&searcher, &answerer, &cancel).await
}
