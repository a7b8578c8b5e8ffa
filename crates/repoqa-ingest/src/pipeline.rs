//! Orchestrates one ingestion run end to end.
//!
//! Every stage consults the durable cache first, so a restarted run only
//! redoes work whose artifact is missing: the document collection is
//! fetched once, each batch is parsed once, and the index is rebuilt from
//! the cached node batches.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use repoqa_cache::DurableCache;
use repoqa_core::chunker::{ChunkingConfig, NodeParser};
use repoqa_core::types::{Document, FetchFilters, Node, RepoRef};
use repoqa_embed::Embedder;
use repoqa_github::GithubClient;
use repoqa_index::schema::NODES_TABLE;
use repoqa_index::IndexWriter;

use crate::batch::{batch_key, partition, Batch, DOCUMENTS_KEY, KIND_DOCUMENTS, KIND_NODE_BATCH};
use crate::pool::WorkerPool;

const EMBED_REQUEST_BATCH: usize = 64;

/// Explicit per-run configuration; the pipeline holds no process-wide state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub repo: RepoRef,
    pub filters: FetchFilters,
    pub cache_dir: PathBuf,
    pub index_dir: PathBuf,
    pub batch_size: usize,
    /// Parallel parse workers; 0 means "size to the CPU count".
    pub workers: usize,
    pub chunking: ChunkingConfig,
}

#[derive(Debug)]
pub struct IngestReport {
    pub documents: usize,
    pub total_batches: usize,
    pub batches_parsed: usize,
    pub batches_skipped: usize,
    pub nodes_indexed: usize,
}

pub struct IngestPipeline {
    config: PipelineConfig,
    cache: DurableCache,
    github: GithubClient,
    embedder: Arc<dyn Embedder>,
}

impl IngestPipeline {
    pub fn new(
        config: PipelineConfig,
        github: GithubClient,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        // Surface bad chunking/batch settings before any network work.
        NodeParser::new(config.chunking.clone())?;
        if config.batch_size == 0 {
            bail!("ingest.batch_size must be greater than zero");
        }
        let cache = DurableCache::open(&config.cache_dir)?;
        Ok(Self {
            config,
            cache,
            github,
            embedder,
        })
    }

    /// Runs fetch → parse → embed → index. Cancelling the token during the
    /// parse phase drains the worker pool and returns an error; completed
    /// batches stay cached and are skipped by the next run.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<IngestReport> {
        let documents = self.load_or_fetch_documents().await?;
        let document_count = documents.len();
        let batches = partition(documents, self.config.batch_size)?;
        let total_batches = batches.len();

        let mut to_parse: Vec<(usize, Batch)> = Vec::new();
        let mut skipped = 0usize;
        for batch in batches {
            let cached: Option<Vec<Node>> = self
                .cache
                .load_or_missing(&batch_key(batch.index), KIND_NODE_BATCH)?;
            if cached.is_some() {
                skipped += 1;
            } else {
                to_parse.push((batch.index, batch));
            }
        }
        tracing::info!(
            total_batches,
            skipped,
            to_parse = to_parse.len(),
            "batch plan ready"
        );

        let parsed = to_parse.len();
        if !to_parse.is_empty() {
            let pool = if self.config.workers == 0 {
                WorkerPool::with_available_parallelism()
            } else {
                WorkerPool::new(self.config.workers)
            };
            println!(
                "Parsing {} batch(es) on {} worker(s)",
                to_parse.len(),
                pool.workers()
            );

            let parser = Arc::new(NodeParser::new(self.config.chunking.clone())?);
            let cache = self.cache.clone();
            let run = pool
                .run(to_parse, cancel, move |batch: Batch| {
                    let parser = parser.clone();
                    let cache = cache.clone();
                    async move {
                        let nodes = parser.parse_batch(&batch.documents)?;
                        cache.save(&batch_key(batch.index), KIND_NODE_BATCH, &nodes)?;
                        Ok(nodes.len())
                    }
                })
                .await;

            if cancel.is_cancelled() {
                bail!(
                    "ingestion interrupted; {} completed batch(es) remain cached",
                    run.completed() + skipped
                );
            }
            if run.join_failures > 0 {
                bail!("{} worker task(s) were lost; rerun to retry", run.join_failures);
            }
            let failed = run.failed_indices();
            if !failed.is_empty() {
                bail!(
                    "{} batch(es) failed to parse: {:?}; rerun retries only those",
                    failed.len(),
                    failed
                );
            }
        }

        // Reassemble nodes in ascending batch order regardless of the order
        // workers finished in.
        let mut nodes: Vec<Node> = Vec::new();
        for index in 0..total_batches {
            let batch_nodes: Vec<Node> = self
                .cache
                .load(&batch_key(index), KIND_NODE_BATCH)
                .with_context(|| format!("loading parsed batch {index}"))?;
            nodes.extend(batch_nodes);
        }

        let embeddings = self.embed_nodes(&nodes).await?;
        let writer = IndexWriter::create(&self.config.index_dir, NODES_TABLE).await?;
        writer.build(&nodes, &embeddings).await?;

        Ok(IngestReport {
            documents: document_count,
            total_batches,
            batches_parsed: parsed,
            batches_skipped: skipped,
            nodes_indexed: nodes.len(),
        })
    }

    async fn load_or_fetch_documents(&self) -> Result<Vec<Document>> {
        if let Some(documents) = self
            .cache
            .load_or_missing::<Vec<Document>>(DOCUMENTS_KEY, KIND_DOCUMENTS)?
        {
            tracing::info!(
                documents = documents.len(),
                "using cached document collection"
            );
            return Ok(documents);
        }
        println!(
            "Fetching {} ({}) ...",
            self.config.repo.full_name(),
            self.config.repo.branch
        );
        let documents = self
            .github
            .load_documents(&self.config.repo, &self.config.filters)
            .await?;
        self.cache.save(DOCUMENTS_KEY, KIND_DOCUMENTS, &documents)?;
        println!("Fetched {} documents", documents.len());
        Ok(documents)
    }

    async fn embed_nodes(&self, nodes: &[Node]) -> Result<Vec<Vec<f32>>> {
        if nodes.is_empty() {
            return Ok(vec![]);
        }
        println!(
            "Embedding {} nodes via {}",
            nodes.len(),
            self.embedder.embedder_id()
        );
        let pb = ProgressBar::new(nodes.len() as u64);
        pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} nodes ({percent}%)").unwrap().progress_chars("#>-"));
        let mut embeddings = Vec::with_capacity(nodes.len());
        for chunk in nodes.chunks(EMBED_REQUEST_BATCH) {
            let texts: Vec<String> = chunk.iter().map(|n| n.content.clone()).collect();
            embeddings.extend(self.embedder.embed_batch(&texts).await?);
            pb.set_position(embeddings.len() as u64);
        }
        pb.finish_with_message("embedding complete");
        Ok(embeddings)
    }
}
