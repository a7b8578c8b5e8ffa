//! Builds the persisted index from the ordered node sequence.

use anyhow::{bail, Result};
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::{connect, Connection};
use std::path::Path;
use std::sync::Arc;

use repoqa_core::types::Node;

use crate::schema::{build_node_schema, EMBEDDING_DIM};

const INSERT_BATCH_ROWS: usize = 1000;

pub struct IndexWriter {
    db: Connection,
    table_name: String,
}

impl IndexWriter {
    /// Clears `index_dir` and opens a fresh database there. An ingestion
    /// run fully replaces the previous index; readers opened afterwards see
    /// only the new one.
    pub async fn create(index_dir: &Path, table_name: &str) -> Result<Self> {
        if index_dir.exists() {
            std::fs::remove_dir_all(index_dir)?;
        }
        std::fs::create_dir_all(index_dir)?;
        let db = connect(index_dir.to_string_lossy().as_ref())
            .execute()
            .await?;
        Ok(Self {
            db,
            table_name: table_name.to_string(),
        })
    }

    /// Writes nodes and their embeddings, preserving input order.
    pub async fn build(&self, nodes: &[Node], embeddings: &[Vec<f32>]) -> Result<()> {
        if nodes.is_empty() {
            println!("No nodes to index");
            return Ok(());
        }
        if nodes.len() != embeddings.len() {
            bail!(
                "node/embedding count mismatch: {} vs {}",
                nodes.len(),
                embeddings.len()
            );
        }
        for embedding in embeddings {
            if embedding.len() != EMBEDDING_DIM as usize {
                bail!(
                    "embedding dimension {} does not match index dimension {}",
                    embedding.len(),
                    EMBEDDING_DIM
                );
            }
        }

        println!(
            "Indexing {} nodes into table: {}",
            nodes.len(),
            self.table_name
        );
        let pb = ProgressBar::new(nodes.len() as u64);
        pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} nodes ({percent}%) {msg}").unwrap().progress_chars("#>-"));

        let mut written = 0usize;
        for (node_rows, vector_rows) in nodes
            .chunks(INSERT_BATCH_ROWS)
            .zip(embeddings.chunks(INSERT_BATCH_ROWS))
        {
            self.insert_rows(node_rows, vector_rows).await?;
            written += node_rows.len();
            pb.set_position(written as u64);
        }
        pb.finish_with_message("index build complete");
        tracing::info!(nodes = written, table = %self.table_name, "index persisted");
        Ok(())
    }

    async fn insert_rows(&self, nodes: &[Node], embeddings: &[Vec<f32>]) -> Result<()> {
        let record_batch = to_record_batch(nodes, embeddings)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(
            vec![Ok(record_batch)].into_iter(),
            schema,
        ));
        if self
            .db
            .table_names()
            .execute()
            .await?
            .contains(&self.table_name)
        {
            self.db
                .open_table(&self.table_name)
                .execute()
                .await?
                .add(reader)
                .execute()
                .await?;
        } else {
            self.db
                .create_table(&self.table_name, reader)
                .execute()
                .await?;
        }
        Ok(())
    }
}

fn to_record_batch(nodes: &[Node], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
    let schema = build_node_schema();
    let mut ids = Vec::new();
    let mut doc_paths = Vec::new();
    let mut repos = Vec::new();
    let mut branches = Vec::new();
    let mut contents = Vec::new();
    let mut chunk_indices = Vec::new();
    let mut total_chunks = Vec::new();
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
    for (node, embedding) in nodes.iter().zip(embeddings.iter()) {
        ids.push(node.id.clone());
        doc_paths.push(node.doc_path.clone());
        repos.push(node.repo.clone());
        branches.push(node.branch.clone());
        contents.push(node.content.clone());
        chunk_indices.push(node.chunk_index as i32);
        total_chunks.push(node.total_chunks as i32);
        vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
    }
    let record_batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(doc_paths)),
            Arc::new(StringArray::from(repos)),
            Arc::new(StringArray::from(branches)),
            Arc::new(StringArray::from(contents)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(Int32Array::from(total_chunks)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<
                arrow_array::types::Float32Type,
                _,
                _,
            >(vectors.into_iter(), EMBEDDING_DIM)),
        ],
    )?;
    Ok(record_batch)
}
