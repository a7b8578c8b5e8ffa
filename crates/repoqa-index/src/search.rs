//! Opens a persisted index and serves similarity queries over it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};

use repoqa_embed::Embedder;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub doc_path: String,
    pub content: String,
    pub score: f32,
}

pub struct IndexSearcher {
    db: Connection,
    table_name: String,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for IndexSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSearcher")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

impl IndexSearcher {
    pub async fn open(
        index_dir: &Path,
        table_name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if !index_dir.exists() {
            bail!(
                "index not found at {}; run `repoqa ingest` first",
                index_dir.display()
            );
        }
        let db = connect(index_dir.to_string_lossy().as_ref())
            .execute()
            .await?;
        if !db
            .table_names()
            .execute()
            .await?
            .contains(&table_name.to_string())
        {
            bail!(
                "table '{table_name}' missing from index at {}",
                index_dir.display()
            );
        }
        Ok(Self {
            db,
            table_name: table_name.to_string(),
            embedder,
        })
    }

    pub async fn search(&self, query_text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query_embedding = self
            .embedder
            .embed_batch(&[query_text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for the query"))?;
        let table = self.db.open_table(&self.table_name).execute().await?;
        // Over-fetch candidates so the lexical rerank has room to work.
        let candidate_limit = limit * 10;
        let mut results = table
            .vector_search(query_embedding)?
            .limit(candidate_limit)
            .execute()
            .await?;

        let mut hits = Vec::new();
        while let Some(batch) = futures::TryStreamExt::try_next(&mut results).await? {
            let ids = string_column(&batch, "id")?;
            let doc_paths = string_column(&batch, "doc_path")?;
            let contents = string_column(&batch, "content")?;
            for i in 0..batch.num_rows() {
                let score = if let Some(col) = batch.column_by_name("_distance") {
                    1.0 - float_value(col, i)?
                } else if let Some(col) = batch.column_by_name("_score") {
                    float_value(col, i)?
                } else {
                    0.5
                };
                hits.push(SearchHit {
                    id: ids.value(i).to_string(),
                    doc_path: doc_paths.value(i).to_string(),
                    content: contents.value(i).to_string(),
                    score,
                });
            }
        }

        rerank(&mut hits, query_text);
        hits.truncate(limit);
        Ok(hits)
    }
}

// Blend vector similarity with plain term overlap, as a cheap rerank.
fn rerank(hits: &mut [SearchHit], query_text: &str) {
    let query_lower = query_text.to_lowercase();
    let query_words: Vec<&str> = query_lower.split_whitespace().collect();
    if query_words.is_empty() {
        return;
    }
    for hit in hits.iter_mut() {
        let content_lower = hit.content.to_lowercase();
        let mut term_score = 0.0;
        for word in &query_words {
            if content_lower.contains(word) {
                term_score += 1.0;
            }
        }
        hit.score = (hit.score * 0.7) + (term_score / query_words.len() as f32 * 0.3);
    }
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn string_column<'a>(
    batch: &'a arrow_array::RecordBatch,
    name: &str,
) -> Result<&'a arrow_array::StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<arrow_array::StringArray>())
        .ok_or_else(|| anyhow!("column '{name}' missing or not a string column"))
}

fn float_value(column: &Arc<dyn arrow_array::Array>, row: usize) -> Result<f32> {
    column
        .as_any()
        .downcast_ref::<arrow_array::Float32Array>()
        .map(|c| c.value(row))
        .ok_or_else(|| anyhow!("score column is not Float32"))
}
