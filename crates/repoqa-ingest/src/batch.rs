//! Deterministic partitioning of the document collection into batches.

use repoqa_core::error::{Error, Result};
use repoqa_core::types::Document;

/// Cache key of the full fetched document collection.
pub const DOCUMENTS_KEY: &str = "documents";
pub const KIND_DOCUMENTS: &str = "documents";
pub const KIND_NODE_BATCH: &str = "node_batch";

/// An ordered slice of the document collection, processed as one parallel
/// work unit. Batches are disjoint and their concatenation in ascending
/// index order reproduces the full collection.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub documents: Vec<Document>,
}

/// Cache key owned exclusively by the batch with the given index.
pub fn batch_key(index: usize) -> String {
    format!("batch-{index:05}")
}

/// Splits `documents` into ordered batches of at most `batch_size` each.
pub fn partition(documents: Vec<Document>, batch_size: usize) -> Result<Vec<Batch>> {
    if batch_size == 0 {
        return Err(Error::InvalidConfig(
            "ingest.batch_size must be greater than zero".to_string(),
        ));
    }
    let mut batches = Vec::new();
    let mut remaining = documents.into_iter().peekable();
    let mut index = 0;
    while remaining.peek().is_some() {
        let documents: Vec<Document> = remaining.by_ref().take(batch_size).collect();
        batches.push(Batch { index, documents });
        index += 1;
    }
    Ok(batches)
}
