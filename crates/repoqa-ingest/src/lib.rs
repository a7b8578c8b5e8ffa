#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Resumable batch-ingestion pipeline: fetch, cache, parse in parallel,
//! embed, and build the persisted index.

pub mod batch;
pub mod pipeline;
pub mod pool;

pub use batch::{batch_key, partition, Batch, DOCUMENTS_KEY, KIND_DOCUMENTS, KIND_NODE_BATCH};
pub use pipeline::{IngestPipeline, IngestReport, PipelineConfig};
pub use pool::{BatchOutcome, PoolRun, WorkerPool};
