#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Persisted vector index over parsed nodes.
//!
//! One LanceDB table in a dedicated directory, rebuilt wholesale by each
//! ingestion run and opened read-only by the query shell.

pub mod schema;
pub mod search;
pub mod writer;

pub use search::{IndexSearcher, SearchHit};
pub use writer::IndexWriter;
