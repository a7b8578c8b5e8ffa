//! Domain types shared by the fetch, parse and index stages.

use serde::{Deserialize, Serialize};

pub type NodeId = String;

/// One fetched source file from the target repository.
///
/// Documents are immutable once fetched: the fetcher produces them, the
/// batch parser consumes them, and the durable cache persists them verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Repository-relative path (e.g. `docs/guide.md`).
    pub path: String,
    /// `owner/name` of the source repository.
    pub repo: String,
    pub branch: String,
    pub content: String,
}

/// A chunk of a [`Document`] sized for embedding and retrieval.
///
/// - `id`: `"{doc_path}:{chunk_index}"`, unique within one ingestion run
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub doc_path: String,
    pub repo: String,
    pub branch: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// Identifies one branch of one hosted repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoRef {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Allow-list filters applied to the repository file tree.
///
/// Inclusion is allow-list-only: a file is kept iff its top-level directory
/// is listed in `directories` AND its extension is listed in `extensions`.
/// Files at the repository root have no top-level directory and are excluded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchFilters {
    pub directories: Vec<String>,
    /// Extensions with the leading dot, e.g. `.md`, `.rs`.
    pub extensions: Vec<String>,
}

impl FetchFilters {
    pub fn new(directories: Vec<String>, extensions: Vec<String>) -> Self {
        Self {
            directories,
            extensions,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let Some((top_level, _rest)) = path.split_once('/') else {
            return false;
        };
        if !self.directories.iter().any(|d| d == top_level) {
            return false;
        }
        let Some(ext) = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
        else {
            return false;
        };
        let dotted = format!(".{ext}");
        self.extensions.iter().any(|e| e == &dotted)
    }
}
