#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Read-only GitHub API client for the ingestion pipeline.
//!
//! Lists a branch's file tree recursively, applies the directory/extension
//! allow-lists, and fetches matching blobs with bounded request concurrency.
//! Fetching is all-or-nothing: any tree or blob failure aborts the whole
//! load, so partial document sets are never returned or cached downstream.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::Engine;
use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use repoqa_core::types::{Document, FetchFilters, RepoRef};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const CONCURRENT_BLOB_REQUESTS: usize = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

#[derive(Deserialize)]
struct BlobResponse {
    content: String,
    encoding: String,
}

#[derive(Deserialize)]
struct ContentsEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GithubClient {
    /// Builds a client with the given token (`None` for unauthenticated,
    /// harder rate-limited access).
    pub fn new(token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("repoqa/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_owned(),
            token,
        })
    }

    /// Builds a client using `GITHUB_TOKEN` from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var("GITHUB_TOKEN").ok())
    }

    /// Override the API base URL. Intended for tests only.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.with_context(|| format!("GET {url}"))?;
        if !response.status().is_success() {
            bail!("GitHub API returned HTTP {} for {url}", response.status());
        }
        response
            .json()
            .await
            .with_context(|| format!("decoding response from {url}"))
    }

    async fn tree(&self, repo: &RepoRef) -> Result<TreeResponse> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.base_url, repo.owner, repo.repo, repo.branch
        );
        self.get_json(&url).await
    }

    /// Returns the full ordered collection of documents matching `filters`
    /// on the given branch.
    pub async fn load_documents(
        &self,
        repo: &RepoRef,
        filters: &FetchFilters,
    ) -> Result<Vec<Document>> {
        let listing = self.tree(repo).await?;
        if listing.truncated {
            tracing::warn!(
                repo = %repo.full_name(),
                "tree listing was truncated by the API; some files may be missing"
            );
        }
        let matching: Vec<TreeEntry> = listing
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob" && filters.matches(&entry.path))
            .collect();
        tracing::info!(
            repo = %repo.full_name(),
            branch = %repo.branch,
            files = matching.len(),
            "fetching matching blobs"
        );

        let blob_futures = matching
            .into_iter()
            .map(|entry| self.fetch_blob(repo, entry));
        futures::stream::iter(blob_futures)
            .buffered(CONCURRENT_BLOB_REQUESTS)
            .try_collect()
            .await
    }

    async fn fetch_blob(&self, repo: &RepoRef, entry: TreeEntry) -> Result<Document> {
        let url = format!(
            "{}/repos/{}/{}/git/blobs/{}",
            self.base_url, repo.owner, repo.repo, entry.sha
        );
        let blob: BlobResponse = self.get_json(&url).await?;
        if blob.encoding != "base64" {
            bail!(
                "unexpected blob encoding '{}' for {}",
                blob.encoding,
                entry.path
            );
        }
        // The API wraps base64 payloads with newlines.
        let compact: String = blob.content.split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .with_context(|| format!("decoding blob for {}", entry.path))?;
        Ok(Document {
            path: entry.path,
            repo: repo.full_name(),
            branch: repo.branch.clone(),
            content: String::from_utf8_lossy(&bytes).to_string(),
        })
    }

    /// Lists the repository's top-level directories, in API order.
    pub async fn top_level_directories(&self, owner: &str, repo: &str) -> Result<Vec<String>> {
        let url = format!("{}/repos/{owner}/{repo}/contents", self.base_url);
        let entries: Vec<ContentsEntry> = self.get_json(&url).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == "dir")
            .map(|entry| entry.name)
            .collect())
    }

    /// Surveys the distinct file extensions present on the branch, sorted.
    pub async fn file_extensions(&self, repo: &RepoRef) -> Result<Vec<String>> {
        let listing = self.tree(repo).await?;
        let mut extensions = BTreeSet::new();
        for entry in &listing.tree {
            if entry.kind != "blob" {
                continue;
            }
            if let Some(ext) = std::path::Path::new(&entry.path)
                .extension()
                .and_then(|e| e.to_str())
            {
                extensions.insert(format!(".{ext}"));
            }
        }
        Ok(extensions.into_iter().collect())
    }
}
