//! Splits fetched documents into embedding-sized nodes.

use crate::error::{Error, Result};
use crate::types::{Document, Node};

const WORDS_PER_WINDOW: usize = 300;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            overlap_percent: 0.2,
        }
    }
}

/// Parses documents into [`Node`]s: paragraphs pass through whole when they
/// fit under `max_tokens`, oversized paragraphs are split into overlapping
/// word windows.
pub struct NodeParser {
    config: ChunkingConfig,
}

impl NodeParser {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.max_tokens == 0 {
            return Err(Error::InvalidConfig(
                "chunking.max_tokens must be greater than zero".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&config.overlap_percent) {
            // An overlap of >= 100% would never advance the window.
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap_percent must be in [0, 1), got {}",
                config.overlap_percent
            )));
        }
        Ok(Self { config })
    }

    /// Parses every document in the batch, in order. A single corrupt
    /// document fails the whole batch; no partial output is returned.
    pub fn parse_batch(&self, documents: &[Document]) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for document in documents {
            nodes.extend(self.parse_document(document)?);
        }
        Ok(nodes)
    }

    pub fn parse_document(&self, document: &Document) -> Result<Vec<Node>> {
        if document.path.trim().is_empty() {
            return Err(Error::CorruptDocument {
                path: document.path.clone(),
                reason: "document has no path".to_string(),
            });
        }

        let mut nodes = Vec::new();
        let mut chunk_index = 0;
        for paragraph in document.content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if self.count_tokens(paragraph) <= self.config.max_tokens {
                nodes.push(self.make_node(document, paragraph.to_string(), chunk_index));
                chunk_index += 1;
            } else {
                for window in self.split_paragraph_with_overlap(paragraph) {
                    nodes.push(self.make_node(document, window, chunk_index));
                    chunk_index += 1;
                }
            }
        }
        let total_chunks = nodes.len();
        for node in &mut nodes {
            node.total_chunks = total_chunks;
        }
        Ok(nodes)
    }

    fn make_node(&self, document: &Document, content: String, chunk_index: usize) -> Node {
        Node {
            id: format!("{}:{}", document.path, chunk_index),
            doc_path: document.path.clone(),
            repo: document.repo.clone(),
            branch: document.branch.clone(),
            content,
            chunk_index,
            total_chunks: 0,
        }
    }

    // Rough estimate: one token per 0.75 words.
    fn count_tokens(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f32 / 0.75) as usize
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let overlap_words = (WORDS_PER_WINDOW as f32 * self.config.overlap_percent) as usize;
        let mut windows = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + WORDS_PER_WINDOW).min(words.len());
            windows.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap_words;
        }
        windows
    }
}
