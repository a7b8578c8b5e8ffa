use repoqa_core::chunker::{ChunkingConfig, NodeParser};
use repoqa_core::error::Error;
use repoqa_core::types::{Document, FetchFilters};

fn doc(path: &str, content: &str) -> Document {
    Document {
        path: path.to_string(),
        repo: "foundry-rs/foundry".to_string(),
        branch: "master".to_string(),
        content: content.to_string(),
    }
}

#[test]
fn small_paragraph_becomes_one_node() {
    let parser = NodeParser::new(ChunkingConfig::default()).unwrap();
    let nodes = parser.parse_document(&doc("docs/a.md", "Short text")).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].content, "Short text");
    assert_eq!(nodes[0].id, "docs/a.md:0");
    assert_eq!(nodes[0].total_chunks, 1);
}

#[test]
fn paragraphs_split_on_blank_lines() {
    let parser = NodeParser::new(ChunkingConfig::default()).unwrap();
    let nodes = parser
        .parse_document(&doc("docs/a.md", "first\n\nsecond\n\n\n\nthird"))
        .unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[2].chunk_index, 2);
    assert!(nodes.iter().all(|n| n.total_chunks == 3));
}

#[test]
fn oversized_paragraph_splits_into_overlapping_windows() {
    let parser = NodeParser::new(ChunkingConfig::default()).unwrap();
    let long = vec!["word"; 900].join(" ");
    let nodes = parser.parse_document(&doc("docs/long.md", &long)).unwrap();
    assert!(nodes.len() > 1, "900 words must not fit in one node");
    // Overlapping windows: each window except the last carries 300 words.
    assert_eq!(nodes[0].content.split_whitespace().count(), 300);
}

#[test]
fn empty_path_fails_the_document() {
    let parser = NodeParser::new(ChunkingConfig::default()).unwrap();
    let err = parser.parse_document(&doc("", "text")).unwrap_err();
    assert!(matches!(err, Error::CorruptDocument { .. }));
}

#[test]
fn one_corrupt_document_fails_the_whole_batch() {
    let parser = NodeParser::new(ChunkingConfig::default()).unwrap();
    let batch = vec![doc("docs/a.md", "fine"), doc("", "broken")];
    assert!(parser.parse_batch(&batch).is_err());
}

#[test]
fn invalid_chunking_config_is_rejected() {
    assert!(NodeParser::new(ChunkingConfig {
        max_tokens: 0,
        overlap_percent: 0.2
    })
    .is_err());
    assert!(NodeParser::new(ChunkingConfig {
        max_tokens: 500,
        overlap_percent: 1.0
    })
    .is_err());
}

#[test]
fn filters_require_both_allow_lists() {
    let filters = FetchFilters::new(
        vec!["docs".to_string(), "cli".to_string()],
        vec![".md".to_string(), ".rs".to_string()],
    );
    assert!(filters.matches("docs/guide.md"));
    assert!(filters.matches("cli/src/main.rs"));
    assert!(!filters.matches("docs/logo.png"), "extension not allowed");
    assert!(!filters.matches("evm/src/lib.rs"), "directory not allowed");
    assert!(!filters.matches("README.md"), "root files have no directory");
    assert!(!filters.matches("docs/Makefile"), "no extension at all");
}
