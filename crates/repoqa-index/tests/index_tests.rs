use std::sync::Arc;

use repoqa_core::types::Node;
use repoqa_embed::{Embedder, FakeEmbedder};
use repoqa_index::schema::{EMBEDDING_DIM, NODES_TABLE};
use repoqa_index::{IndexSearcher, IndexWriter};

fn node(id: &str, doc_path: &str, content: &str, chunk_index: usize) -> Node {
    Node {
        id: id.to_string(),
        doc_path: doc_path.to_string(),
        repo: "foundry-rs/foundry".to_string(),
        branch: "master".to_string(),
        content: content.to_string(),
        chunk_index,
        total_chunks: 1,
    }
}

async fn embed_all(embedder: &dyn Embedder, nodes: &[Node]) -> Vec<Vec<f32>> {
    let texts: Vec<String> = nodes.iter().map(|n| n.content.clone()).collect();
    embedder.embed_batch(&texts).await.unwrap()
}

#[tokio::test]
async fn build_then_search_finds_relevant_node() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let index_dir = tmp.path().join("index");
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(EMBEDDING_DIM as usize));

    let nodes = vec![
        node("docs/fuzz.md:0", "docs/fuzz.md", "foundry fuzz testing options", 0),
        node("docs/anvil.md:0", "docs/anvil.md", "anvil local node configuration", 0),
        node("docs/cast.md:0", "docs/cast.md", "cast command reference", 0),
    ];
    let embeddings = embed_all(embedder.as_ref(), &nodes).await;

    let writer = IndexWriter::create(&index_dir, NODES_TABLE).await?;
    writer.build(&nodes, &embeddings).await?;

    let searcher = IndexSearcher::open(&index_dir, NODES_TABLE, embedder).await?;
    let hits = searcher.search("foundry fuzz testing options", 2).await?;
    assert!(!hits.is_empty());
    assert!(hits.len() <= 2);
    assert_eq!(hits[0].id, "docs/fuzz.md:0");
    Ok(())
}

#[tokio::test]
async fn rebuilding_replaces_the_previous_index() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let index_dir = tmp.path().join("index");
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(EMBEDDING_DIM as usize));

    let first = vec![
        node("a:0", "a", "alpha", 0),
        node("b:0", "b", "bravo", 0),
        node("c:0", "c", "charlie", 0),
    ];
    let writer = IndexWriter::create(&index_dir, NODES_TABLE).await?;
    writer
        .build(&first, &embed_all(embedder.as_ref(), &first).await)
        .await?;

    let second = vec![node("d:0", "d", "delta", 0)];
    let writer = IndexWriter::create(&index_dir, NODES_TABLE).await?;
    writer
        .build(&second, &embed_all(embedder.as_ref(), &second).await)
        .await?;

    let searcher = IndexSearcher::open(&index_dir, NODES_TABLE, embedder).await?;
    let hits = searcher.search("delta", 10).await?;
    assert_eq!(hits.len(), 1, "old rows must not survive a rebuild");
    assert_eq!(hits[0].id, "d:0");
    Ok(())
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let index_dir = tmp.path().join("index");
    let nodes = vec![node("a:0", "a", "alpha", 0)];
    let writer = IndexWriter::create(&index_dir, NODES_TABLE).await?;
    let err = writer.build(&nodes, &[vec![0.0; 8]]).await.unwrap_err();
    assert!(err.to_string().contains("dimension"));
    Ok(())
}

#[tokio::test]
async fn opening_a_missing_index_fails_with_guidance() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(EMBEDDING_DIM as usize));
    let err = IndexSearcher::open(&tmp.path().join("nope"), NODES_TABLE, embedder)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("repoqa ingest"));
}
