use repoqa_embed::{Embedder, FakeEmbedder, RemoteEmbedder};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fake_embedder_is_deterministic_and_normalized() {
    let embedder = FakeEmbedder::new(64);
    let texts = vec!["hello world".to_string()];
    let a = embedder.embed_batch(&texts).await.unwrap();
    let b = embedder.embed_batch(&texts).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a[0].len(), 64);
    let norm: f32 = a[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");
}

#[tokio::test]
async fn fake_embedder_distinguishes_inputs() {
    let embedder = FakeEmbedder::new(64);
    let vs = embedder
        .embed_batch(&["alpha bravo".to_string(), "charlie delta".to_string()])
        .await
        .unwrap();
    assert_ne!(vs[0], vs[1]);
}

#[tokio::test]
async fn remote_embedder_posts_model_and_inputs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer key123"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-embed",
            "input": ["one", "two"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"embedding": [1.0, 0.0, 0.0]},
                {"embedding": [0.0, 1.0, 0.0]},
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = RemoteEmbedder::new(server.uri(), "test-embed", 3, "key123").unwrap();
    let vectors = embedder
        .embed_batch(&["one".to_string(), "two".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn remote_embedder_rejects_count_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"embedding": [1.0, 0.0, 0.0]}]
        })))
        .mount(&server)
        .await;

    let embedder = RemoteEmbedder::new(server.uri(), "test-embed", 3, "key123").unwrap();
    let err = embedder
        .embed_batch(&["one".to_string(), "two".to_string()])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("1 vectors for 2 inputs"));
}

#[tokio::test]
async fn remote_embedder_propagates_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let embedder = RemoteEmbedder::new(server.uri(), "test-embed", 3, "key123").unwrap();
    let err = embedder
        .embed_batch(&["one".to_string()])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn empty_batch_short_circuits() {
    // No server at all: an empty batch must not touch the network.
    let embedder = RemoteEmbedder::new("http://127.0.0.1:1", "test-embed", 3, "key123").unwrap();
    let vectors = embedder.embed_batch(&[]).await.unwrap();
    assert!(vectors.is_empty());
}
