use std::time::Duration;

use tokio_util::sync::CancellationToken;

use repoqa_core::types::Document;
use repoqa_ingest::{batch_key, partition, BatchOutcome, WorkerPool};

fn doc(path: &str) -> Document {
    Document {
        path: path.to_string(),
        repo: "octo/repo".to_string(),
        branch: "main".to_string(),
        content: "hello world".to_string(),
    }
}

#[test]
fn partition_is_ordered_and_exhaustive() {
    for (count, batch_size) in [(0usize, 3usize), (1, 3), (5, 2), (6, 2), (7, 3)] {
        let documents: Vec<Document> = (0..count).map(|i| doc(&format!("docs/{i}.md"))).collect();
        let batches = partition(documents, batch_size).unwrap();

        assert_eq!(batches.len(), count.div_ceil(batch_size));
        let mut rebuilt = Vec::new();
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.index, i);
            assert!(batch.documents.len() <= batch_size);
            if i + 1 < batches.len() {
                // Only the final batch may be short.
                assert_eq!(batch.documents.len(), batch_size);
            }
            rebuilt.extend(batch.documents.iter().map(|d| d.path.clone()));
        }
        let expected: Vec<String> = (0..count).map(|i| format!("docs/{i}.md")).collect();
        assert_eq!(rebuilt, expected);
    }
}

#[test]
fn partition_rejects_zero_batch_size() {
    assert!(partition(vec![doc("docs/a.md")], 0).is_err());
}

#[test]
fn batch_keys_are_zero_padded() {
    assert_eq!(batch_key(0), "batch-00000");
    assert_eq!(batch_key(42), "batch-00042");
}

#[tokio::test]
async fn one_failing_job_does_not_stop_the_others() {
    let pool = WorkerPool::new(2);
    let cancel = CancellationToken::new();
    let batches: Vec<(usize, usize)> = (0..5).map(|i| (i, i)).collect();

    let run = pool
        .run(batches, &cancel, |i| async move {
            if i == 2 {
                anyhow::bail!("synthetic parse failure");
            }
            Ok(i + 10)
        })
        .await;

    assert_eq!(run.completed(), 4);
    assert_eq!(run.failed_indices(), vec![2]);
    assert_eq!(run.cancelled(), 0);
    assert_eq!(run.join_failures, 0);
}

#[tokio::test]
async fn cancellation_abandons_in_flight_and_skips_pending() {
    let pool = WorkerPool::new(1);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let batches: Vec<(usize, usize)> = (0..4).map(|i| (i, i)).collect();

    let run = pool
        .run(batches, &cancel, move |i| {
            let trigger = trigger.clone();
            async move {
                if i == 1 {
                    // Simulate an operator interrupt arriving mid-batch; the
                    // job never finishes on its own after that.
                    trigger.cancel();
                    std::future::pending::<()>().await;
                }
                Ok(1)
            }
        })
        .await;

    assert!(cancel.is_cancelled());
    assert_eq!(run.completed(), 1);
    assert_eq!(run.cancelled(), 3);
    assert!(run.failed_indices().is_empty());
}

#[tokio::test]
async fn completions_are_consumed_in_finish_order() {
    let pool = WorkerPool::new(4);
    let cancel = CancellationToken::new();
    // Batch 0 is by far the slowest, so it must not be the first outcome.
    let batches: Vec<(usize, u64)> = vec![(0, 200), (1, 5), (2, 5), (3, 5)];

    let run = pool
        .run(batches, &cancel, |delay_ms| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(1)
        })
        .await;

    assert_eq!(run.completed(), 4);
    let first = match &run.outcomes[0] {
        BatchOutcome::Completed { batch_index, .. } => *batch_index,
        other => panic!("unexpected first outcome: {other:?}"),
    };
    assert_ne!(first, 0);
}
