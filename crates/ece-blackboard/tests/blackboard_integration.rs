#![allow(clippy::unwrap_used, clippy::expect_used)]

use ece_blackboard::*;
use ece_core::TaskPayload;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// 1. read_latest_messages returns the last k posts in post order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn latest_messages_are_tail_in_post_order() {
    let bb = Blackboard::in_memory();
    for i in 0..10 {
        bb.post_message(format!("agent-{}", i % 3), format!("message {i}"))
            .await
            .unwrap();
    }

    for k in 1..=10 {
        let latest = bb.read_latest_messages(k).await.unwrap();
        assert_eq!(latest.len(), k);
        let expected: Vec<String> = (10 - k..10).map(|i| format!("message {i}")).collect();
        let got: Vec<String> = latest.into_iter().map(|m| m.content).collect();
        assert_eq!(got, expected, "k = {k}");
    }

    // Asking for more than exist returns everything.
    assert_eq!(bb.read_latest_messages(50).await.unwrap().len(), 10);
    assert_eq!(bb.message_count().await.unwrap(), 10);
}

// ---------------------------------------------------------------------------
// 2. Single-producer FIFO on one queue, independent of other queues
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_producer_tasks_dequeue_in_order() {
    let bb = Blackboard::in_memory();
    let shutdown = CancellationToken::new();

    for i in 0..5 {
        bb.post_task("scout_tasks", &TaskPayload::new("web_scrape").with_field("seq", i))
            .await
            .unwrap();
        bb.post_task("search_tasks", &TaskPayload::new("web_search").with_field("seq", 100 + i))
            .await
            .unwrap();
    }

    for i in 0..5 {
        let task = bb
            .dequeue_task_blocking("scout_tasks", &shutdown)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.fields["seq"], serde_json::json!(i));
    }
    assert_eq!(bb.queue_len("scout_tasks").await.unwrap(), 0);
    assert_eq!(bb.queue_len("search_tasks").await.unwrap(), 5);
}

// ---------------------------------------------------------------------------
// 3. The example scenario payload comes back unchanged
// ---------------------------------------------------------------------------

#[tokio::test]
async fn posted_task_is_dequeued_verbatim() {
    let bb = Blackboard::in_memory();
    let shutdown = CancellationToken::new();
    let task = TaskPayload::new("web_scrape").with_field("url", "http://example.com");

    bb.post_task("scout_tasks", &task).await.unwrap();
    let got = bb
        .dequeue_task_blocking("scout_tasks", &shutdown)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(got, task);
    assert_eq!(
        serde_json::to_value(&got).unwrap(),
        serde_json::json!({"type": "web_scrape", "url": "http://example.com"})
    );
    assert!(bb.try_dequeue_task("scout_tasks").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// 4. Concurrent consumers: every task is delivered exactly once
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_consumers_each_task_once() {
    let bb = Blackboard::in_memory();
    let shutdown = CancellationToken::new();
    let total = 40;

    let mut consumers = Vec::new();
    for _ in 0..4 {
        let bb = bb.clone();
        let shutdown = shutdown.clone();
        consumers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(task) = bb.dequeue_task_blocking("jobs", &shutdown).await.unwrap() {
                seen.push(task.fields["n"].as_i64().unwrap());
            }
            seen
        }));
    }

    for n in 0..total {
        bb.post_task("jobs", &TaskPayload::new("job").with_field("n", n))
            .await
            .unwrap();
    }

    // Wait for the queue to drain, then release the consumers.
    tokio::time::timeout(Duration::from_secs(5), async {
        while bb.queue_len("jobs").await.unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();

    let mut all = Vec::new();
    for consumer in consumers {
        all.extend(consumer.await.unwrap());
    }
    assert_eq!(all.len(), total as usize);
    let unique: HashSet<i64> = all.into_iter().collect();
    assert_eq!(unique.len(), total as usize);
}

// ---------------------------------------------------------------------------
// 5. A blocked consumer is released by shutdown without consuming anything
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_releases_blocked_consumer() {
    let bb = Blackboard::in_memory();
    let shutdown = CancellationToken::new();

    let waiter = {
        let bb = bb.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { bb.dequeue_task_blocking("idle", &shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(result.is_none());
}

// ---------------------------------------------------------------------------
// 6. File backend: log and undelivered tasks survive a restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_backend_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = BlackboardConfig {
        backend: StoreBackend::File,
        data_dir: dir.path().to_path_buf(),
        ..BlackboardConfig::default()
    };

    {
        let bb = Blackboard::open(&config).await.unwrap();
        bb.post_message("ScoutAgent", "first").await.unwrap();
        bb.post_message("DistillerAgent", "second").await.unwrap();
        bb.post_task("scout_tasks", &TaskPayload::new("web_scrape").with_field("url", "a"))
            .await
            .unwrap();
        bb.post_task("scout_tasks", &TaskPayload::new("web_scrape").with_field("url", "b"))
            .await
            .unwrap();
        let first = bb.try_dequeue_task("scout_tasks").await.unwrap().unwrap();
        assert_eq!(first.str_field("url"), Some("a"));
    }

    let bb = Blackboard::open(&config).await.unwrap();
    let messages = bb.read_latest_messages(2).await.unwrap();
    assert_eq!(messages[0].source_agent, "ScoutAgent");
    assert_eq!(messages[1].content, "second");

    let shutdown = CancellationToken::new();
    let remaining = bb
        .dequeue_task_blocking("scout_tasks", &shutdown)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remaining.str_field("url"), Some("b"));
    assert_eq!(bb.queue_len("scout_tasks").await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// 6b. File backend: two handles on one directory act as one blackboard
// ---------------------------------------------------------------------------

fn shared_config(dir: &std::path::Path) -> BlackboardConfig {
    BlackboardConfig {
        backend: StoreBackend::File,
        data_dir: dir.to_path_buf(),
        poll_interval_ms: 20,
        ..BlackboardConfig::default()
    }
}

#[tokio::test]
async fn blocked_consumer_sees_task_from_other_handle() {
    let dir = tempfile::tempdir().unwrap();
    let worker_side = Blackboard::open(&shared_config(dir.path())).await.unwrap();
    let producer_side = Blackboard::open(&shared_config(dir.path())).await.unwrap();

    let shutdown = CancellationToken::new();
    let consumer = {
        let bb = worker_side.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { bb.dequeue_task_blocking("scout_tasks", &shutdown).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let task = TaskPayload::new("web_scrape").with_field("url", "http://example.com");
    producer_side.post_task("scout_tasks", &task).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), consumer)
        .await
        .expect("task posted by the other handle was never delivered")
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(received, task);
    assert_eq!(producer_side.queue_len("scout_tasks").await.unwrap(), 0);
}

#[tokio::test]
async fn pop_keeps_tasks_appended_by_other_handle() {
    let dir = tempfile::tempdir().unwrap();
    {
        let seed = Blackboard::open(&shared_config(dir.path())).await.unwrap();
        seed.post_task("scout_tasks", &TaskPayload::new("web_scrape").with_field("url", "t1"))
            .await
            .unwrap();
    }

    let a = Blackboard::open(&shared_config(dir.path())).await.unwrap();
    let b = Blackboard::open(&shared_config(dir.path())).await.unwrap();
    b.post_task("scout_tasks", &TaskPayload::new("web_scrape").with_field("url", "t2"))
        .await
        .unwrap();
    b.post_message("CrewCli", "posted elsewhere").await.unwrap();

    let first = a.try_dequeue_task("scout_tasks").await.unwrap().unwrap();
    assert_eq!(first.str_field("url"), Some("t1"));
    assert_eq!(a.read_latest_messages(1).await.unwrap()[0].content, "posted elsewhere");

    let reopened = Blackboard::open(&shared_config(dir.path())).await.unwrap();
    assert_eq!(reopened.queue_len("scout_tasks").await.unwrap(), 1);
    let second = reopened.try_dequeue_task("scout_tasks").await.unwrap().unwrap();
    assert_eq!(second.str_field("url"), Some("t2"));
}

#[tokio::test]
async fn competing_handles_consume_each_task_once() {
    let dir = tempfile::tempdir().unwrap();
    let producer = Blackboard::open(&shared_config(dir.path())).await.unwrap();
    for i in 0..20 {
        producer
            .post_task("q", &TaskPayload::new("n").with_field("i", i))
            .await
            .unwrap();
    }

    let mut consumers = Vec::new();
    for _ in 0..3 {
        let bb = Blackboard::open(&shared_config(dir.path())).await.unwrap();
        consumers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(task) = bb.try_dequeue_task("q").await.unwrap() {
                seen.push(task.fields["i"].as_i64().unwrap());
            }
            seen
        }));
    }

    let mut all = Vec::new();
    for consumer in consumers {
        all.extend(consumer.await.unwrap());
    }
    all.sort_unstable();
    assert_eq!(all, (0..20).collect::<Vec<i64>>());
}

// ---------------------------------------------------------------------------
// 7. Custom stream key is honoured
// ---------------------------------------------------------------------------

#[tokio::test]
async fn custom_stream_key() {
    let store: Arc<dyn ListStore> = Arc::new(InMemoryListStore::new());
    let config = BlackboardConfig {
        stream_key: "ops_log".into(),
        backend: StoreBackend::Memory,
        ..BlackboardConfig::default()
    };
    let bb = Blackboard::connect(store.clone(), &config).await.unwrap();
    bb.post_message("Orchestrator", "hello").await.unwrap();

    assert_eq!(bb.stream_key(), "ops_log");
    assert_eq!(store.llen("ops_log").await.unwrap(), 1);
    assert_eq!(store.llen("blackboard_stream").await.unwrap(), 0);
}
