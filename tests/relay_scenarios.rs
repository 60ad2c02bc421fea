//! End-to-end relay scenarios over the in-memory broker and registry.

#![allow(clippy::panic)]

mod common;

use std::collections::HashSet;
use std::time::Duration;

use serde_json::{Value, json};

use common::{WAIT, harness};
use fanout_relay::broker::Broker;
use fanout_relay::domain::{Message, SubscriberHandle};
use fanout_relay::registry::QueueRegistry;
use fanout_relay::service::{SendService, ShutdownCoordinator, WorkerExit};

async fn next_message(sink: &mut SubscriberHandle) -> Message {
    let Ok(Some(msg)) = tokio::time::timeout(WAIT, sink.recv()).await else {
        panic!("no message within {WAIT:?}");
    };
    msg
}

#[tokio::test]
async fn three_workers_each_relay_one_copy() {
    let h = harness();
    let mut sink = h.ctx.publisher.subscribe().await;
    let mut coordinator = ShutdownCoordinator::new(h.ctx.clone());
    let queues = coordinator.spawn_workers(3).await;
    assert_eq!(queues.len(), 3);

    let sender = SendService::new(h.ctx.clone());
    let Ok(report) = sender.send(&json!({"Rabbit": "Kafka"})).await else {
        panic!("send failed");
    };
    assert_eq!(report.bound_queues, 3);

    for _ in 0..3 {
        let msg = next_message(&mut sink).await;
        assert_eq!(Value::Object(msg), json!({"Rabbit": "Kafka"}));
    }
    assert!(
        tokio::time::timeout(Duration::from_millis(200), sink.recv())
            .await
            .is_err(),
        "received a duplicate delivery"
    );

    let report = coordinator.shutdown().await;
    assert_eq!(report.workers.len(), 3);
    for outcome in &report.workers {
        assert_eq!(outcome.delivered, 1, "worker {} delivery count", outcome.worker_id);
        assert_eq!(outcome.dropped, 0);
    }
}

#[tokio::test]
async fn send_with_no_registered_queues_still_publishes() {
    let h = harness();
    let sender = SendService::new(h.ctx.clone());

    let Ok(report) = sender.send(&json!({"Rabbit": "Kafka"})).await else {
        panic!("send failed");
    };
    assert_eq!(report.bound_queues, 0);
    assert_eq!(h.broker.bind_calls(), 0);
    assert_eq!(h.broker.publish_calls(), 1);
}

#[tokio::test]
async fn concurrent_workers_get_distinct_queue_names() {
    let h = harness();
    let mut coordinator = ShutdownCoordinator::new(h.ctx.clone());
    let queues = coordinator.spawn_workers(8).await;

    let distinct: HashSet<_> = queues.iter().collect();
    assert_eq!(distinct.len(), 8);
    let Ok(active) = h.registry.list_active().await else {
        panic!("list failed");
    };
    assert_eq!(active.len(), 8);

    let _ = coordinator.shutdown().await;
}

#[tokio::test]
async fn shutdown_drains_workers_and_empties_registry() {
    let h = harness();
    let mut sink = h.ctx.publisher.subscribe().await;
    let mut coordinator = ShutdownCoordinator::new(h.ctx.clone());
    let _ = coordinator.spawn_workers(4).await;
    let barrier = coordinator.barrier().clone();
    assert_eq!(barrier.remaining(), 4);

    let teardown = tokio::spawn(coordinator.run_until_cancelled());
    assert!(h.ctx.cancel.cancel());
    assert!(!h.ctx.cancel.cancel());

    let Ok(Ok(report)) = tokio::time::timeout(WAIT, teardown).await else {
        panic!("teardown did not complete");
    };
    assert!(report.drained);
    assert!(report.registry_swept);
    assert_eq!(barrier.remaining(), 0);
    assert!(h.registry.is_empty().await);
    assert!(h.broker.is_closed().await);
    assert!(sink.recv().await.is_none());
    assert!(!h.ctx.publisher.shutdown_all().await);
}

#[tokio::test]
async fn malformed_frame_is_dropped_without_stopping_worker() {
    let h = harness();
    let mut sink = h.ctx.publisher.subscribe().await;
    let mut coordinator = ShutdownCoordinator::new(h.ctx.clone());
    let queues = coordinator.spawn_workers(1).await;
    let Some(queue) = queues.first() else {
        panic!("worker did not start");
    };

    assert!(h.broker.inject(queue, b"{\"truncated\":".to_vec()).await);
    assert!(h.broker.inject(queue, b"[1,2]".to_vec()).await);
    assert!(h.broker.inject(queue, br#"{"after":"garbage"}"#.to_vec()).await);

    let msg = next_message(&mut sink).await;
    assert_eq!(msg.get("after"), Some(&json!("garbage")));

    let report = coordinator.shutdown().await;
    let Some(outcome) = report.workers.first() else {
        panic!("missing worker outcome");
    };
    assert_eq!(outcome.dropped, 2);
    assert_eq!(outcome.delivered, 1);
}

#[tokio::test]
async fn broker_closing_one_stream_leaves_siblings_running() {
    let h = harness();
    let mut coordinator = ShutdownCoordinator::new(h.ctx.clone());
    let queues = coordinator.spawn_workers(2).await;
    let (Some(first), Some(second)) = (queues.first(), queues.get(1)) else {
        panic!("workers did not start");
    };

    h.broker.drop_queue(first).await;
    let barrier = coordinator.barrier().clone();
    let Ok(()) = tokio::time::timeout(WAIT, async {
        while barrier.remaining() > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    else {
        panic!("closed-stream worker did not finish");
    };

    let Ok(active) = h.registry.list_active().await else {
        panic!("list failed");
    };
    assert!(!active.contains(first));
    assert!(active.contains(second));
    assert!(!h.ctx.cancel.is_cancelled());

    let report = coordinator.shutdown().await;
    let exits: HashSet<_> = report.workers.iter().map(|o| o.exit).collect();
    assert!(exits.contains(&WorkerExit::StreamClosed));
    assert!(exits.contains(&WorkerExit::Cancelled));
}

#[tokio::test]
async fn registry_delete_twice_is_harmless() {
    let h = harness();
    let Ok(name) = h.registry.generate_and_register().await else {
        panic!("generate failed");
    };
    assert!(h.registry.delete(&name).await.is_ok());
    assert!(h.registry.delete(&name).await.is_ok());
}
