//! Integration tests for the dispatch pool with shared test handlers.

use std::sync::Arc;

use anyhow::Result;
use hookrelay_core::RawEvent;
use hookrelay_delivery::{DispatchPool, PoolConfig, Saver};
use hookrelay_testing::{message_event, CapturingHandler, PanickingHandler, WAIT_TIMEOUT};
use serde_json::json;

fn good_event(n: usize) -> RawEvent {
    message_event(n.to_string(), &[("x-seq", json!(n))], json!({ "n": n }))
}

#[tokio::test]
async fn malformed_payload_does_not_stop_other_messages() -> Result<()> {
    hookrelay_testing::init_tracing();
    let handler = CapturingHandler::new();
    let mut pool = DispatchPool::new(
        PoolConfig { worker_count: 3, queue_capacity: None },
        "test-source",
        Arc::new(handler.clone()),
        Saver::disabled().handle(),
    )?;
    pool.spawn_workers();

    for n in 0..5 {
        pool.submit(good_event(n)).await?;
    }
    pool.submit(RawEvent::message("bad", "{not json")).await?;
    pool.submit(RawEvent::message("array", "[1,2,3]")).await?;
    for n in 5..10 {
        pool.submit(good_event(n)).await?;
    }

    pool.stop_all().await?;

    assert_eq!(handler.count(), 10);
    let stats = pool.stats();
    assert_eq!(stats.events_processed, 12);
    assert_eq!(stats.events_failed, 2);
    assert_eq!(pool.live_worker_count(), 0);
    Ok(())
}

#[tokio::test]
async fn panicking_handler_leaves_pool_at_full_strength() -> Result<()> {
    let handler = PanickingHandler::new("boom");
    let mut pool = DispatchPool::new(
        PoolConfig { worker_count: 2, queue_capacity: None },
        "test-source",
        Arc::new(handler.clone()),
        Saver::disabled().handle(),
    )?;
    pool.spawn_workers();

    pool.submit(message_event("1", &[], json!("boom"))).await?;
    pool.submit(good_event(2)).await?;
    pool.submit(message_event("3", &[], json!("boom"))).await?;
    pool.submit(good_event(4)).await?;

    let seen = handler.captured().wait_for(2, WAIT_TIMEOUT).await;
    assert_eq!(seen.len(), 2);
    assert_eq!(pool.live_worker_count(), 2);

    pool.stop_all().await?;
    assert_eq!(pool.stats().events_failed, 2);
    Ok(())
}

#[tokio::test]
async fn stop_all_drains_everything_queued_first() -> Result<()> {
    let handler = CapturingHandler::new();
    let mut pool = DispatchPool::new(
        PoolConfig { worker_count: 4, queue_capacity: Some(8) },
        "test-source",
        Arc::new(handler.clone()),
        Saver::disabled().handle(),
    )?;
    pool.spawn_workers();

    let dispatch = pool.handle();
    let producer = tokio::spawn(async move {
        for n in 0..50 {
            dispatch.submit(good_event(n)).await?;
            if n % 10 == 0 {
                dispatch.submit(RawEvent::ping(n.to_string())).await?;
            }
        }
        hookrelay_delivery::Result::Ok(())
    });
    producer.await??;

    pool.stop_all().await?;

    assert_eq!(handler.count(), 50);
    assert_eq!(pool.stats().messages_handled, 50);
    assert!(!pool.has_active_workers());
    Ok(())
}

#[tokio::test]
async fn messages_are_saved_before_decoding() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("saved.txt");
    let saver = Saver::open(&path).await?;
    let handler = CapturingHandler::new();

    let mut pool = DispatchPool::new(
        PoolConfig { worker_count: 1, queue_capacity: None },
        "test-source",
        Arc::new(handler.clone()),
        saver.handle(),
    )?;
    pool.spawn_workers();

    let good = good_event(1);
    pool.submit(good.clone()).await?;
    pool.submit(RawEvent::message("2", "{not json")).await?;
    pool.submit(RawEvent::ping("3")).await?;

    pool.stop_all().await?;
    let written = saver.stop_and_wait().await?;

    assert_eq!(written, 2);
    let contents = tokio::fs::read_to_string(&path).await?;
    assert_eq!(contents, format!("{}\n{{not json\n", good.data));
    assert_eq!(handler.count(), 1);
    Ok(())
}

#[tokio::test]
async fn worker_lifecycle_is_only_logged_at_trace() -> Result<()> {
    let run_pool = || async {
        let mut pool = DispatchPool::new(
            PoolConfig { worker_count: 2, queue_capacity: None },
            "test-source",
            Arc::new(CapturingHandler::new()),
            Saver::disabled().handle(),
        )?;
        pool.spawn_workers();
        pool.stop_all().await?;
        anyhow::Ok(())
    };

    let (verbose, guard) = hookrelay_testing::capture_logs("hookrelay_delivery=debug");
    run_pool().await?;
    drop(guard);
    assert!(verbose.contains("dispatch workers spawned"));
    assert!(!verbose.contains("dispatch worker starting"));
    assert!(!verbose.contains("dispatch worker stopped"));

    let (detailed, guard) = hookrelay_testing::capture_logs("hookrelay_delivery=trace");
    run_pool().await?;
    drop(guard);
    assert!(detailed.contains("dispatch worker starting"));
    assert!(detailed.contains("dispatch worker stopped"));
    Ok(())
}
