//! Test: Parallel Mode - every handler at once

use crate::helpers::*;
use actionpipe::{DispatchOptions, Dispatcher, DispatcherConfig, ExecutionMode, HandlerConfig};
use serde_json::{json, Value};
use std::time::Duration;

fn parallel() -> DispatchOptions {
    DispatchOptions::new().with_mode(ExecutionMode::Parallel)
}

/// Three non-blocking handlers with different delays: the dispatch settles
/// after the slowest and keeps every result
#[tokio::test(start_paused = true)]
async fn test_parallel_waits_for_slowest() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    for (id, priority, delay) in [("p30", 30, 40), ("p20", 20, 5), ("p10", 10, 90)] {
        register_delayed(
            &dispatcher,
            "fetch",
            &log,
            id,
            delay,
            json!(id),
            HandlerConfig::new().with_priority(priority).non_blocking(),
        );
    }

    let started = tokio::time::Instant::now();
    let result = dispatcher
        .dispatch_with_result("fetch", Value::Null, parallel())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(90));
    assert_dispatch_completed(&result);
    assert_eq!(result.results.len(), 3);

    // Completion order first, priority order on request
    assert_invocation_order(&log, &["p20", "p30", "p10"]);
    let by_priority: Vec<_> = result
        .results_by_priority()
        .iter()
        .map(|r| r.handler_id.clone())
        .collect();
    assert_eq!(by_priority, vec!["p30", "p20", "p10"]);
}

/// All handlers start before any of them finishes
#[tokio::test(start_paused = true)]
async fn test_parallel_starts_everything_up_front() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_delayed(&dispatcher, "fetch", &log, "a", 50, Value::Null, HandlerConfig::new().with_priority(2));
    register_delayed(&dispatcher, "fetch", &log, "b", 50, Value::Null, HandlerConfig::new().with_priority(1));

    let started = tokio::time::Instant::now();
    dispatcher.dispatch_with_options("fetch", Value::Null, parallel()).await.unwrap();

    // Sequential execution would take 100ms
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(log.entries().len(), 2);
}

/// The first blocking failure rejects without waiting for the rest
#[tokio::test(start_paused = true)]
async fn test_parallel_fails_fast_on_blocking_failure() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_failing(&dispatcher, "fetch", "primary", 10, "timeout", HandlerConfig::new().with_priority(2));
    register_delayed(&dispatcher, "fetch", &log, "replica", 100, json!("late"), HandlerConfig::new().with_priority(1));

    let started = tokio::time::Instant::now();
    let err = dispatcher
        .dispatch_with_options("fetch", Value::Null, parallel())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), "timeout");
    assert!(started.elapsed() < Duration::from_millis(100));

    // Already-started work runs to completion
    settle(200).await;
    assert!(log.contains("replica"));
}

/// Non-blocking failures never fail a parallel dispatch
#[tokio::test]
async fn test_parallel_ignores_non_blocking_failure() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_failing(&dispatcher, "fetch", "cache", 0, "miss", HandlerConfig::new().non_blocking());
    register_delayed(&dispatcher, "fetch", &log, "origin", 5, json!("body"), HandlerConfig::new());

    let result = dispatcher
        .dispatch_with_result("fetch", Value::Null, parallel())
        .await
        .unwrap();

    assert_dispatch_completed(&result);
    assert_eq!(result.values(), vec![json!("body")]);
}

/// An abort is reported but cannot retract handlers already running
#[tokio::test(start_paused = true)]
async fn test_parallel_abort_is_reported() {
    let dispatcher = Dispatcher::with_config(
        DispatcherConfig::new().with_action_mode("fetch", ExecutionMode::Parallel),
    );
    let log = CallLog::new();

    dispatcher
        .register(
            "fetch",
            |_payload, controller| async move {
                controller.abort("quota exceeded");
                Ok(Value::Null)
            },
            HandlerConfig::new().with_id("quota").with_priority(10),
        )
        .unwrap();
    register_delayed(&dispatcher, "fetch", &log, "worker", 20, Value::Null, HandlerConfig::new());

    let result = dispatcher
        .dispatch_with_result("fetch", Value::Null, DispatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.execution_mode, ExecutionMode::Parallel);
    assert_dispatch_aborted(&result, "quota exceeded");

    settle(50).await;
    assert!(log.contains("worker"));
}
