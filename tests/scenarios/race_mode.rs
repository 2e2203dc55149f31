//! Test: Race Mode - first success wins

use crate::helpers::*;
use actionpipe::{DispatchOptions, Dispatcher, ExecutionMode, HandlerConfig};
use serde_json::{json, Value};
use std::time::Duration;

fn race() -> DispatchOptions {
    DispatchOptions::new().with_mode(ExecutionMode::Race)
}

/// 'fast' at 10ms beats 'slow' at 100ms and the dispatch settles at ~10ms
#[tokio::test(start_paused = true)]
async fn test_fastest_handler_wins() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_delayed(&dispatcher, "search", &log, "slow", 100, json!("slow"), HandlerConfig::new().with_priority(10));
    register_delayed(&dispatcher, "search", &log, "fast", 10, json!("fast"), HandlerConfig::new().with_priority(1));

    let started = tokio::time::Instant::now();
    let result = dispatcher
        .dispatch_with_result("search", Value::Null, race())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_dispatch_completed(&result);
    assert!(result.terminated);
    assert_eq!(result.termination_result, Some(json!("fast")));
    assert!(elapsed >= Duration::from_millis(10));
    assert!(elapsed < Duration::from_millis(100));

    // The loser is cancelled
    settle(200).await;
    assert_invocation_order(&log, &["fast"]);
}

/// A failing branch does not win; the next success does
#[tokio::test(start_paused = true)]
async fn test_failed_branch_does_not_win() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_failing(&dispatcher, "search", "broken", 5, "index corrupt", HandlerConfig::new());
    register_delayed(&dispatcher, "search", &log, "backup", 20, json!("backup hit"), HandlerConfig::new());

    let result = dispatcher
        .dispatch_with_result("search", Value::Null, race())
        .await
        .unwrap();

    assert_dispatch_completed(&result);
    assert_eq!(result.termination_result, Some(json!("backup hit")));
}

/// When every branch fails the race rejects
#[tokio::test]
async fn test_all_branches_failing_rejects() {
    let dispatcher = Dispatcher::new();

    register_failing(&dispatcher, "search", "a", 0, "a down", HandlerConfig::new());
    register_failing(&dispatcher, "search", "b", 5, "b down", HandlerConfig::new());

    let result = dispatcher
        .dispatch_with_result("search", Value::Null, race())
        .await
        .unwrap();

    assert_dispatch_failed(&result, "down");
    assert!(result.termination_result.is_none());
}

/// Non-blocking branches still reject the race when none of them succeeds
#[tokio::test(start_paused = true)]
async fn test_all_non_blocking_branches_failing_rejects() {
    let dispatcher = Dispatcher::new();

    register_failing(&dispatcher, "search", "mirror", 5, "mirror unreachable", HandlerConfig::new().non_blocking());
    register_failing(&dispatcher, "search", "replica", 10, "replica lagging", HandlerConfig::new().non_blocking());

    let result = dispatcher
        .dispatch_with_result("search", Value::Null, race())
        .await
        .unwrap();

    assert_dispatch_failed(&result, "mirror unreachable");
    assert!(result.termination_result.is_none());
    assert_eq!(dispatcher.action_stats("search").unwrap().error_count, 1);
}

/// A non-blocking failure does not matter once another branch wins
#[tokio::test(start_paused = true)]
async fn test_non_blocking_failure_loses_to_success() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_failing(&dispatcher, "search", "mirror", 5, "mirror unreachable", HandlerConfig::new().non_blocking());
    register_delayed(&dispatcher, "search", &log, "primary", 20, json!("primary hit"), HandlerConfig::new());

    let result = dispatcher
        .dispatch_with_result("search", Value::Null, race())
        .await
        .unwrap();

    assert_dispatch_completed(&result);
    assert_eq!(result.termination_result, Some(json!("primary hit")));
}

/// A winner that terminates explicitly keeps its termination value
#[tokio::test]
async fn test_winner_terminate_value_is_kept() {
    let dispatcher = Dispatcher::new();
    dispatcher
        .register(
            "search",
            |_payload, controller| async move {
                controller.terminate(json!({"source": "memory"}));
                Ok(json!("ignored"))
            },
            HandlerConfig::new().with_id("memory"),
        )
        .unwrap();

    let result = dispatcher
        .dispatch_with_result("search", Value::Null, race())
        .await
        .unwrap();

    assert_eq!(result.termination_result, Some(json!({"source": "memory"})));
    assert_eq!(result.values(), vec![json!("ignored")]);
}

/// A branch that aborts drops out of the race without failing it
#[tokio::test(start_paused = true)]
async fn test_aborting_branch_drops_out() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    dispatcher
        .register(
            "search",
            |_payload, controller| async move {
                controller.abort("not authorised for this index");
                Ok(Value::Null)
            },
            HandlerConfig::new().with_id("restricted"),
        )
        .unwrap();
    register_delayed(&dispatcher, "search", &log, "public", 10, json!("public hit"), HandlerConfig::new());

    let result = dispatcher
        .dispatch_with_result("search", Value::Null, race())
        .await
        .unwrap();

    assert_dispatch_completed(&result);
    assert!(!result.aborted);
    assert_eq!(result.termination_result, Some(json!("public hit")));
}
