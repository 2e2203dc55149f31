//! Test: Priority Order - sequential invocation order

use crate::helpers::*;
use actionpipe::{DispatchOptions, Dispatcher, HandlerConfig};
use serde_json::{json, Value};

/// Handlers at [100, 50, 10] run highest first regardless of registration order
#[tokio::test]
async fn test_handlers_run_by_descending_priority() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_logging(&dispatcher, "save", &log, "10", HandlerConfig::new().with_priority(10));
    register_logging(&dispatcher, "save", &log, "100", HandlerConfig::new().with_priority(100));
    register_logging(&dispatcher, "save", &log, "50", HandlerConfig::new().with_priority(50));

    dispatcher.dispatch("save", json!({})).await.unwrap();

    assert_invocation_order(&log, &["100", "50", "10"]);
}

/// Equal priorities keep registration order on every dispatch
#[tokio::test]
async fn test_equal_priorities_keep_registration_order() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    for id in ["first", "second", "third"] {
        register_logging(&dispatcher, "save", &log, id, HandlerConfig::new().with_priority(5));
    }

    for _ in 0..3 {
        log.clear();
        dispatcher.dispatch("save", Value::Null).await.unwrap();
        assert_invocation_order(&log, &["first", "second", "third"]);
    }
}

/// Priority defaults to zero and may be negative
#[tokio::test]
async fn test_default_and_negative_priorities() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_logging(&dispatcher, "save", &log, "late", HandlerConfig::new().with_priority(-5));
    register_logging(&dispatcher, "save", &log, "default", HandlerConfig::new());
    register_logging(&dispatcher, "save", &log, "early", HandlerConfig::new().with_priority(5));

    assert_eq!(dispatcher.handler_ids("save"), vec!["early", "default", "late"]);

    dispatcher.dispatch("save", Value::Null).await.unwrap();
    assert_invocation_order(&log, &["early", "default", "late"]);
}

/// Results are reported in completion order and can be re-sorted by priority
#[tokio::test]
async fn test_return_values_become_results() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_delayed(&dispatcher, "quote", &log, "base", 0, json!(100), HandlerConfig::new().with_priority(10));
    register_delayed(&dispatcher, "quote", &log, "tax", 0, json!(20), HandlerConfig::new().with_priority(5));
    register_logging(&dispatcher, "quote", &log, "silent", HandlerConfig::new().with_priority(1));

    let result = dispatcher
        .dispatch_with_result("quote", Value::Null, DispatchOptions::default())
        .await
        .unwrap();

    assert_dispatch_completed(&result);
    assert!(!result.terminated);
    assert_eq!(result.handler_count, 3);
    // Null return values are not recorded
    assert_eq!(result.values(), vec![json!(100), json!(20)]);
    assert_eq!(result.results[0].handler_id, "base");
    assert_eq!(result.results[0].priority, 10);
}

/// Dispatching an action without handlers resolves immediately
#[tokio::test]
async fn test_unknown_action_is_a_no_op() {
    let dispatcher = Dispatcher::new();

    let result = dispatcher
        .dispatch_with_result("nobody-listens", json!({"x": 1}), DispatchOptions::default())
        .await
        .unwrap();

    assert_dispatch_completed(&result);
    assert_eq!(result.handler_count, 0);
    assert!(result.results.is_empty());
}
