//! Test: Priority Jumps - skipping ahead in the pipeline

use crate::helpers::*;
use actionpipe::{
    DispatchError, DispatchEvent, DispatchOptions, Dispatcher, DispatcherConfig, HandlerConfig,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn register_jumper(dispatcher: &Dispatcher, log: &CallLog, id: &str, priority: i64, target: i64) {
    let log = log.clone();
    let name = id.to_string();
    dispatcher
        .register(
            "flow",
            move |_payload, controller| {
                let log = log.clone();
                let name = name.clone();
                async move {
                    log.push(name);
                    controller.jump_to_priority(target);
                    Ok(Value::Null)
                }
            },
            HandlerConfig::new().with_id(id).with_priority(priority),
        )
        .unwrap();
}

/// Jumping from 100 to 30 skips 80 and 50
#[tokio::test]
async fn test_jump_skips_handlers_in_between() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_jumper(&dispatcher, &log, "100", 100, 30);
    for priority in [80, 50, 30, 10] {
        register_logging(
            &dispatcher,
            "flow",
            &log,
            &priority.to_string(),
            HandlerConfig::new().with_priority(priority),
        );
    }

    dispatcher.dispatch("flow", Value::Null).await.unwrap();
    assert_invocation_order(&log, &["100", "30", "10"]);
}

/// A target between two priorities resumes at the next lower one
#[tokio::test]
async fn test_jump_to_missing_priority_resumes_below() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_jumper(&dispatcher, &log, "100", 100, 45);
    for priority in [80, 50, 30, 10] {
        register_logging(
            &dispatcher,
            "flow",
            &log,
            &priority.to_string(),
            HandlerConfig::new().with_priority(priority),
        );
    }

    dispatcher.dispatch("flow", Value::Null).await.unwrap();
    assert_invocation_order(&log, &["100", "30", "10"]);
}

/// Jumping below every handler ends the pipeline
#[tokio::test]
async fn test_jump_past_the_end_finishes() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();

    register_jumper(&dispatcher, &log, "50", 50, -1000);
    register_logging(&dispatcher, "flow", &log, "10", HandlerConfig::new().with_priority(10));

    let result = dispatcher
        .dispatch_with_result("flow", Value::Null, DispatchOptions::default())
        .await
        .unwrap();
    assert_dispatch_completed(&result);
    assert_invocation_order(&log, &["50"]);
}

/// A handler at 90 jumps to 25 while its counter is at most 3; handlers
/// between them are skipped on exactly those dispatches
#[tokio::test]
async fn test_counter_bounded_jump_across_dispatches() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();
    let counter = Arc::new(AtomicUsize::new(0));

    {
        let log = log.clone();
        let counter = Arc::clone(&counter);
        dispatcher
            .register(
                "flow",
                move |_payload, controller| {
                    let log = log.clone();
                    let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        log.push("90");
                        if count <= 3 {
                            controller.jump_to_priority(25);
                        }
                        Ok(Value::Null)
                    }
                },
                HandlerConfig::new().with_id("90").with_priority(90),
            )
            .unwrap();
    }
    for priority in [60, 40, 25, 10] {
        register_logging(
            &dispatcher,
            "flow",
            &log,
            &priority.to_string(),
            HandlerConfig::new().with_priority(priority),
        );
    }

    for dispatch in 1..=5 {
        log.clear();
        dispatcher.dispatch("flow", Value::Null).await.unwrap();
        if dispatch <= 3 {
            assert_invocation_order(&log, &["90", "25", "10"]);
        } else {
            assert_invocation_order(&log, &["90", "60", "40", "25", "10"]);
        }
    }
}

/// A handler that keeps jumping back to itself trips the loop guard
#[tokio::test]
async fn test_backward_jump_loop_is_detected() {
    let dispatcher = Dispatcher::with_config(DispatcherConfig::new().with_max_jumps(5));
    let log = CallLog::new();

    register_jumper(&dispatcher, &log, "retry", 10, 10);
    register_logging(&dispatcher, "flow", &log, "done", HandlerConfig::new().with_priority(1));

    let err = dispatcher.dispatch("flow", Value::Null).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::LoopDetected {
            action: "flow".to_string(),
            max_jumps: 5
        }
    );
    // The first run plus one run per allowed jump
    assert_eq!(log.count("retry"), 6);
    assert!(!log.contains("done"));

    let result = dispatcher
        .dispatch_with_result("flow", Value::Null, DispatchOptions::default())
        .await
        .unwrap();
    assert_dispatch_failed(&result, "priority jumps");
}

/// A bounded backward jump acts as a retry
#[tokio::test]
async fn test_bounded_backward_jump_reruns_handlers() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();
    let attempts = Arc::new(AtomicUsize::new(0));

    register_logging(&dispatcher, "flow", &log, "prepare", HandlerConfig::new().with_priority(20));
    {
        let log = log.clone();
        let attempts = Arc::clone(&attempts);
        dispatcher
            .register(
                "flow",
                move |_payload, controller| {
                    let log = log.clone();
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        log.push("check");
                        if attempt < 2 {
                            controller.jump_to_priority(20);
                        }
                        Ok(Value::Null)
                    }
                },
                HandlerConfig::new().with_id("check").with_priority(10),
            )
            .unwrap();
    }

    dispatcher.dispatch("flow", Value::Null).await.unwrap();
    assert_invocation_order(&log, &["prepare", "check", "prepare", "check"]);
}

/// With a jump limit of zero the first jump already fails the dispatch
#[tokio::test]
async fn test_zero_jump_limit_rejects_first_jump() {
    let dispatcher = Dispatcher::with_config(DispatcherConfig::new().with_max_jumps(0));
    let log = CallLog::new();

    register_jumper(&dispatcher, &log, "50", 50, 10);
    register_logging(&dispatcher, "flow", &log, "10", HandlerConfig::new().with_priority(10));

    let err = dispatcher.dispatch("flow", Value::Null).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::LoopDetected {
            action: "flow".to_string(),
            max_jumps: 0
        }
    );
    assert_invocation_order(&log, &["50"]);
}

/// A jump requested by a non-blocking handler is ignored
#[tokio::test(start_paused = true)]
async fn test_non_blocking_jump_is_ignored() {
    let dispatcher = Dispatcher::new();
    let log = CallLog::new();
    let events = Arc::new(Mutex::new(Vec::new()));

    {
        let events = Arc::clone(&events);
        dispatcher.add_event_listener(move |event| {
            if let DispatchEvent::PipelineJumped { from_handler, .. } = event {
                events.lock().push(from_handler);
            }
        });
    }
    dispatcher
        .register(
            "flow",
            |_payload, controller| async move {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                controller.jump_to_priority(-100);
                Ok(Value::Null)
            },
            HandlerConfig::new().with_id("background").with_priority(100).non_blocking(),
        )
        .unwrap();
    register_delayed(&dispatcher, "flow", &log, "80", 10, Value::Null, HandlerConfig::new().with_priority(80));
    for priority in [50, 10] {
        register_logging(
            &dispatcher,
            "flow",
            &log,
            &priority.to_string(),
            HandlerConfig::new().with_priority(priority),
        );
    }

    let result = dispatcher
        .dispatch_with_result("flow", Value::Null, DispatchOptions::default())
        .await
        .unwrap();

    assert_dispatch_completed(&result);
    assert_invocation_order(&log, &["80", "50", "10"]);
    assert!(events.lock().is_empty());
}
