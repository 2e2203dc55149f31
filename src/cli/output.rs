//! CLI output formatting

use crate::core::{DispatchState, ExecutionResult};
use crate::execution::{ActionStats, DispatchEvent};
use crate::script::HandlerScript;
use console::Emoji;
use serde_json::Value;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Format a dispatch state for display
pub fn format_state(state: DispatchState) -> String {
    match state {
        DispatchState::Init => style("INIT").dim().to_string(),
        DispatchState::Running => style("RUNNING").yellow().to_string(),
        DispatchState::Completed => style("COMPLETED").green().to_string(),
        DispatchState::Aborted => style("ABORTED").yellow().to_string(),
        DispatchState::Errored => style("ERRORED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a dispatch outcome for display
pub fn format_result(result: &ExecutionResult) -> String {
    let (icon, status) = if result.success {
        (&CHECK, style("completed").green().to_string())
    } else if result.aborted {
        (
            &WARN,
            format!(
                "{}: {}",
                style("aborted").yellow(),
                result.abort_reason.as_deref().unwrap_or_default()
            ),
        )
    } else {
        (
            &CROSS,
            format!(
                "{}: {}",
                style("failed").red(),
                result.error.as_deref().unwrap_or_default()
            ),
        )
    };

    let mut out = format!(
        "{} {} {} [{}] {} - {} handlers, {}ms",
        icon,
        style(short_id(&result.dispatch_id)).dim(),
        style(&result.action).bold(),
        result.execution_mode,
        status,
        style(result.handler_count).cyan(),
        result.duration_ms
    );

    for handler_result in result.results_by_priority() {
        out.push_str(&format!(
            "\n    {} ({}) = {}",
            style(&handler_result.handler_id).cyan(),
            handler_result.priority,
            format_value(&handler_result.value)
        ));
    }
    if let Some(value) = &result.termination_result {
        out.push_str(&format!("\n    {} {}", style("terminated with").dim(), format_value(value)));
    }
    out
}

/// Format a lifecycle event for display
pub fn format_dispatch_event(event: &DispatchEvent) -> String {
    match event {
        DispatchEvent::DispatchStarted {
            dispatch_id,
            action,
            mode,
            handler_count,
        } => format!(
            "{} Dispatching {} to {} handlers in {} mode ({})",
            ROCKET,
            style(action).bold(),
            handler_count,
            mode,
            style(short_id(dispatch_id)).dim()
        ),
        DispatchEvent::HandlerStarted {
            handler_id,
            priority,
            ..
        } => format!("{} {} ({})", SPINNER, style(handler_id).cyan(), priority),
        DispatchEvent::HandlerSkipped {
            handler_id, reason, ..
        } => format!("{} {} ({})", SKIP, style(handler_id).dim(), reason),
        DispatchEvent::HandlerCompleted { handler_id, .. } => {
            format!("{} {}", CHECK, style(handler_id).green())
        }
        DispatchEvent::HandlerFailed {
            handler_id,
            blocking,
            error,
            ..
        } => {
            if *blocking {
                format!("{} {}: {}", CROSS, style(handler_id).red(), style(error).dim())
            } else {
                format!(
                    "{} {} (non-blocking): {}",
                    WARN,
                    style(handler_id).yellow(),
                    style(error).dim()
                )
            }
        }
        DispatchEvent::PipelineJumped {
            from_handler,
            to_priority,
            ..
        } => format!(
            "{} {} → priority {}",
            INFO,
            style(from_handler).dim(),
            style(to_priority).cyan()
        ),
        DispatchEvent::DispatchCompleted {
            dispatch_id,
            action,
            state,
            duration_ms,
        } => format!(
            "{} Dispatch of {} ({}) {} in {}ms",
            INFO,
            style(action).bold(),
            style(short_id(dispatch_id)).dim(),
            format_state(*state),
            duration_ms
        ),
    }
}

/// Format one scripted handler for the `list` command
pub fn format_handler_line(handler: &HandlerScript) -> String {
    let mut flags = Vec::new();
    if !handler.blocking {
        flags.push("non-blocking".to_string());
    }
    if handler.once {
        flags.push("once".to_string());
    }
    if !handler.tags.is_empty() {
        flags.push(format!("tags: {}", handler.tags.join(", ")));
    }
    if let Some(condition) = &handler.when {
        flags.push(format!("when {} = {}", condition.field, condition.equals));
    }

    let mut line = format!(
        "{:>6}  {}",
        style(handler.priority).cyan(),
        style(&handler.id).bold()
    );
    if !flags.is_empty() {
        line.push_str(&format!(" {}", style(format!("[{}]", flags.join("; "))).dim()));
    }
    line
}

/// Format per-action statistics
pub fn format_stats(action: &str, stats: &ActionStats) -> String {
    format!(
        "  {}: {} dispatches ({} ok, {} aborted, {} errored), avg {:.1}ms",
        style(action).bold(),
        style(stats.dispatch_count).cyan(),
        style(stats.success_count).green(),
        style(stats.abort_count).yellow(),
        style(stats.error_count).red(),
        stats.avg_duration_ms
    )
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
