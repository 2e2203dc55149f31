use actionpipe::cli::commands::{ListCommand, RunCommand, ValidateCommand};
use actionpipe::cli::output::*;
use actionpipe::cli::{Cli, Command};
use actionpipe::core::ExecutionMode;
use actionpipe::script::ScriptConfig;
use anyhow::{Context, Result};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_script(cmd, cli.events).await?,
        Command::Validate(cmd) => validate_script(cmd)?,
        Command::List(cmd) => list_actions(cmd)?,
    }

    Ok(())
}

async fn run_script(cmd: &RunCommand, show_events: bool) -> Result<()> {
    let mut script = ScriptConfig::from_file(&cmd.file).context("Failed to load script")?;

    if !cmd.json {
        println!("{} Loaded script: {}", INFO, style(&script.name).bold());
    }

    if let Some(action) = &cmd.action {
        script.dispatches.retain(|d| &d.action == action);
        if script.dispatches.is_empty() {
            anyhow::bail!("Script has no dispatches of action '{}'", action);
        }
    }
    if let Some(mode) = cmd.mode {
        let mode = ExecutionMode::from(mode);
        for dispatch in &mut script.dispatches {
            dispatch.mode = Some(mode);
        }
    }

    let dispatcher = script
        .build_dispatcher()
        .context("Failed to register scripted handlers")?;

    if show_events && !cmd.json {
        dispatcher.add_event_listener(|event| {
            println!("{}", format_dispatch_event(&event));
        });
    }

    let results = script.run(&dispatcher).await?;
    let all_succeeded = results.iter().all(|r| r.success);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!();
        for result in &results {
            println!("{}", format_result(result));
        }

        println!("\n{} Statistics:", INFO);
        for action in dispatcher.registered_actions() {
            if let Some(stats) = dispatcher.action_stats(&action) {
                println!("{}", format_stats(&action, &stats));
            }
        }
    }

    if all_succeeded {
        if !cmd.json {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&script.name).bold(),
                style("successfully").green()
            );
        }
    } else {
        if !cmd.json {
            println!(
                "\n{} {} had failed dispatches",
                CROSS,
                style(&script.name).bold()
            );
        }
        let failed = results.iter().filter(|r| !r.success).count();
        error!("{} of {} dispatches did not complete", failed, results.len());
        std::process::exit(1);
    }

    Ok(())
}

fn validate_script(cmd: &ValidateCommand) -> Result<()> {
    if !cmd.json {
        println!("{} Validating script...", INFO);
    }

    match ScriptConfig::from_file(&cmd.file) {
        Ok(script) => {
            if cmd.json {
                let json = serde_json::to_string_pretty(&script)?;
                println!("{}", json);
                return Ok(());
            }
            let handlers: usize = script.actions.iter().map(|a| a.handlers.len()).sum();
            println!("{} Script is valid!", CHECK);
            println!("  Name: {}", style(&script.name).bold());
            if let Some(description) = &script.description {
                println!("  Description: {}", style(description).dim());
            }
            println!("  Default mode: {}", style(script.dispatcher.default_mode).cyan());
            println!("  Actions: {}", style(script.actions.len()).cyan());
            println!("  Handlers: {}", style(handlers).cyan());
            println!("  Dispatches: {}", style(script.dispatches.len()).cyan());
            Ok(())
        }
        Err(e) => {
            if cmd.json {
                let data = serde_json::json!({ "valid": false, "error": format!("{:#}", e) });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
            }
            std::process::exit(1);
        }
    }
}

fn list_actions(cmd: &ListCommand) -> Result<()> {
    let script = ScriptConfig::from_file(&cmd.file).context("Failed to load script")?;
    let dispatcher = script
        .build_dispatcher()
        .context("Failed to register scripted handlers")?;

    if cmd.json {
        let actions: Vec<_> = dispatcher
            .registered_actions()
            .into_iter()
            .map(|action| {
                serde_json::json!({
                    "mode": dispatcher.execution_mode_for(&action),
                    "handlers": dispatcher.handler_ids(&action),
                    "name": &action,
                })
            })
            .collect();
        let data = serde_json::json!({ "actions": actions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if script.actions.is_empty() {
        println!("{} No actions declared in {}", INFO, cmd.file);
        return Ok(());
    }

    println!("{} Actions in {}:", INFO, style(&script.name).bold());
    for action in &script.actions {
        println!(
            "\n  {} ({} mode)",
            style(&action.name).bold(),
            dispatcher.execution_mode_for(&action.name)
        );
        // Registry order is the order handlers run in
        for id in dispatcher.handler_ids(&action.name) {
            if let Some(handler) = action.handlers.iter().find(|h| h.id == id) {
                println!("    {}", format_handler_line(handler));
            }
        }
    }

    Ok(())
}
