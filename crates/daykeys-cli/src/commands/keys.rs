//! Keystroke replay against the default command set.

use chrono::NaiveDate;
use clap::Args;
use daykeys_core::{
    CommandContext, CommandContextManager, CommandFocus, CommandResult, Config, KeyDispatch,
    KeyPress, ViewMode,
};
use serde::Serialize;

use super::load_registry;

#[derive(Args)]
pub struct KeysArgs {
    /// Keys to feed, in order. "g g" counts as two keys.
    #[arg(required = true)]
    keys: Vec<String>,
    /// Starting view (defaults to the configured view)
    #[arg(long)]
    view: Option<ViewMode>,
    /// Start focused on this block index
    #[arg(long)]
    block: Option<usize>,
    /// Start focused on this task index (requires --block)
    #[arg(long, requires = "block")]
    task: Option<usize>,
    /// Number of blocks, used to clamp navigation
    #[arg(long)]
    blocks: Option<usize>,
    /// Number of tasks in the focused block
    #[arg(long)]
    tasks: Option<usize>,
    /// Selected date (YYYY-MM-DD, default today)
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Apply each result's proposed context and focus before the next key
    #[arg(long)]
    apply: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyOutcome {
    key: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<CommandResult>,
    pending: Vec<String>,
    default_prevented: bool,
    context: CommandContext,
}

pub async fn run(args: KeysArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let registry = load_registry(&config)?;
    let mut manager = initial_manager(&args, &config);

    let mut outcomes = Vec::new();
    for key in args.keys.iter().flat_map(|k| k.split_whitespace()) {
        let mut event = KeyPress::new(key);
        let dispatch = registry.execute_by_key(key, &manager, Some(&mut event)).await;

        let (outcome, command, result) = match dispatch {
            KeyDispatch::Executed(result) => {
                let command = registry
                    .history(Some(1))
                    .pop()
                    .map(|entry| entry.command.id);
                if args.apply {
                    apply_result(&mut manager, &result);
                }
                ("executed", command, Some(result))
            }
            KeyDispatch::Pending => ("pending", None, None),
            KeyDispatch::NoMatch => ("no-match", None, None),
        };

        outcomes.push(KeyOutcome {
            key: key.to_string(),
            outcome,
            command,
            result,
            pending: registry.pending_sequence(),
            default_prevented: event.default_prevented,
            context: manager.current_context(),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(());
    }

    for outcome in &outcomes {
        let mut line = format!("{:<8} {:<9}", outcome.key, outcome.outcome);
        if let Some(command) = &outcome.command {
            line.push_str(&format!(" {command}"));
        }
        if let Some(result) = &outcome.result {
            if !result.success {
                line.push_str(&format!(" failed: {}", result.message.as_deref().unwrap_or("")));
            } else if let Some(data) = &result.data {
                line.push_str(&format!(" {data}"));
            }
        }
        if !outcome.pending.is_empty() {
            line.push_str(&format!(" (waiting: {})", outcome.pending.join(" ")));
        }
        println!("{line}");
    }
    println!("context: {}", manager.current_context());
    Ok(())
}

fn initial_manager(args: &KeysArgs, config: &Config) -> CommandContextManager {
    let view = args.view.unwrap_or(config.view.default_view);
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut manager = CommandContextManager::new(view, date);

    if let Some(blocks) = args.blocks {
        manager.set_metadata(daykeys_core::defaults::BLOCK_COUNT_KEY, blocks.into());
    }
    if let Some(tasks) = args.tasks {
        manager.set_metadata(daykeys_core::defaults::TASK_COUNT_KEY, tasks.into());
    }
    match (args.block, args.task) {
        (Some(block), Some(task)) => manager.enter_task_level(task, block, None),
        (Some(block), None) => manager.enter_block_level(block, None),
        _ => {}
    }
    manager
}

/// Act on a result's proposals the way a UI shell would.
fn apply_result(manager: &mut CommandContextManager, result: &CommandResult) {
    if !result.success {
        return;
    }
    if let Some(date) = result
        .data
        .as_ref()
        .and_then(|data| data.get("selectedDate"))
        .and_then(|value| serde_json::from_value::<NaiveDate>(value.clone()).ok())
    {
        manager.set_selected_date(date);
    }
    match result.new_context {
        Some(CommandContext::ViewSchedule) if manager.view_mode() != ViewMode::Schedule => {
            manager.switch_view(ViewMode::Schedule)
        }
        Some(CommandContext::ViewYou) if manager.view_mode() != ViewMode::You => {
            manager.switch_view(ViewMode::You)
        }
        _ => {}
    }
    match result.new_focus.clone() {
        Some(CommandFocus::Block { index, id }) => manager.enter_block_level(index, id),
        Some(CommandFocus::Task {
            index,
            parent_index,
            id,
        }) => manager.enter_task_level(index, parent_index, id),
        Some(CommandFocus::View) => manager.exit_to_view_level(),
        None => {}
    }
}
