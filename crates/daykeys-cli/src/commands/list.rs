use clap::Args;
use daykeys_core::{CommandContext, CommandContextManager, Config, ViewMode};

use super::load_registry;

#[derive(Args)]
pub struct ListArgs {
    /// Context to list for: global, schedule, you, block, task
    #[arg(long, short, default_value = "schedule")]
    context: CommandContext,
    /// Include unavailable commands with the reason they are unavailable
    #[arg(long)]
    all: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let registry = load_registry(&config)?;
    let manager = manager_in(args.context, &config);

    if args.all {
        let suggestions = registry.command_suggestions(&manager);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
            return Ok(());
        }
        for suggestion in &suggestions {
            let marker = if suggestion.available { "+" } else { "-" };
            let mut line = format!(
                "{marker} {:<10} {:<16} {}",
                suggestion.command.key.to_string(),
                suggestion.command.id,
                suggestion.command.description
            );
            if let Some(reason) = &suggestion.reason {
                line.push_str(&format!(" [{reason}]"));
            }
            println!("{line}");
        }
        return Ok(());
    }

    let available = registry.available_commands(&manager);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&available)?);
        return Ok(());
    }
    for info in &available {
        println!(
            "{:<10} {:<16} {:<10} {}",
            info.key.to_string(),
            info.id,
            info.category.slug(),
            info.description
        );
    }
    Ok(())
}

/// A manager positioned so that `context` is on top of the stack.
fn manager_in(context: CommandContext, config: &Config) -> CommandContextManager {
    let view = match context {
        CommandContext::ViewYou => ViewMode::You,
        CommandContext::ViewSchedule | CommandContext::BlockLevel | CommandContext::TaskLevel => {
            ViewMode::Schedule
        }
        CommandContext::Global => config.view.default_view,
    };
    let mut manager = CommandContextManager::new(view, chrono::Local::now().date_naive());
    match context {
        CommandContext::BlockLevel => manager.enter_block_level(0, None),
        CommandContext::TaskLevel => manager.enter_task_level(0, 0, None),
        _ => {}
    }
    manager
}
