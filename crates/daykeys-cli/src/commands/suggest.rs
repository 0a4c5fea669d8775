use clap::Args;
use daykeys_core::{CommandContext, TextCommandParser};

use super::parse::describe;

#[derive(Args)]
pub struct SuggestArgs {
    /// Partial input
    text: String,
    /// Active context: global, schedule, you, block, task
    #[arg(long, short, default_value = "schedule")]
    context: CommandContext,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: SuggestArgs) -> Result<(), Box<dyn std::error::Error>> {
    let parser = TextCommandParser::new();
    let suggestions = parser.suggestions(&args.text, args.context);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
    } else if suggestions.is_empty() {
        println!("no suggestions");
    } else {
        for suggestion in &suggestions {
            println!("{}", describe(suggestion));
        }
    }
    Ok(())
}
