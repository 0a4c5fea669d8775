use clap::Args;
use daykeys_core::{CommandContext, ParsedTextCommand, TextCommandParser, TextIntent};

#[derive(Args)]
pub struct ParseArgs {
    /// Text to parse (e.g. "b 9am 30m standup")
    text: String,
    /// Active context: global, schedule, you, block, task
    #[arg(long, short, default_value = "schedule")]
    context: CommandContext,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ParseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let parser = TextCommandParser::new();
    let parsed = parser.parse(&args.text, args.context);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    match parsed {
        Some(parsed) => println!("{}", describe(&parsed)),
        None => {
            eprintln!("no match in {}: {}", args.context, args.text);
            std::process::exit(1);
        }
    }
    Ok(())
}

/// One-line human summary of a parse.
pub fn describe(parsed: &ParsedTextCommand) -> String {
    let mut fields = Vec::new();
    match &parsed.intent {
        TextIntent::Menu { query } => push(&mut fields, "query", query),
        TextIntent::Block {
            start_time,
            duration,
            title,
        }
        | TextIntent::Event {
            start_time,
            duration,
            title,
        } => {
            push(&mut fields, "start", start_time);
            push(&mut fields, "minutes", duration);
            push(&mut fields, "title", title);
        }
        TextIntent::Task { duration, title } => {
            push(&mut fields, "minutes", duration);
            push(&mut fields, "title", title);
        }
        TextIntent::Routine { name } => push(&mut fields, "name", name),
        TextIntent::Action { action } => fields.push(format!("action={}", json_name(action))),
    }

    let status = if parsed.executable { "ready" } else { "incomplete" };
    let mut line = format!("{} [{status}]", parsed.kind());
    if !fields.is_empty() {
        line.push(' ');
        line.push_str(&fields.join(" "));
    }
    if let Some(hint) = &parsed.hint {
        line.push_str(&format!(" ({hint})"));
    }
    line
}

fn push<T: std::fmt::Display>(fields: &mut Vec<String>, name: &str, value: &Option<T>) {
    if let Some(value) = value {
        fields.push(format!("{name}={value}"));
    }
}

fn json_name<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
