use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "daykeys-cli", version, about = "Daykeys keyboard command engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a free-text command
    Parse(commands::parse::ParseArgs),
    /// Suggest completions for partial text input
    Suggest(commands::suggest::SuggestArgs),
    /// Feed keystrokes into the default command set
    Keys(commands::keys::KeysArgs),
    /// List commands available in a context
    Commands(commands::list::ListArgs),
    /// Report key bindings that collide in a shared context
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Registry statistics for the configured command set
    Stats,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Parse(args) => commands::parse::run(args),
        Commands::Suggest(args) => commands::suggest::run(args),
        Commands::Keys(args) => commands::keys::run(args).await,
        Commands::Commands(args) => commands::list::run(args),
        Commands::Conflicts { json } => commands::conflicts::run(json),
        Commands::Stats => commands::stats::run(),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
