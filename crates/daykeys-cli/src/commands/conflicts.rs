use daykeys_core::Config;

use super::load_registry;

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let registry = load_registry(&config)?;
    let conflicts = registry.key_conflicts();

    if json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("no conflicts");
        return Ok(());
    }
    for conflict in &conflicts {
        let contexts: Vec<_> = conflict.shared_contexts.iter().map(|c| c.as_str()).collect();
        println!(
            "{}: {} in {}",
            conflict.key,
            conflict.command_ids.join(", "),
            contexts.join(", ")
        );
    }
    // Conflicts come from user overrides; flag them to scripts.
    std::process::exit(2);
}
