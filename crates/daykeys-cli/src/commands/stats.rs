use daykeys_core::Config;

use super::load_registry;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let registry = load_registry(&config)?;
    println!("{}", serde_json::to_string_pretty(&registry.stats())?);
    Ok(())
}
