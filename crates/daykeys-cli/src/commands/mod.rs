pub mod config;
pub mod conflicts;
pub mod keys;
pub mod list;
pub mod parse;
pub mod stats;
pub mod suggest;

use daykeys_core::{bootstrap, CommandRegistry, Config};
use tracing::debug;

/// Registry populated with the default commands and the user's overrides.
pub fn load_registry(config: &Config) -> Result<CommandRegistry, Box<dyn std::error::Error>> {
    let registry = CommandRegistry::new(config.registry_config());
    let count = bootstrap(&registry, &config.shortcuts.bindings)?;
    debug!(
        count,
        overrides = config.shortcuts.bindings.len(),
        "registered default commands"
    );
    Ok(registry)
}
