//! `agentwire tools`: list the tools the agent can call.

use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let registry = agentwire_tools::default_registry(&config.tools)?;

    let mut definitions = registry.definitions();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));

    println!("{} tools registered:", definitions.len());
    for def in definitions {
        println!("  {:<24} {}", def.name, def.description);
    }
    if !config.tools.disabled.is_empty() {
        println!("Disabled: {}", config.tools.disabled.join(", "));
    }
    Ok(())
}
