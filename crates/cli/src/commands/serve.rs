//! `agentwire serve`: start the HTTP gateway.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        return Err("No API key configured. Set AGENTWIRE_API_KEY or ANTHROPIC_API_KEY.".into());
    }

    println!("agentwire gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.model.model);
    println!("   Store:     {:?}", config.store.backend);

    agentwire_gateway::start(config).await?;
    Ok(())
}
