//! `agentwire config`: configuration helpers.

use std::path::{Path, PathBuf};

use agentwire_config::AppConfig;

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    println!("{}", config.to_redacted_toml());
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    println!("{}", path.display());
}

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path: PathBuf = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    println!("Validating {}", path.display());

    let config = match AppConfig::load_with_env(&path) {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed and validated");

    if !config.has_api_key() {
        println!("   Warning: no API key set (AGENTWIRE_API_KEY or ANTHROPIC_API_KEY)");
    }
    if config.gateway.host == "0.0.0.0" && config.gateway.allowed_origins.is_empty() {
        println!("   Warning: gateway binds all interfaces with no CORS origins configured");
    }

    println!();
    println!("   Provider:  {}", config.model.provider);
    println!("   Model:     {}", config.model.model);
    println!(
        "   Gateway:   {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!(
        "   Workflow:  hard cap {}, soft threshold {}, {:?} tools",
        config.workflow.hard_cap, config.workflow.soft_threshold, config.workflow.execution
    );
    println!("   Store:     {:?}", config.store.backend);
    Ok(())
}
