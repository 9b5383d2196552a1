//! LLM Provider implementations for agentwire.
//!
//! All providers implement the `agentwire_core::Provider` trait.
//! [`build_from_config`] selects one from the `[model]` config section.

pub mod anthropic;

use std::sync::Arc;

use agentwire_config::ModelConfig;
use agentwire_core::error::ProviderError;
use agentwire_core::provider::Provider;

pub use anthropic::AnthropicProvider;

/// Build the configured provider.
pub fn build_from_config(config: &ModelConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicProvider::from_config(config)?)),
        other => Err(ProviderError::NotConfigured(format!(
            "unknown provider '{other}' (supported: anthropic)"
        ))),
    }
}
