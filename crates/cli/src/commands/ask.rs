//! `agentwire ask`: run one turn in-process and stream it to the terminal.

use std::path::Path;
use std::sync::Arc;

use agentwire_agent::TurnRequest;
use agentwire_core::context::RequestContext;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(
    config_path: Option<&Path>,
    message: String,
    chat_id: Option<String>,
    user: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    if !config.has_api_key() {
        return Err("No API key configured. Set AGENTWIRE_API_KEY or ANTHROPIC_API_KEY.".into());
    }

    let provider = agentwire_providers::build_from_config(&config.model)?;
    let tools = Arc::new(agentwire_tools::default_registry(&config.tools)?);
    let store = agentwire_store::build_from_config(&config.store)?;
    let runner = agentwire_agent::build_turn_runner(&config, provider, tools, store);

    let mut ctx = RequestContext::new();
    if let Some(user) = user {
        ctx = ctx.with_user(user);
    }
    if let Some(chat_id) = chat_id {
        ctx = ctx.with_chat(chat_id);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; cancelling turn");
            on_interrupt.cancel();
        }
    });

    let rx = runner.spawn(TurnRequest::new(Vec::new(), message), Arc::new(ctx), cancel);
    super::print_stream(ReceiverStream::new(rx)).await
}
