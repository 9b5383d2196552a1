//! HTTP gateway for agentwire.
//!
//! Exposes the chat turn as a server-sent event stream plus a few small
//! REST endpoints for chats and tools. Built on Axum.

pub mod api;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use agentwire_agent::TurnRunner;
use agentwire_config::{AppConfig, GatewayConfig};
use agentwire_core::store::ChatStore;
use agentwire_core::tool::ToolRegistry;

/// Identity header set by the upstream identity provider.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Third-party OAuth access token forwarded for tools acting on the user's behalf.
pub const OAUTH_TOKEN_HEADER: &str = "x-oauth-token";

/// Request bodies above this size are rejected.
const BODY_LIMIT: usize = 1024 * 1024;

/// Shared state behind every handler.
pub struct AppState {
    pub runner: Arc<TurnRunner>,
    pub tools: Arc<ToolRegistry>,
    pub store: Arc<dyn ChatStore>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        runner: Arc<TurnRunner>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ChatStore>,
    ) -> SharedState {
        Arc::new(Self {
            runner,
            tools,
            store,
        })
    }

    /// Wire provider, tools, store and engine from configuration.
    pub fn from_config(config: &AppConfig) -> agentwire_core::Result<SharedState> {
        let provider = agentwire_providers::build_from_config(&config.model)?;
        let tools = Arc::new(agentwire_tools::default_registry(&config.tools)?);
        let store = agentwire_store::build_from_config(&config.store)?;
        let runner = agentwire_agent::build_turn_runner(
            config,
            provider,
            Arc::clone(&tools),
            Arc::clone(&store),
        );
        info!(
            tools = tools.len(),
            store = store.name(),
            model = %config.model.model,
            "Gateway state ready"
        );
        Ok(Self::new(runner, tools, store))
    }
}

/// Build the router with every route and middleware layer.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat/stream", post(api::chat_stream_handler))
        .route(
            "/api/chats",
            get(api::list_chats_handler).post(api::create_chat_handler),
        )
        .route("/api/chats/{id}/last", get(api::last_message_handler))
        .route("/api/tools", get(api::list_tools_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS for the configured origins. With none configured, cross-origin
/// requests get no CORS headers at all.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(OAUTH_TOKEN_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600));

    if allowed.is_empty() {
        layer
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

/// Serve `router` on an already bound listener until ctrl-c.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> agentwire_core::Result<()> {
    config
        .validate()
        .map_err(|e| agentwire_core::Error::config(e.to_string()))?;
    let state = AppState::from_config(&config)?;
    let app = build_router(state, &config.gateway);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, "Gateway listening");
    serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
