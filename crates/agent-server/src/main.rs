//! Research assistant HTTP Server
//!
//! Axum-based server exposing the reasoning engine, research tools,
//! document analysis and per-session conversation history.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_runtime::{OpenAiCompatProvider, ProviderConfig};

use crate::config::ServerConfig;
use crate::handlers::{
    analyze_document, chat_handler, clear_history, delete_session, get_history, health_check,
    list_notes, list_sessions, list_tools, root, save_note, web_search,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let provider_config = ProviderConfig::from_env()?;
    let server_config = ServerConfig::from_env()?;
    let model = provider_config.model.clone();

    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::from_config(provider_config)?);

    match provider.health_check().await {
        Ok(true) => tracing::info!(server = provider.name(), %model, "✓ Connected to model server"),
        Ok(false) | Err(_) => {
            tracing::warn!(server = provider.name(), "⚠ Model server not reachable - chat will fail");
            tracing::warn!("  Check <MODEL_SERVER>_API_KEY and <MODEL_SERVER>_BASE_URL in .env");
        }
    }

    let search = research_tools::search::backend_from_key(server_config.brave_api_key.as_deref())?;
    tracing::info!(backend = search.name(), "Search backend selected");

    let bind_addr = server_config.bind_addr.clone();
    // Duplicate tool names abort startup here
    let state = AppState::assemble(server_config, provider, model, search).await?;

    tracing::info!("Registered {} tools:", state.tools.len());
    for name in state.tools.names() {
        tracing::info!("  • {}", name);
    }
    if let Some(path) = state.notes.file() {
        tracing::info!(path = %path.display(), "Notes mirrored to file");
    }

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 research assistant running on http://{}", bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                              - Health check");
    tracing::info!("  POST   /chat                                - Reasoning turn");
    tracing::info!("  GET    /tools                               - Tool schemas");
    tracing::info!("  POST   /save-note, GET /notes               - Research notes");
    tracing::info!("  POST   /search                              - Web search");
    tracing::info!("  POST   /analyze-document/{{filename}}         - Document analysis");
    tracing::info!("  GET    /conversation-history/{{session_id}}   - Session history");
    tracing::info!("  GET    /sessions                            - Active sessions");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

pub(crate) fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/tools", get(list_tools))

        // Reasoning
        .route("/chat", post(chat_handler))
        .route("/analyze-document/{filename}", post(analyze_document))

        // Research tools
        .route("/save-note", post(save_note))
        .route("/notes", get(list_notes))
        .route("/search", post(web_search))

        // Sessions
        .route(
            "/conversation-history/{session_id}",
            get(get_history).delete(clear_history),
        )
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}", axum::routing::delete(delete_session))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
