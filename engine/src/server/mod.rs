//! HTTP and WebSocket ingress
//!
//! # Endpoints
//!
//! - POST /api/messages - One activity from a channel
//! - GET /api/messages/ws - WebSocket stream of activities
//! - GET /health - Liveness and configured skills
//! - POST /api/skills/v3/conversations/:conversation_id/activities[/:activity_id]
//!   - Skill channel service, for activities skills send back

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sdk::activity::Activity;
use sdk::errors::HostError;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod connections;
mod skill_channel;
mod ws;

pub use connections::{ConnectionContext, ConnectionRegistry};

use crate::adapter::{BotAdapter, BufferedSink, ConnectorSink, ReplySink};
use crate::auth::{ClaimsValidator, CredentialProvider};
use crate::bot::RootBot;
use crate::config::{Config, StorageBackend};
use crate::recovery::TurnErrorHandler;
use crate::router::SkillSessionRouter;
use crate::skills::{SkillConversationIdFactory, SkillHttpClient, SkillRegistry};
use crate::state::{ConversationStateStore, MemoryStateStore, SqliteStateStore};

/// State shared across handlers
#[derive(Clone)]
pub struct ServerState {
    pub adapter: Arc<BotAdapter>,
    pub registry: Arc<SkillRegistry>,
    pub conversation_ids: Arc<SkillConversationIdFactory>,
    pub validator: Arc<ClaimsValidator>,
    pub connector: Arc<dyn ReplySink>,
    pub connections: Arc<ConnectionRegistry>,
}

impl ServerState {
    pub fn new(
        adapter: Arc<BotAdapter>,
        registry: Arc<SkillRegistry>,
        conversation_ids: Arc<SkillConversationIdFactory>,
        validator: Arc<ClaimsValidator>,
        connector: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            adapter,
            registry,
            conversation_ids,
            validator,
            connector,
            connections: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Wire every service from `config`
    ///
    /// Order: registry and credentials, state store, skill client, router and
    /// recovery, adapter.
    pub async fn from_config(config: &Config) -> Result<Self, HostError> {
        let registry = Arc::new(SkillRegistry::from_config(&config.skills)?);
        let credentials = Arc::new(CredentialProvider::new(
            config.bot.app_id.clone(),
            &config.bot.app_password,
            config.auth.token_ttl_secs,
        ));
        let allowed_callers: Vec<String> = registry
            .app_ids()
            .map(str::to_string)
            .chain(config.auth.allowed_callers.iter().cloned())
            .collect();
        let validator = Arc::new(ClaimsValidator::new(
            config.bot.app_id.clone(),
            &config.bot.app_password,
            allowed_callers,
        ));
        if !validator.is_enabled() {
            warn!("No app id configured; skill callbacks are not authenticated");
        }

        let store: Arc<dyn ConversationStateStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStateStore::new()),
            StorageBackend::Sqlite => Arc::new(SqliteStateStore::new(&config.storage.path).await?),
        };

        let timeout = Duration::from_secs(config.routing.forward_timeout_secs);
        let conversation_ids = Arc::new(SkillConversationIdFactory::new());
        let client = Arc::new(SkillHttpClient::new(
            Arc::clone(&credentials),
            Arc::clone(&conversation_ids),
            config.bot.skill_host_endpoint.clone(),
            timeout,
        )?);

        let router = SkillSessionRouter::new(
            Arc::clone(&registry),
            client.clone(),
            Arc::clone(&store),
            Arc::clone(&conversation_ids),
            Arc::new(RootBot::new(config.bot.target_skill_id.clone())),
            timeout,
        );
        let recovery = TurnErrorHandler::new(
            Arc::clone(&registry),
            client,
            Arc::clone(&store),
            Arc::clone(&conversation_ids),
            timeout,
        );
        let adapter = Arc::new(BotAdapter::new(router, recovery, store));
        let connector = Arc::new(ConnectorSink::new(credentials, timeout)?);

        Ok(Self::new(
            adapter,
            registry,
            conversation_ids,
            validator,
            connector,
        ))
    }
}

/// Build the axum router
pub fn app(state: ServerState) -> Router {
    Router::new()
        .route("/api/messages", post(messages_handler))
        .route("/api/messages/ws", get(websocket_handler))
        .route("/health", get(health_handler))
        .route(
            "/api/skills/v3/conversations/:conversation_id/activities",
            post(skill_channel::send_to_conversation),
        )
        .route(
            "/api/skills/v3/conversations/:conversation_id/activities/:activity_id",
            post(skill_channel::reply_to_activity),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: ServerState,
    shutdown: F,
) -> Result<(), HostError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("Root bot listening on http://{}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Server shutting down gracefully");
        })
        .await?;

    Ok(())
}

fn error_response(status: StatusCode, err: &HostError) -> Response {
    (status, Json(json!({"error": err.to_string()}))).into_response()
}

/// Channel ingress
async fn messages_handler(
    State(state): State<ServerState>,
    Json(activity): Json<Activity>,
) -> Response {
    if activity.expects_replies() {
        let buffer = Arc::new(BufferedSink::new());
        let sink: Arc<dyn ReplySink> = buffer.clone();
        return match state.adapter.process_activity(activity, sink).await {
            Ok(_) => Json(json!({"activities": buffer.take()})).into_response(),
            Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
        };
    }

    match state
        .adapter
        .process_activity(activity, Arc::clone(&state.connector))
        .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
    }
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(|socket| ws::handle_websocket(socket, state))
}

async fn health_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let skills: Vec<&str> = state
        .registry
        .list()
        .into_iter()
        .map(|s| s.id.as_str())
        .collect();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "skills": skills,
    }))
}
