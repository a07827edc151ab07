//! Skill channel service
//!
//! Skills post their replies here, addressed to the skill conversation id
//! they were given. The id is mapped back to the root conversation, then:
//!
//! - `endOfConversation` and `event` run a root turn on a spawned task
//! - everything else is relayed to the user
//!
//! Root turns are spawned because the skill may call back while the root's
//! forward to it is still in flight, holding the conversation lock.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sdk::activity::{Activity, ActivityType, ConversationReference};
use sdk::errors::HostError;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{error_response, ServerState};
use crate::adapter::ReplySink;

pub(super) async fn send_to_conversation(
    State(state): State<ServerState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    Json(activity): Json<Activity>,
) -> Response {
    process_skill_activity(state, &conversation_id, None, &headers, activity).await
}

pub(super) async fn reply_to_activity(
    State(state): State<ServerState>,
    Path((conversation_id, activity_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(activity): Json<Activity>,
) -> Response {
    process_skill_activity(state, &conversation_id, Some(activity_id), &headers, activity).await
}

async fn process_skill_activity(
    state: ServerState,
    skill_conversation_id: &str,
    reply_to_id: Option<String>,
    headers: &HeaderMap,
    mut activity: Activity,
) -> Response {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let claims = match state.validator.authorize_skill(authorization) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("Rejected skill callback: {}", e);
            return error_response(StatusCode::UNAUTHORIZED, &e);
        }
    };

    let Some(reference) = state
        .conversation_ids
        .get_conversation_reference(skill_conversation_id)
    else {
        let err = HostError::UnknownSkillConversation(skill_conversation_id.to_string());
        warn!("{}", err);
        return error_response(StatusCode::NOT_FOUND, &err);
    };

    if let Some(claims) = &claims {
        debug!("Skill callback from app {}", claims.appid);
    }

    let sink = sink_for(&state, &reference);
    let response_id = activity
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if activity.is_type(&ActivityType::EndOfConversation) || activity.is_type(&ActivityType::Event) {
        if activity.is_type(&ActivityType::EndOfConversation) {
            state
                .conversation_ids
                .delete_conversation_reference(skill_conversation_id);
        }
        activity.apply_conversation_reference(&reference, true);

        info!(
            "Skill sent {} for conversation {}",
            activity.activity_type, reference.conversation.id
        );

        let adapter = Arc::clone(&state.adapter);
        tokio::spawn(async move {
            if let Err(e) = adapter.process_activity(activity, sink).await {
                error!("Failed to process skill activity: {}", e);
            }
        });

        return (StatusCode::OK, Json(json!({"id": response_id}))).into_response();
    }

    activity.apply_conversation_reference(&reference, false);
    if let Some(reply_to_id) = reply_to_id {
        activity.reply_to_id = Some(reply_to_id);
    }
    if activity.id.is_none() {
        activity.id = Some(response_id.clone());
    }

    match sink.send(activity).await {
        Ok(()) => (StatusCode::OK, Json(json!({"id": response_id}))).into_response(),
        Err(e) => {
            error!("Failed to relay skill activity: {}", e);
            error_response(StatusCode::BAD_GATEWAY, &e)
        }
    }
}

/// Live socket for the root conversation if there is one, else the connector
fn sink_for(state: &ServerState, reference: &ConversationReference) -> Arc<dyn ReplySink> {
    match state.connections.sink_for(&reference.conversation.id) {
        Some(ws) => Arc::new(ws),
        None => Arc::clone(&state.connector),
    }
}
