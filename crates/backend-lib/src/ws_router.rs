// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! HTTP routes and WebSocket connection handling.
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use huddle_common::{
    ClientEvent, ConnectionId, FileRecord, IceServer, MeetingId, ShareFileRequest,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics::{WS_CONNECTION, WS_DISCONNECTION};
use crate::registry::MeetingLookup;
use crate::storage::Storage;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingResponse {
    pub meeting_id: MeetingId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingInfo {
    pub meeting_id: MeetingId,
    /// `false` while the ID is reserved but the host has not joined yet
    pub active: bool,
    pub is_locked: bool,
    pub participant_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServersResponse {
    pub ice_servers: Vec<IceServer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFileQuery {
    pub connection_id: ConnectionId,
}

/// Create the application router
pub fn create_router<S: Storage + Clone + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/create-meeting", post(create_meeting))
        .route("/api/meeting/{meeting_id}", get(meeting_info))
        .route("/api/ice-servers", get(ice_servers))
        .route(
            "/api/meeting/{meeting_id}/files",
            get(list_files).post(share_file),
        )
        .route(
            "/api/meeting/{meeting_id}/files/{file_id}",
            delete(remove_file),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "Healthy"
}

/// Reserve a meeting ID for a host who will join over the WebSocket
async fn create_meeting<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    let meeting_id = state.registry.reserve();
    tracing::info!(%meeting_id, "meeting ID reserved");
    (StatusCode::CREATED, Json(CreateMeetingResponse { meeting_id }))
}

async fn meeting_info<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(meeting_id): Path<MeetingId>,
) -> Result<Json<MeetingInfo>, AppError> {
    let info = match state.registry.lookup(&meeting_id) {
        MeetingLookup::Active {
            is_locked,
            participant_count,
            host_name,
        } => MeetingInfo {
            meeting_id,
            active: true,
            is_locked,
            participant_count,
            host_name,
        },
        MeetingLookup::Reserved { .. } => MeetingInfo {
            meeting_id,
            active: false,
            is_locked: false,
            participant_count: 0,
            host_name: None,
        },
        MeetingLookup::Ended { .. } | MeetingLookup::Unknown => {
            return Err(AppError::MeetingNotFound)
        },
    };
    Ok(Json(info))
}

async fn ice_servers<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<IceServersResponse> {
    Json(IceServersResponse {
        ice_servers: state.settings.ice_servers.clone(),
    })
}

async fn list_files<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(meeting_id): Path<MeetingId>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    let files = state.gateway.list_files(&meeting_id).await?;
    Ok(Json(files))
}

async fn share_file<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(meeting_id): Path<MeetingId>,
    Json(request): Json<ShareFileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.gateway.share_file(&meeting_id, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn remove_file<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((meeting_id, file_id)): Path<(MeetingId, String)>,
    Query(query): Query<RemoveFileQuery>,
) -> Result<StatusCode, AppError> {
    state
        .gateway
        .remove_file(&meeting_id, &file_id, &query.connection_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for WebSocket connections
pub async fn ws_handler<S: Storage + Clone + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    counter!(WS_CONNECTION).increment(1);
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection<S: Storage + Clone + 'static>(
    socket: WebSocket,
    state: Arc<AppState<S>>,
) {
    let connection_id = Uuid::new_v4().to_string();
    let (mut tx, mut rx) = socket.split();
    let mut events = state.hub.register(connection_id.clone());
    tracing::debug!(%connection_id, "WebSocket connected");

    // Forward queued events to the socket
    let send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize event: {e}");
                    continue;
                },
            };
            if tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Process incoming messages in arrival order
    while let Some(Ok(message)) = rx.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    tracing::debug!(%connection_id, ?event, "client event");
                    state.gateway.handle(&connection_id, event);
                },
                Err(e) => state.gateway.reject_malformed(&connection_id, e.to_string()),
            },
            Message::Close(_) => break,
            _ => {}, // pings are answered by axum
        }
    }

    state.gateway.disconnect(&connection_id);
    state.hub.unregister(&connection_id);
    counter!(WS_DISCONNECTION).increment(1);
    tracing::debug!(%connection_id, "WebSocket closed");

    send_task.abort();
}
