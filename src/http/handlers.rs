use super::state::AppState;
use crate::calls::{CallRequest, PlacementError};
use crate::relay::CallRelay;
use crate::telephony::{twiml, CallLegStatus};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Form, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Parameters telephony sends when fetching call instructions
#[derive(Debug, Default, Deserialize)]
pub struct TwimlParams {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaceCallResponse {
    pub call_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CallStatusResponse {
    pub call_id: String,
    pub status: CallLegStatus,
    /// The call is over and its status will not change again
    pub ended: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
pub async fn index() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Voice relay is running!" }))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /outgoing-call-twiml
pub async fn outgoing_call_twiml_query(
    State(state): State<AppState>,
    Query(params): Query<TwimlParams>,
) -> impl IntoResponse {
    twiml_response(&state, params)
}

/// POST /outgoing-call-twiml
/// Telephony fetches this once the outgoing call is answered
pub async fn outgoing_call_twiml_form(
    State(state): State<AppState>,
    Form(params): Form<TwimlParams>,
) -> impl IntoResponse {
    twiml_response(&state, params)
}

fn twiml_response(state: &AppState, params: TwimlParams) -> Response {
    let call_id = params.call_sid.filter(|sid| !sid.is_empty());
    info!("Serving call instructions for {:?}", call_id);

    let document = twiml::connect_stream_document(state.config.public_host(), call_id.as_deref());
    ([(header::CONTENT_TYPE, "application/xml")], document).into_response()
}

/// GET /media-stream
/// Media stream of a call this process did not place
pub async fn media_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| relay_call(state, socket, None))
}

/// GET /media-stream/:call_id
pub async fn media_stream_for_call(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| relay_call(state, socket, Some(call_id)))
}

async fn relay_call(state: AppState, socket: WebSocket, call_id: Option<String>) {
    let context = state.calls.context_for_stream(call_id.clone()).await;
    let relay_key = call_id
        .clone()
        .unwrap_or_else(|| context.session_id.clone());

    info!(
        "Media stream connected: {} (user {})",
        relay_key, context.user_id
    );

    let relay = Arc::new(CallRelay::new(
        context,
        Arc::clone(&state.store),
        state.config.speech.clone(),
    ));

    if state
        .relays
        .insert(&relay_key, Arc::clone(&relay))
        .await
        .is_some()
    {
        warn!("Media stream for {} reconnected; replacing its relay", relay_key);
    }

    if let Err(e) = relay.serve_websocket(socket).await {
        warn!("Relay {} failed: {}", relay_key, e);
    }

    // A newer stream for the same call owns the entry and the context now
    if state.relays.remove_if_current(&relay_key, &relay).await {
        if let Some(id) = call_id {
            state.calls.registry().forget(&id).await;
        }
    }

    info!("Media stream closed: {}", relay_key);
}

/// POST /calls
/// Place an outgoing call relayed to the speech service once answered
pub async fn place_call(
    State(state): State<AppState>,
    Json(req): Json<CallRequest>,
) -> impl IntoResponse {
    match state.calls.initiate_call(req).await {
        Ok(call_id) => (
            StatusCode::OK,
            Json(PlaceCallResponse {
                call_id,
                status: "initiated".to_string(),
            }),
        )
            .into_response(),
        Err(e @ (PlacementError::MissingDestination | PlacementError::MissingCaller)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ PlacementError::Telephony(_)) => {
            error!("{}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// GET /calls/:call_id/status
/// Telephony-side status of a call
pub async fn get_call_status(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    match state.calls.call_status(&call_id).await {
        Ok(status) => (
            StatusCode::OK,
            Json(CallStatusResponse {
                call_id,
                status,
                ended: status.is_terminal(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to fetch status for {}: {:#}", call_id, e);
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to fetch call status: {:#}", e),
            )
        }
    }
}

/// GET /calls/:call_id/live
/// Snapshot of a call currently being relayed
pub async fn get_live_session(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    match state.relays.get(&call_id).await {
        Some(relay) => {
            let entries = relay.recorder().len().await;
            let snapshot = relay.session().snapshot(entries).await;
            (StatusCode::OK, Json(snapshot)).into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Call {} is not being relayed", call_id),
        ),
    }
}

/// GET /users/:user_id/calls/:call_id
/// Stored call record (status and transcripts)
pub async fn get_call_record(
    State(state): State<AppState>,
    Path((user_id, call_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.calls.call_record(&user_id, &call_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Call {} not found for user {}", call_id, user_id),
        ),
        Err(e) => {
            error!("Failed to read call record: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read call record: {:#}", e),
            )
        }
    }
}
