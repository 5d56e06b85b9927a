use super::handlers;
use super::state::AppState;
use crate::calls::TWIML_PATH;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        // Telephony callbacks
        .route(
            TWIML_PATH,
            get(handlers::outgoing_call_twiml_query).post(handlers::outgoing_call_twiml_form),
        )
        .route("/media-stream", get(handlers::media_stream))
        .route("/media-stream/:call_id", get(handlers::media_stream_for_call))
        // Call control
        .route("/calls", post(handlers::place_call))
        .route("/calls/:call_id/status", get(handlers::get_call_status))
        .route("/calls/:call_id/live", get(handlers::get_live_session))
        .route(
            "/users/:user_id/calls/:call_id",
            get(handlers::get_call_record),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
