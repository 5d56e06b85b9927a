//! HTTP server: telephony callbacks and call control
//!
//! - GET / and GET /health - Liveness
//! - GET|POST /outgoing-call-twiml - Instructions for an answered call
//! - GET /media-stream[/:call_id] - Telephony media websocket, relayed to speech
//! - POST /calls - Place an outgoing call
//! - GET /calls/:id/status - Telephony status of a call
//! - GET /calls/:id/live - Snapshot of a call being relayed
//! - GET /users/:user_id/calls/:id - Stored call record

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{ActiveRelays, AppState};
