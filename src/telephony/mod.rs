//! Telephony side of the relay
//!
//! - Media-stream envelopes exchanged over the call's websocket
//! - Voice-response document pointing an answered call at the media stream
//! - REST client for placing calls and polling their status

pub mod client;
pub mod messages;
pub mod twiml;

pub use client::{CallLegStatus, TelephonyClient, TwilioClient};
pub use messages::{MarkPayload, MediaPayload, StartPayload, TelephonyCommand, TelephonyEvent};
