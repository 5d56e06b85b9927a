//! Speech-service side of the relay
//!
//! The speech service is a realtime speech-to-speech session reached over a
//! websocket. This module owns its wire format and the connection setup;
//! nothing here depends on which recognition or synthesis model sits behind it.

pub mod client;
pub mod messages;

pub use client::{connect, session_settings, SpeechSocket};
pub use messages::{assistant_transcripts, SessionSettings, SpeechEvent, SpeechInstruction};
