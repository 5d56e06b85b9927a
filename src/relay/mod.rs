//! Real-time media relay between a telephony media stream and a speech service
//!
//! - Inbound bridge: telephony frames → speech service (audio append, timing)
//! - Outbound bridge: speech events → telephony (audio, marks, transcript)
//! - Interruption controller: barge-in truncation, inline with the outbound bridge
//! - `CallRelay`: connects, primes, runs both bridges, and always finalises

mod inbound;
mod interruption;
mod orchestrator;
mod outbound;
mod sink;

pub use inbound::{run_inbound_bridge, InboundExit};
pub use interruption::InterruptionController;
pub use orchestrator::{CallRelay, RelayIo};
pub use outbound::run_outbound_bridge;
pub use sink::{write_json, OutboundMessage, RelaySink, SpeechSink, TelephonySink};
