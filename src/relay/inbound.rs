use base64::Engine;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::sink::SpeechSink;
use crate::error::{RelayError, RelayResult};
use crate::session::CallSession;
use crate::speech::SpeechInstruction;
use crate::telephony::{MediaPayload, TelephonyEvent};

/// Why the inbound bridge returned without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundExit {
    /// Telephony sent `stop`
    Stopped,
    /// The telephony websocket closed
    Disconnected,
}

/// Relay telephony frames to the speech service until the call leg ends
///
/// Malformed frames are dropped with a warning. A transport error or a closed
/// speech sink ends the bridge with an error.
pub async fn run_inbound_bridge<S>(
    frames: S,
    session: &CallSession,
    speech: &SpeechSink,
) -> RelayResult<InboundExit>
where
    S: Stream<Item = RelayResult<String>>,
{
    futures::pin_mut!(frames);

    while let Some(frame) = frames.next().await {
        let text = frame?;
        session.touch();

        let event = match TelephonyEvent::decode(&text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping telephony frame: {}", e);
                continue;
            }
        };

        match event {
            TelephonyEvent::Connected { protocol } => {
                debug!("Telephony stream connected (protocol={:?})", protocol);
            }
            TelephonyEvent::Start { start } => {
                info!(
                    "Incoming stream has started {} (call={:?})",
                    start.stream_sid, start.call_sid
                );
                session.set_on_start(&start.stream_sid).await;
            }
            TelephonyEvent::Media { media } => match forward_media(&media, session, speech) {
                Ok(()) => {}
                Err(e) if e.is_transient() => warn!("Dropping media frame: {}", e),
                Err(e) => return Err(e),
            },
            TelephonyEvent::Mark { mark } => {
                if session.acknowledge_mark(&mark.name).await.is_none() {
                    debug!("Mark {} acknowledged with nothing pending", mark.name);
                }
            }
            TelephonyEvent::Stop {} => {
                info!("Telephony stream stopped for {}", session.context().session_id);
                return Ok(InboundExit::Stopped);
            }
        }
    }

    info!("Telephony client disconnected");
    Ok(InboundExit::Disconnected)
}

fn forward_media(
    media: &MediaPayload,
    session: &CallSession,
    speech: &SpeechSink,
) -> RelayResult<()> {
    let audio = base64::engine::general_purpose::STANDARD
        .decode(&media.payload)
        .map_err(|e| RelayError::decode("telephony", format!("invalid media payload: {}", e)))?;

    if audio.is_empty() {
        return Err(RelayError::decode("telephony", "media frame without audio"));
    }

    session.advance_timestamp(media.timestamp);
    speech.send(SpeechInstruction::append_audio(media.payload.clone()))
}
