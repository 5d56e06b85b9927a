use base64::Engine;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::interruption::InterruptionController;
use super::sink::{SpeechSink, TelephonySink};
use crate::error::{RelayError, RelayResult};
use crate::session::{CallSession, TranscriptRecorder, TranscriptRole};
use crate::speech::{assistant_transcripts, SpeechEvent};
use crate::telephony::TelephonyCommand;

/// Relay speech-service events back to telephony until the speech connection closes
///
/// Per-event decode and structure errors are logged and skipped. A transport
/// error or a closed telephony sink ends the bridge with an error.
pub async fn run_outbound_bridge<S>(
    events: S,
    session: &CallSession,
    recorder: &TranscriptRecorder,
    telephony: &TelephonySink,
    speech: &SpeechSink,
) -> RelayResult<()>
where
    S: Stream<Item = RelayResult<String>>,
{
    futures::pin_mut!(events);
    let interruptions = InterruptionController::new(session, telephony, speech);

    while let Some(message) = events.next().await {
        let text = message?;

        let event = match SpeechEvent::decode(&text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping speech event: {}", e);
                continue;
            }
        };

        let kind = event.kind();
        match handle_event(event, session, recorder, telephony, &interruptions).await {
            Ok(()) => {}
            Err(e) if e.is_transient() => warn!("Skipping {} event: {}", kind, e),
            Err(e) => return Err(e),
        }
    }

    info!("Speech service stream ended");
    Ok(())
}

async fn handle_event(
    event: SpeechEvent,
    session: &CallSession,
    recorder: &TranscriptRecorder,
    telephony: &TelephonySink,
    interruptions: &InterruptionController<'_>,
) -> RelayResult<()> {
    let kind = event.kind();
    match event {
        SpeechEvent::InputTranscriptionCompleted { transcript, .. } => {
            recorder.record(TranscriptRole::RemoteParty, transcript).await;
        }
        SpeechEvent::TranscriptFinal { text } => {
            recorder.record(TranscriptRole::RemoteParty, text).await;
        }
        SpeechEvent::ResponseDone { response } => {
            for segment in assistant_transcripts(&response)? {
                recorder.record(TranscriptRole::Assistant, segment).await;
            }
        }
        SpeechEvent::ResponseText { text } => {
            recorder.record(TranscriptRole::Assistant, text).await;
        }
        SpeechEvent::AudioDelta { delta, item_id } => {
            forward_audio(&delta, item_id.as_deref(), session, telephony).await?;
        }
        SpeechEvent::SpeechStarted { .. } => {
            interruptions.on_speech_started().await?;
        }
        SpeechEvent::Error { error } => {
            warn!("Speech service reported an error: {}", error);
        }
        SpeechEvent::SessionCreated {}
        | SpeechEvent::SessionUpdated {}
        | SpeechEvent::InputAudioBufferCommitted {}
        | SpeechEvent::SpeechStopped {}
        | SpeechEvent::ResponseContentDone {}
        | SpeechEvent::RateLimitsUpdated {} => {
            debug!("Speech event: {}", kind);
        }
        SpeechEvent::Unhandled => {}
    }

    Ok(())
}

/// Send one synthesized chunk to telephony and mark its playback position
async fn forward_audio(
    delta: &str,
    item_id: Option<&str>,
    session: &CallSession,
    telephony: &TelephonySink,
) -> RelayResult<()> {
    let engine = base64::engine::general_purpose::STANDARD;
    let audio = engine
        .decode(delta)
        .map_err(|e| RelayError::decode("speech", format!("invalid audio delta: {}", e)))?;

    let stream_sid = session.stream_sid().await;
    telephony.send(TelephonyCommand::media(stream_sid.clone(), engine.encode(audio)))?;

    if let Some(start_ms) = session.record_audio_chunk(item_id).await {
        debug!("Setting start timestamp for new response: {}ms", start_ms);
    }

    if stream_sid.is_some() {
        let name = session.push_mark().await;
        telephony.send(TelephonyCommand::mark(stream_sid, name))?;
    }

    Ok(())
}
