use tracing::{debug, info};

use super::sink::{SpeechSink, TelephonySink};
use crate::error::RelayResult;
use crate::session::{CallSession, Truncation};
use crate::speech::SpeechInstruction;
use crate::telephony::TelephonyCommand;

/// Handles barge-in for the outbound direction
///
/// Runs inline with the outbound bridge, so playback state only changes
/// between events; the telephony clock it reads is advanced by the inbound side.
pub struct InterruptionController<'a> {
    session: &'a CallSession,
    telephony: &'a TelephonySink,
    speech: &'a SpeechSink,
}

impl<'a> InterruptionController<'a> {
    pub fn new(session: &'a CallSession, telephony: &'a TelephonySink, speech: &'a SpeechSink) -> Self {
        Self {
            session,
            telephony,
            speech,
        }
    }

    /// The remote party started talking; cut the assistant off if it is mid-response
    pub async fn on_speech_started(&self) -> RelayResult<Option<Truncation>> {
        debug!("Speech started detected");

        let Some(cut) = self.session.begin_interruption().await else {
            debug!("Nothing to interrupt");
            return Ok(None);
        };

        info!(
            "Interrupting response {} at {}ms",
            cut.item_id, cut.audio_end_ms
        );

        self.speech
            .send(SpeechInstruction::truncate(cut.item_id.clone(), cut.audio_end_ms))?;
        self.telephony
            .send(TelephonyCommand::clear(self.session.stream_sid().await))?;

        let drained = self.session.finish_interruption().await;
        debug!("Flushed {} pending marks", drained);

        Ok(Some(cut))
    }
}
