use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as TelephonyMessage, WebSocket};
use futures::{future, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message as SpeechMessage;
use tracing::{error, info, warn};

use super::inbound::run_inbound_bridge;
use super::outbound::run_outbound_bridge;
use super::sink::{write_json, RelaySink, SpeechSink, TelephonySink};
use crate::config::SpeechConfig;
use crate::error::{RelayError, RelayResult};
use crate::session::{CallContext, CallSession, TranscriptRecorder};
use crate::speech::{self, SpeechInstruction};
use crate::store::{CallStatus, CallStore};

/// Both connections of one call, as seen by the relay
///
/// Incoming directions are text-frame streams; outgoing directions are sinks.
pub struct RelayIo<T, S> {
    pub telephony_frames: T,
    pub speech_events: S,
    pub telephony: TelephonySink,
    pub speech: SpeechSink,
}

/// Owns one call from websocket accept to finalisation
pub struct CallRelay {
    session: Arc<CallSession>,
    recorder: Arc<TranscriptRecorder>,
    store: Arc<dyn CallStore>,
    speech_config: SpeechConfig,
}

impl CallRelay {
    pub fn new(context: CallContext, store: Arc<dyn CallStore>, speech_config: SpeechConfig) -> Self {
        let recorder = Arc::new(TranscriptRecorder::new(context.store_key(), Arc::clone(&store)));

        Self {
            session: Arc::new(CallSession::new(context)),
            recorder,
            store,
            speech_config,
        }
    }

    pub fn session(&self) -> &Arc<CallSession> {
        &self.session
    }

    pub fn recorder(&self) -> &Arc<TranscriptRecorder> {
        &self.recorder
    }

    /// Relay an accepted telephony websocket through a fresh speech-service connection
    pub async fn serve_websocket(&self, socket: WebSocket) -> RelayResult<()> {
        let speech_socket = match speech::connect(&self.speech_config).await {
            Ok(socket) => socket,
            Err(e) => {
                error!("Speech service unavailable: {:#}", e);
                let mut socket = socket;
                if let Err(e) = SinkExt::close(&mut socket).await {
                    warn!("Failed to close telephony socket: {}", e);
                }
                self.finalize().await;
                return Err(RelayError::Speech(format!("{:#}", e)));
            }
        };
        let (telephony_write, telephony_read) = socket.split();

        self.mark_in_progress().await;

        let (speech_write, speech_read) = speech_socket.split();
        let (telephony, telephony_rx) = RelaySink::new("telephony");
        let (speech, speech_rx) = RelaySink::new("speech");

        let writers = [
            tokio::spawn(write_json(
                telephony_rx,
                telephony_write,
                "telephony",
                TelephonyMessage::Text,
            )),
            tokio::spawn(write_json(speech_rx, speech_write, "speech", SpeechMessage::Text)),
        ];

        let outcome = self
            .run(RelayIo {
                telephony_frames: telephony_frames(telephony_read),
                speech_events: speech_events(speech_read),
                telephony,
                speech,
            })
            .await;

        for writer in writers {
            if let Err(e) = writer.await {
                error!("Socket writer task panicked: {}", e);
            }
        }

        outcome
    }

    /// Prime the speech session, run both bridges until either ends, then finalise
    ///
    /// Finalisation runs on every path: both sinks are closed and the session
    /// is marked completed exactly once.
    pub async fn run<T, S>(&self, io: RelayIo<T, S>) -> RelayResult<()>
    where
        T: Stream<Item = RelayResult<String>>,
        S: Stream<Item = RelayResult<String>>,
    {
        let RelayIo {
            telephony_frames,
            speech_events,
            telephony,
            speech,
        } = io;

        let outcome = match self.prime_speech_session(&speech) {
            Err(e) => Err(e),
            Ok(()) => {
                tokio::select! {
                    res = run_inbound_bridge(telephony_frames, &self.session, &speech) => {
                        res.map(|exit| info!("Inbound bridge finished: {:?}", exit))
                    }
                    res = run_outbound_bridge(
                        speech_events,
                        &self.session,
                        &self.recorder,
                        &telephony,
                        &speech,
                    ) => res,
                    err = idle_watchdog(&self.session, self.idle_timeout()) => Err(err),
                }
            }
        };

        if let Err(e) = &outcome {
            warn!("Relay for {} ended with error: {}", self.session.context().session_id, e);
        }

        telephony.close();
        speech.close();
        self.finalize().await;

        outcome
    }

    /// Configure the speech session and have the assistant open the conversation
    fn prime_speech_session(&self, speech: &SpeechSink) -> RelayResult<()> {
        let context = self.session.context();

        speech.send(SpeechInstruction::SessionUpdate {
            session: speech::session_settings(&self.speech_config, &context.instructions),
        })?;
        speech.send(SpeechInstruction::assistant_message(context.greeting.clone()))?;
        speech.send(SpeechInstruction::ResponseCreate)?;

        Ok(())
    }

    /// Call picked up: the relay is live
    pub async fn mark_in_progress(&self) {
        let key = self.session.context().store_key();
        if let Err(e) = self
            .store
            .upsert(&key, CallStatus::InProgress.to_fields(), true)
            .await
        {
            error!("Failed to store in-progress status for {}: {:#}", key.path(), e);
        }
    }

    /// Mark the session completed; later calls are no-ops
    ///
    /// The completed document carries the full transcript, so entries whose
    /// write was cut short when a bridge stopped still reach the store.
    pub async fn finalize(&self) {
        if !self.session.mark_as_completed() {
            return;
        }

        let key = self.session.context().store_key();
        info!("Call over: {} ({})", self.session.context().session_id, key.path());

        let document = self.recorder.document(CallStatus::Completed).await;
        if let Err(e) = self.store.upsert(&key, document, true).await {
            error!("Failed to store completed status for {}: {:#}", key.path(), e);
        }
    }

    fn idle_timeout(&self) -> Option<Duration> {
        self.speech_config.idle_timeout_secs.map(Duration::from_secs)
    }
}

/// Resolves once telephony has been silent for `limit`; never resolves without a limit
async fn idle_watchdog(session: &CallSession, limit: Option<Duration>) -> RelayError {
    let Some(limit) = limit else {
        return future::pending().await;
    };

    loop {
        let idle = session.idle_for();
        if idle >= limit {
            warn!("No telephony frames for {:?}; ending call", idle);
            return RelayError::IdleTimeout(limit);
        }
        tokio::time::sleep(limit - idle).await;
    }
}

fn telephony_frames(
    stream: futures::stream::SplitStream<WebSocket>,
) -> impl Stream<Item = RelayResult<String>> {
    stream
        .take_while(|message| future::ready(!matches!(message, Ok(TelephonyMessage::Close(_)))))
        .filter_map(|message| {
            future::ready(match message {
                Ok(TelephonyMessage::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(RelayError::Telephony(e.to_string()))),
            })
        })
}

fn speech_events(
    stream: futures::stream::SplitStream<speech::SpeechSocket>,
) -> impl Stream<Item = RelayResult<String>> {
    stream
        .take_while(|message| future::ready(!matches!(message, Ok(SpeechMessage::Close(_)))))
        .filter_map(|message| {
            future::ready(match message {
                Ok(SpeechMessage::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(RelayError::Speech(e.to_string()))),
            })
        })
}
