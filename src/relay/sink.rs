use std::fmt::Display;

use futures::{Sink, SinkExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{RelayError, RelayResult};
use crate::speech::SpeechInstruction;
use crate::telephony::TelephonyCommand;

/// Outbound side of one downstream connection
///
/// Messages queue without bound and a writer task drains them onto the socket.
/// Dropping (or `close`-ing) the last sink lets the writer close the socket.
#[derive(Debug)]
pub struct RelaySink<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<T>,
}

pub type TelephonySink = RelaySink<TelephonyCommand>;
pub type SpeechSink = RelaySink<SpeechInstruction>;

/// Message a writer task can put on the wire
///
/// Writers log `kind()` only; payloads carry audio.
pub trait OutboundMessage: Serialize {
    fn kind(&self) -> &'static str;
}

impl OutboundMessage for TelephonyCommand {
    fn kind(&self) -> &'static str {
        TelephonyCommand::kind(self)
    }
}

impl OutboundMessage for SpeechInstruction {
    fn kind(&self) -> &'static str {
        SpeechInstruction::kind(self)
    }
}

impl<T> RelaySink<T> {
    pub fn new(name: &'static str) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { name, tx }, rx)
    }

    pub fn send(&self, message: T) -> RelayResult<()> {
        self.tx
            .send(message)
            .map_err(|_| RelayError::ConnectionClosed(self.name))
    }

    /// Stop accepting messages; the writer finishes what is queued, then closes
    pub fn close(self) {
        debug!("Closing {} sink", self.name);
    }
}

/// Drain queued messages as JSON text frames onto `socket`, then close it
pub async fn write_json<T, W, M>(
    mut rx: mpsc::UnboundedReceiver<T>,
    mut socket: W,
    label: &'static str,
    text_frame: fn(String) -> M,
) where
    T: OutboundMessage,
    W: Sink<M> + Unpin,
    W::Error: Display,
{
    while let Some(message) = rx.recv().await {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode {} {} message: {}", label, message.kind(), e);
                continue;
            }
        };

        if let Err(e) = socket.send(text_frame(text)).await {
            warn!("Failed to write {} to {} socket: {}", message.kind(), label, e);
            break;
        }
    }

    if let Err(e) = socket.close().await {
        debug!("Closing {} socket: {}", label, e);
    }
    debug!("{} writer stopped", label);
}
