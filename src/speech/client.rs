use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::info;

use super::messages::{InputAudioTranscription, SessionSettings, TurnDetection};
use crate::config::SpeechConfig;

pub type SpeechSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Session settings for one call: the configured audio/voice setup plus the call's instructions
pub fn session_settings(config: &SpeechConfig, instructions: &str) -> SessionSettings {
    SessionSettings {
        turn_detection: TurnDetection {
            kind: config.turn_detection.clone(),
        },
        input_audio_format: config.audio_format.clone(),
        output_audio_format: config.audio_format.clone(),
        voice: config.voice.clone(),
        instructions: instructions.to_string(),
        modalities: vec!["text".to_string(), "audio".to_string()],
        temperature: config.temperature,
        input_audio_transcription: InputAudioTranscription {
            model: config.transcription_model.clone(),
        },
    }
}

/// Open the realtime websocket to the speech service
pub async fn connect(config: &SpeechConfig) -> Result<SpeechSocket> {
    info!("Connecting to speech service at {}", config.url);

    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .context("Invalid speech service URL")?;

    let headers = request.headers_mut();
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .context("Speech API key is not a valid header value")?,
    );
    headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    let (socket, _) = connect_async(request)
        .await
        .context("Failed to connect to speech service")?;

    info!("Connected to speech service");

    Ok(socket)
}
