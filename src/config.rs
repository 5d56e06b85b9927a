use anyhow::{Context, Result};
use serde::Deserialize;

const ENV_PREFIX: &str = "CALL_RELAY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub speech: SpeechConfig,
    pub telephony: TelephonyConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Public base URL telephony uses to reach this service (e.g. "https://relay.example.com")
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// Realtime websocket endpoint, model included
    pub url: String,
    pub api_key: String,
    pub voice: String,
    pub temperature: f32,
    pub audio_format: String,
    pub transcription_model: String,
    pub turn_detection: String,
    /// Default instructions when a call has no registered context
    pub instructions: String,
    /// Default opening line when a call has no registered context
    pub greeting: String,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelephonyConfig {
    pub api_base: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Directory for the JSON file store; in-memory when unset
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from `path` (any format the config crate knows, optional)
    /// layered under `CALL_RELAY_*` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration from an in-memory TOML document on top of the defaults
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;

        Ok(settings.try_deserialize()?)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("service.name", "call-relay")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 8000)?
            .set_default("service.public_url", "http://localhost:8000")?
            .set_default(
                "speech.url",
                "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01",
            )?
            .set_default("speech.api_key", "")?
            .set_default("speech.voice", "alloy")?
            .set_default("speech.temperature", 0.7)?
            .set_default("speech.audio_format", "g711_ulaw")?
            .set_default("speech.transcription_model", "whisper-1")?
            .set_default("speech.turn_detection", "server_vad")?
            .set_default(
                "speech.instructions",
                "You are an AI assistant calling to enquire about moving services. \
                 Ask for details, pricing, and availability. Keep a neutral tone.",
            )?
            .set_default(
                "speech.greeting",
                "Hello! I'm interested in scheduling moving services. What do you have available?",
            )?
            .set_default("telephony.api_base", "https://api.twilio.com/2010-04-01")?
            .set_default("telephony.account_sid", "")?
            .set_default("telephony.auth_token", "")?
            .set_default("telephony.from_number", "")?)
    }

    /// Reject configurations the relay cannot serve calls with
    pub fn validate(&self) -> Result<()> {
        if self.speech.api_key.trim().is_empty() {
            anyhow::bail!(
                "Speech service API key is missing; set speech.api_key or {}_SPEECH__API_KEY",
                ENV_PREFIX
            );
        }
        if self.speech.url.trim().is_empty() {
            anyhow::bail!("speech.url must not be empty");
        }
        Ok(())
    }

    /// Host part of the public URL, used for `wss://` media-stream URLs
    pub fn public_host(&self) -> &str {
        let url = self.service.public_url.trim_end_matches('/');
        url.strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url)
    }

    pub fn public_url(&self) -> &str {
        self.service.public_url.trim_end_matches('/')
    }
}
