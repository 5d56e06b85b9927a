use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TelephonyConfig;

/// Call leg status as reported by the telephony provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallLegStatus {
    #[serde(alias = "queued", alias = "ringing")]
    Initiated,
    InProgress,
    Completed,
    Busy,
    NoAnswer,
    Failed,
    Canceled,
}

impl CallLegStatus {
    /// Whether the call has ended and will not change status again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initiated | Self::InProgress)
    }
}

/// Outbound call placement and status lookup
#[async_trait]
pub trait TelephonyClient: Send + Sync {
    /// Place a call; telephony fetches `callback_url` for instructions once answered
    async fn place_call(&self, to: &str, from: &str, callback_url: &str) -> Result<String>;

    async fn fetch_status(&self, call_id: &str) -> Result<CallLegStatus>;
}

/// REST client for a Twilio-compatible voice API
pub struct TwilioClient {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
    status: CallLegStatus,
}

impl TwilioClient {
    pub fn new(config: &TelephonyConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    fn calls_url(&self) -> String {
        format!("{}/Accounts/{}/Calls", self.api_base, self.account_sid)
    }
}

#[async_trait]
impl TelephonyClient for TwilioClient {
    async fn place_call(&self, to: &str, from: &str, callback_url: &str) -> Result<String> {
        let url = format!("{}.json", self.calls_url());

        let res = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", from), ("Url", callback_url)])
            .send()
            .await
            .context("Failed to send call request")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("Call request rejected ({}): {}", status, body);
        }

        let call: CallResource = res.json().await.context("Invalid call resource")?;
        info!("Call initiated: {} ({:?})", call.sid, call.status);

        Ok(call.sid)
    }

    async fn fetch_status(&self, call_id: &str) -> Result<CallLegStatus> {
        let url = format!("{}/{}.json", self.calls_url(), call_id);

        let res = self
            .http
            .get(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .context("Failed to fetch call")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("Call lookup failed ({}): {}", status, body);
        }

        let call: CallResource = res.json().await.context("Invalid call resource")?;
        Ok(call.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let parse = |s: &str| serde_json::from_str::<CallLegStatus>(&format!("\"{}\"", s)).unwrap();
        assert_eq!(parse("in-progress"), CallLegStatus::InProgress);
        assert_eq!(parse("no-answer"), CallLegStatus::NoAnswer);
        assert_eq!(parse("queued"), CallLegStatus::Initiated);
        assert_eq!(parse("ringing"), CallLegStatus::Initiated);
        assert_eq!(
            serde_json::to_string(&CallLegStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CallLegStatus::Initiated.is_terminal());
        assert!(!CallLegStatus::InProgress.is_terminal());
        assert!(CallLegStatus::Completed.is_terminal());
        assert!(CallLegStatus::Canceled.is_terminal());
    }
}
