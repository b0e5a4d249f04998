//! Twilio WhatsApp sender.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::MessageSender;
use crate::config::TwilioConfig;
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "whatsapp";

/// Sends messages through the Twilio Messages API on the WhatsApp channel.
pub struct TwilioSender {
    config: TwilioConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChannelError::Http(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    fn send_failed(reason: impl Into<String>) -> ChannelError {
        ChannelError::SendFailed {
            name: CHANNEL_NAME.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn send_message(&self, to: &str, body: &str) -> Result<Option<String>, ChannelError> {
        let from = format!("whatsapp:{}", self.config.whatsapp_number);
        let to = format!("whatsapp:{to}");

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&[("From", from.as_str()), ("To", to.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| Self::send_failed(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            let sid = resp
                .json::<MessageResource>()
                .await
                .ok()
                .and_then(|m| m.sid);
            return Ok(sid);
        }

        let detail = resp.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(ChannelError::AuthFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("status {status}"),
            }),
            429 => Err(ChannelError::RateLimited {
                name: CHANNEL_NAME.into(),
            }),
            _ => Err(Self::send_failed(format!("status {status}: {detail}"))),
        }
    }
}
