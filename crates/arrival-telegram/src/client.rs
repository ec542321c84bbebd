use std::time::Duration;

use arrival_core::config::TelegramConfig;
use arrival_core::validate::is_valid_bot_token;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use crate::send::redact_token;

/// Longest slice of a raw response body carried in an error detail.
const DETAIL_MAX: usize = 512;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Telegram Bot API `sendMessage` over plain HTTPS.
pub struct TelegramDispatcher {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramDispatcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &TelegramConfig) -> Result<Self, DispatchError> {
        Self::new(cfg.api_base_url.clone(), Duration::from_secs(cfg.timeout_secs))
    }
}

#[async_trait]
impl Dispatcher for TelegramDispatcher {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(
        &self,
        credential: &str,
        channel: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        if !is_valid_bot_token(credential) {
            warn!("telegram: refusing to send with malformed bot token");
            return Err(DispatchError::InvalidCredential);
        }

        let url = format!("{}/bot{}/sendMessage", self.base_url, credential);
        let payload = SendMessageRequest {
            chat_id: channel,
            text: body,
            parse_mode: "HTML",
        };

        debug!(chat_id = %channel, token = %redact_token(credential), "telegram: sending message");

        // The request URL embeds the token; strip it from every error we keep.
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DispatchError::Transport(e.without_url().to_string()))?;
        let json: Option<serde_json::Value> = serde_json::from_str(&text).ok();
        let description = json
            .as_ref()
            .and_then(|v| v.get("description"))
            .and_then(|d| d.as_str())
            .map(str::to_string);

        if status != StatusCode::OK {
            let detail = description.unwrap_or_else(|| fallback_detail(&text, status));
            warn!(status = status.as_u16(), %detail, "telegram: sendMessage rejected");
            return Err(DispatchError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        let ok = json
            .as_ref()
            .and_then(|v| v.get("ok"))
            .and_then(|ok| ok.as_bool());

        match ok {
            Some(true) => {
                let message_id = json
                    .as_ref()
                    .and_then(|v| v.pointer("/result/message_id"))
                    .and_then(|id| id.as_i64());
                info!(chat_id = %channel, ?message_id, "telegram: message delivered");
                Ok(())
            }
            Some(false) => {
                let detail = description.unwrap_or_else(|| "Unknown error".to_string());
                warn!(%detail, "telegram: API reported failure");
                Err(DispatchError::Api { detail })
            }
            None => {
                warn!("telegram: response without an ok field");
                Err(DispatchError::MalformedResponse(truncate(&text)))
            }
        }
    }
}

fn fallback_detail(body: &str, status: StatusCode) -> String {
    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        truncate(body)
    }
}

fn truncate(s: &str) -> String {
    if s.len() <= DETAIL_MAX {
        return s.to_string();
    }
    let mut end = DETAIL_MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
