//! Format rules for workflow configuration fields.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;
use crate::types::WorkflowConfig;

static BOT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+:[A-Za-z0-9_-]+$").expect("bot token pattern"));

static CHAT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(@[A-Za-z0-9_]+|[0-9-]+)$").expect("chat id pattern"));

/// `<digits>:<token>` as issued by BotFather.
pub fn is_valid_bot_token(token: &str) -> bool {
    BOT_TOKEN.is_match(token)
}

/// Numeric chat id (negative for groups) or `@username`.
pub fn is_valid_chat_id(chat_id: &str) -> bool {
    CHAT_ID.is_match(chat_id)
}

/// Validate an armable configuration. Returns the first violated rule.
///
/// Checks run in the order the configuration screen presented them:
/// token, chat, message, destination, radius.
pub fn validate_config(cfg: &WorkflowConfig) -> Result<(), ValidationError> {
    if !is_valid_bot_token(&cfg.endpoint_credential) {
        return Err(ValidationError::InvalidCredential);
    }
    if !is_valid_chat_id(&cfg.target_channel) {
        return Err(ValidationError::InvalidChannel);
    }
    if cfg.message_body.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if cfg.destination.is_unset() {
        return Err(ValidationError::DestinationUnset);
    }
    if !cfg.destination.in_range() {
        return Err(ValidationError::DestinationOutOfRange {
            latitude: cfg.destination.latitude,
            longitude: cfg.destination.longitude,
        });
    }
    if cfg.radius_meters == 0 {
        return Err(ValidationError::ZeroRadius);
    }
    Ok(())
}
