//! Wire types for the Wasapi inbound webhook.
//!
//! Only `type`, `wa_id`, `from_id` and `message_type` are typed strictly.
//! Everything else is kept as raw JSON so a provider-side change to a field
//! the adapter never reads cannot reject the message. Unknown keys are kept
//! in `extra` and serialize back in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::WasapiError;

/// Substring in a chat id that marks a group conversation.
pub const GROUP_CHAT_MARKER: &str = "g.us";

/// A webhook body as posted by Wasapi.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Event name (e.g. `"message"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
    /// Message data.
    pub data: WebhookMessage,
    /// Top-level keys not listed above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Message direction relative to the connected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from a contact.
    In,
    /// Sent from the device.
    Out,
}

/// Content type of a webhook message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text.
    Text,
    /// Image, with optional caption.
    Image,
    /// Video, with optional caption.
    Video,
    /// Audio or voice note.
    Audio,
    /// Document, with optional filename.
    Document,
    /// Shared location.
    Location,
}

/// The `data` object of a webhook body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookMessage {
    /// Direction flag.
    #[serde(rename = "type")]
    pub direction: Direction,
    /// Chat identifier (e.g. `521555@c.us`).
    pub wa_id: String,
    /// Device id that received or sent the message.
    pub from_id: i64,
    /// Content classification.
    pub message_type: MessageType,
    /// Text body, or media reference for media messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    /// Media caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<Value>,
    /// Original document filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<Value>,
    /// Wasapi user that owns the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    /// WhatsApp message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wam_id: Option<Value>,
    /// Extra provider data (media links for media messages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Wasapi message row id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Conversation window state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_status: Option<Value>,
    /// Keys not listed above (`status`, `origin`, timestamps, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WebhookMessage {
    /// The `message` field as text. Numbers are rendered in decimal; any
    /// other JSON type yields `None`.
    pub fn text(&self) -> Option<String> {
        match self.message.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl WebhookPayload {
    /// Parse a raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns [`WasapiError::MalformedPayload`] if the body is not valid JSON
    /// or a required field is missing or mistyped.
    pub fn from_slice(body: &[u8]) -> Result<Self, WasapiError> {
        serde_json::from_slice(body).map_err(|e| WasapiError::MalformedPayload(e.to_string()))
    }

    /// Whether this payload is an inbound message from a direct chat.
    pub fn is_inbound_direct(&self) -> bool {
        self.data.direction == Direction::In && !self.data.wa_id.contains(GROUP_CHAT_MARKER)
    }
}
