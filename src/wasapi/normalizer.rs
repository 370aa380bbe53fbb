//! Inbound webhook normalization.
//!
//! Turns a Wasapi webhook payload into a [`NormalizedMessageEvent`] and
//! publishes it on the `message` topic. Outbound echoes and group chats are
//! dropped. Non-text bodies are replaced by a [`Placeholder`] token so
//! subscribers know to fetch the media separately.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::bus::{BusEvent, EventBus};

use super::client::WasapiApi;
use super::payload::{MessageType, WebhookMessage, WebhookPayload};
use super::{with_deadline, WasapiError};

/// Display name used when the contact lookup yields nothing.
pub const FALLBACK_NAME: &str = "Usuario";

/// Body substituted for non-text messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// Image or video.
    Media,
    /// Document.
    Document,
    /// Audio or voice note.
    VoiceNote,
    /// Shared location.
    Location,
}

impl Placeholder {
    /// All placeholders.
    pub const ALL: [Placeholder; 4] = [
        Placeholder::Media,
        Placeholder::Document,
        Placeholder::VoiceNote,
        Placeholder::Location,
    ];

    /// The literal token consumers match on.
    pub fn token(self) -> &'static str {
        match self {
            Self::Media => "_event_media_",
            Self::Document => "_event_document_",
            Self::VoiceNote => "_event_voice_note_",
            Self::Location => "_event_location_",
        }
    }

    /// Placeholder for a message type; `None` for text.
    pub fn for_message_type(message_type: MessageType) -> Option<Self> {
        match message_type {
            MessageType::Text => None,
            MessageType::Image | MessageType::Video => Some(Self::Media),
            MessageType::Document => Some(Self::Document),
            MessageType::Audio => Some(Self::VoiceNote),
            MessageType::Location => Some(Self::Location),
        }
    }

    /// Classify a normalized body. `None` for plain text.
    pub fn from_body(body: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.token() == body)
    }
}

/// Host device that received the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRef {
    /// Device id as a decimal string.
    pub phone: String,
}

/// Provider-independent inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMessageEvent {
    /// Message text, or a placeholder token for media.
    pub body: String,
    /// Chat id of the sender.
    pub from: String,
    /// Contact display name, or [`FALLBACK_NAME`].
    pub name: String,
    /// Receiving device.
    pub host: HostRef,
    /// The original payload.
    pub raw: WebhookPayload,
}

/// Message body for a webhook message: text verbatim, or a placeholder token.
pub fn body_for(data: &WebhookMessage) -> String {
    match Placeholder::for_message_type(data.message_type) {
        Some(placeholder) => placeholder.token().to_owned(),
        None => data.text().unwrap_or_default(),
    }
}

/// Converts webhook payloads into normalized events.
pub struct InboundNormalizer {
    api: Arc<dyn WasapiApi>,
    bus: Arc<EventBus>,
    deadline: Duration,
}

impl InboundNormalizer {
    /// Create a normalizer that publishes onto `bus`.
    ///
    /// `deadline` bounds the contact lookup.
    pub fn new(api: Arc<dyn WasapiApi>, bus: Arc<EventBus>, deadline: Duration) -> Self {
        Self { api, bus, deadline }
    }

    /// Parse a raw webhook body and normalize it.
    ///
    /// # Errors
    ///
    /// Returns [`WasapiError::MalformedPayload`] if the body does not parse.
    /// Nothing is published in that case.
    pub async fn normalize_raw(
        &self,
        body: &[u8],
    ) -> Result<Option<NormalizedMessageEvent>, WasapiError> {
        let payload = WebhookPayload::from_slice(body)?;
        Ok(self.normalize(payload).await)
    }

    /// Normalize a parsed payload and publish it on the `message` topic.
    ///
    /// Returns `None`, publishing nothing, for outbound messages and group
    /// chats.
    pub async fn normalize(&self, payload: WebhookPayload) -> Option<NormalizedMessageEvent> {
        if !payload.is_inbound_direct() {
            debug!(
                wa_id = %payload.data.wa_id,
                direction = ?payload.data.direction,
                "ignoring non-inbound or group webhook"
            );
            return None;
        }

        let name = self.resolve_name(&payload.data.wa_id).await;
        let event = NormalizedMessageEvent {
            body: body_for(&payload.data),
            from: payload.data.wa_id.clone(),
            name,
            host: HostRef {
                phone: payload.data.from_id.to_string(),
            },
            raw: payload,
        };

        self.bus.publish(BusEvent::Message(event.clone()));
        Some(event)
    }

    /// Contact first name for `wa_id`, or [`FALLBACK_NAME`] on any failure.
    async fn resolve_name(&self, wa_id: &str) -> String {
        let lookup = with_deadline("contact lookup", self.deadline, self.api.contact_by_id(wa_id));
        match lookup.await {
            Ok(Some(contact)) if !contact.first_name.trim().is_empty() => contact.first_name,
            Ok(_) => {
                debug!(wa_id, "no contact name, using fallback");
                FALLBACK_NAME.to_owned()
            }
            Err(e) => {
                warn!(wa_id, error = %e, "error getting contact name, using fallback");
                FALLBACK_NAME.to_owned()
            }
        }
    }
}
