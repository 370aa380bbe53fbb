//! Outbound text and attachment sends.
//!
//! Every request is tagged with the configured device id as `from_id`.
//! Both send paths return the provider error to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use super::client::{ProviderResponse, SendAttachment, SendMessage, WasapiApi};
use super::{with_deadline, WasapiError};

/// Sends messages through Wasapi on behalf of one device.
pub struct OutboundDispatcher {
    api: Arc<dyn WasapiApi>,
    device_id: String,
    deadline: Duration,
}

impl OutboundDispatcher {
    /// Create a dispatcher sending from `device_id`.
    pub fn new(api: Arc<dyn WasapiApi>, device_id: impl Into<String>, deadline: Duration) -> Self {
        Self {
            api,
            device_id: device_id.into(),
            deadline,
        }
    }

    /// Build the text send request for `user_id`.
    pub fn message_request(&self, user_id: &str, body: &str) -> SendMessage {
        SendMessage {
            wa_id: user_id.to_owned(),
            from_id: self.device_id.clone(),
            message: body.to_owned(),
        }
    }

    /// Build the attachment send request for `user_id`.
    pub fn attachment_request(
        &self,
        user_id: &str,
        file_path: &Path,
        caption: Option<&str>,
        filename: Option<&str>,
    ) -> SendAttachment {
        SendAttachment {
            wa_id: user_id.to_owned(),
            from_id: self.device_id.clone(),
            file_path: PathBuf::from(file_path),
            caption: caption.map(str::to_owned),
            filename: filename.map(str::to_owned),
        }
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// Returns the provider error unchanged; nothing is retried.
    pub async fn send_message(
        &self,
        user_id: &str,
        body: &str,
    ) -> Result<ProviderResponse, WasapiError> {
        let request = self.message_request(user_id, body);
        match with_deadline("send message", self.deadline, self.api.send_message(&request)).await
        {
            Ok(response) => {
                debug!(user_id, "message dispatched");
                Ok(response)
            }
            Err(e) => {
                error!(user_id, error = %e, "error sending message");
                Err(e)
            }
        }
    }

    /// Send a file with an optional caption and display filename.
    ///
    /// # Errors
    ///
    /// Returns the provider or file read error; nothing is retried.
    pub async fn send_attachment(
        &self,
        user_id: &str,
        file_path: &Path,
        caption: Option<&str>,
        filename: Option<&str>,
    ) -> Result<ProviderResponse, WasapiError> {
        let request = self.attachment_request(user_id, file_path, caption, filename);
        match with_deadline(
            "send attachment",
            self.deadline,
            self.api.send_attachment(&request),
        )
        .await
        {
            Ok(response) => {
                debug!(user_id, path = %file_path.display(), "attachment dispatched");
                Ok(response)
            }
            Err(e) => {
                error!(user_id, path = %file_path.display(), error = %e, "error sending attachment");
                Err(e)
            }
        }
    }

    /// Device id used as `from_id`.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}
