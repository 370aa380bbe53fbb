//! HTTP client for the Wasapi REST API and media bucket.
//!
//! The pipeline only depends on the [`WasapiApi`] trait; [`WasapiClient`] is
//! the reqwest-backed implementation used in production.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::WasapiSettings;

use super::{check_http_response, WasapiError};

/// Header carrying the API token on media bucket requests.
pub const MEDIA_TOKEN_HEADER: &str = "Token";

/// A Wasapi contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Wasapi contact row id.
    #[serde(default)]
    pub id: Option<i64>,
    /// First name, as entered in Wasapi.
    #[serde(default)]
    pub first_name: String,
    /// Last name, if known.
    #[serde(default)]
    pub last_name: Option<String>,
    /// WhatsApp chat id.
    #[serde(default)]
    pub wa_id: Option<String>,
    /// Phone number, if known.
    #[serde(default)]
    pub phone: Option<String>,
}

/// A WhatsApp number registered in the Wasapi account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device id, as used for `from_id`.
    pub id: i64,
    /// Display name shown to contacts.
    #[serde(default)]
    pub display_name: String,
    /// Phone number of the device.
    #[serde(default)]
    pub phone_number: String,
    /// Provider-reported status.
    #[serde(default)]
    pub status: Option<String>,
}

/// Text message send request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessage {
    /// Recipient chat id.
    pub wa_id: String,
    /// Sending device id.
    pub from_id: String,
    /// Message body.
    pub message: String,
}

/// Attachment send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAttachment {
    /// Recipient chat id.
    pub wa_id: String,
    /// Sending device id.
    pub from_id: String,
    /// Local file to upload.
    pub file_path: PathBuf,
    /// Optional caption.
    pub caption: Option<String>,
    /// Optional filename shown to the recipient.
    pub filename: Option<String>,
}

/// Response returned by Wasapi send endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Whether Wasapi accepted the request.
    #[serde(default)]
    pub success: bool,
    /// Human-readable status message.
    #[serde(default)]
    pub message: Option<String>,
    /// Provider-specific response data.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Raw bytes fetched from the media bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResponse {
    /// Response body.
    pub bytes: Vec<u8>,
    /// Declared `Content-Type`, if any.
    pub content_type: Option<String>,
}

/// Response envelope from the Wasapi API.
#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

/// The provider operations the pipeline depends on.
#[async_trait]
pub trait WasapiApi: Send + Sync {
    /// Look up a contact by chat id. `Ok(None)` when Wasapi has no such contact.
    async fn contact_by_id(&self, wa_id: &str) -> Result<Option<Contact>, WasapiError>;

    /// List the WhatsApp numbers registered in the account.
    async fn whatsapp_numbers(&self) -> Result<Vec<DeviceRecord>, WasapiError>;

    /// Send a text message.
    async fn send_message(&self, request: &SendMessage) -> Result<ProviderResponse, WasapiError>;

    /// Upload and send an attachment.
    async fn send_attachment(
        &self,
        request: &SendAttachment,
    ) -> Result<ProviderResponse, WasapiError>;

    /// Fetch raw bytes from the media bucket.
    async fn fetch_media(&self, url: &Url) -> Result<MediaResponse, WasapiError>;
}

/// Wasapi API client backed by reqwest.
pub struct WasapiClient {
    client: reqwest::Client,
    api_base: Url,
    token: String,
}

impl std::fmt::Debug for WasapiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasapiClient")
            .field("api_base", &self.api_base.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl WasapiClient {
    /// Build a client from validated settings.
    pub fn new(settings: &WasapiSettings) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self {
            client,
            api_base: settings.api_base.clone(),
            token: settings.token.clone(),
        }
    }

    /// Build `{api_base}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, WasapiError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                WasapiError::Config(format!("API base is not a hierarchical URL: {}", self.api_base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Returns the API base URL.
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }
}

#[async_trait]
impl WasapiApi for WasapiClient {
    async fn contact_by_id(&self, wa_id: &str) -> Result<Option<Contact>, WasapiError> {
        let url = self.endpoint(&["contacts", wa_id])?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(wa_id, "contact not found in Wasapi");
            return Ok(None);
        }
        let body: Envelope<Contact> = check_http_response(resp).await?.json().await?;
        Ok(body.data)
    }

    async fn whatsapp_numbers(&self) -> Result<Vec<DeviceRecord>, WasapiError> {
        let url = self.endpoint(&["whatsapp-numbers"])?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body: Envelope<Vec<DeviceRecord>> = check_http_response(resp).await?.json().await?;
        Ok(body.data.unwrap_or_default())
    }

    async fn send_message(&self, request: &SendMessage) -> Result<ProviderResponse, WasapiError> {
        let url = self.endpoint(&["whatsapp-messages"])?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        let body: ProviderResponse = check_http_response(resp).await?.json().await?;
        debug!(wa_id = %request.wa_id, "message sent via Wasapi");
        Ok(body)
    }

    async fn send_attachment(
        &self,
        request: &SendAttachment,
    ) -> Result<ProviderResponse, WasapiError> {
        let url = self.endpoint(&["whatsapp-messages", "attachment"])?;
        let bytes = tokio::fs::read(&request.file_path).await?;
        let upload_name = request
            .filename
            .clone()
            .or_else(|| {
                request
                    .file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "attachment".to_owned());

        let mut form = Form::new()
            .text("wa_id", request.wa_id.clone())
            .text("from_id", request.from_id.clone())
            .part("file", Part::bytes(bytes).file_name(upload_name));
        if let Some(caption) = &request.caption {
            form = form.text("caption", caption.clone());
        }
        if let Some(filename) = &request.filename {
            form = form.text("filename", filename.clone());
        }

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        let body: ProviderResponse = check_http_response(resp).await?.json().await?;
        debug!(wa_id = %request.wa_id, path = %request.file_path.display(), "attachment sent via Wasapi");
        Ok(body)
    }

    async fn fetch_media(&self, url: &Url) -> Result<MediaResponse, WasapiError> {
        let resp = self
            .client
            .get(url.clone())
            .header(MEDIA_TOKEN_HEADER, &self.token)
            .send()
            .await?;
        let resp = check_http_response(resp).await?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = resp.bytes().await?.to_vec();
        Ok(MediaResponse {
            bytes,
            content_type,
        })
    }
}
