//! The Wasapi provider: one object wiring the API client, both event buses,
//! and the inbound, outbound and media components.
//!
//! Components publish onto an internal bus; [`crate::bus::bridge`] forwards
//! every topic to the subscriber-facing bus returned by
//! [`WasapiProvider::events`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::bus::{self, BusEvent, EventBus, HostInfo, Topic};
use crate::config::{Config, WasapiSettings};

use super::client::{ProviderResponse, WasapiApi, WasapiClient};
use super::dispatcher::OutboundDispatcher;
use super::media::{AttachmentResolver, AttachmentResult};
use super::normalizer::InboundNormalizer;
use super::status::{check_status, DeviceStatus};
use super::WasapiError;

/// Wasapi adapter facade.
pub struct WasapiProvider {
    settings: WasapiSettings,
    api: Arc<dyn WasapiApi>,
    internal: Arc<EventBus>,
    events: Arc<EventBus>,
    normalizer: InboundNormalizer,
    dispatcher: OutboundDispatcher,
    media: AttachmentResolver,
}

impl std::fmt::Debug for WasapiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasapiProvider")
            .field("settings", &self.settings)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl WasapiProvider {
    /// Validate `config` and build a provider using the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`WasapiError::Config`] when the token or device id is missing.
    pub fn from_config(config: &Config) -> Result<Self, WasapiError> {
        Ok(Self::new(config.settings()?))
    }

    /// Build a provider using the HTTP client.
    pub fn new(settings: WasapiSettings) -> Self {
        let api: Arc<dyn WasapiApi> = Arc::new(WasapiClient::new(&settings));
        Self::with_api(settings, api)
    }

    /// Build a provider over any [`WasapiApi`] implementation.
    pub fn with_api(settings: WasapiSettings, api: Arc<dyn WasapiApi>) -> Self {
        let internal = Arc::new(EventBus::new());
        let events = Arc::new(EventBus::new());
        bus::bridge(&internal, Arc::clone(&events));

        let deadline = settings.request_timeout;
        let normalizer = InboundNormalizer::new(Arc::clone(&api), Arc::clone(&internal), deadline);
        let dispatcher =
            OutboundDispatcher::new(Arc::clone(&api), settings.device_id.clone(), deadline);
        let media = AttachmentResolver::new(
            Arc::clone(&api),
            settings.media_base.clone(),
            settings.download_dir.clone(),
            deadline,
        );

        Self {
            settings,
            api,
            internal,
            events,
            normalizer,
            dispatcher,
            media,
        }
    }

    /// Run the one-shot device check.
    ///
    /// On success also announces the host device on the `host` topic.
    pub async fn init(&self) -> DeviceStatus {
        let device_id = &self.settings.device_id;
        let status = check_status(
            self.api.as_ref(),
            &self.internal,
            device_id,
            self.settings.request_timeout,
        )
        .await;
        if status == DeviceStatus::Ready {
            info!(device_id = %device_id, "Wasapi provider ready");
            self.internal.publish(BusEvent::Host(HostInfo {
                phone: device_id.clone(),
            }));
        }
        status
    }

    /// Subscriber-facing event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Register `handler` on the subscriber-facing bus.
    pub fn subscribe<F>(&self, topic: Topic, handler: F)
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(topic, handler);
    }

    /// Inbound webhook normalizer.
    pub fn normalizer(&self) -> &InboundNormalizer {
        &self.normalizer
    }

    /// Validated settings.
    pub fn settings(&self) -> &WasapiSettings {
        &self.settings
    }

    /// See [`OutboundDispatcher::send_message`].
    ///
    /// # Errors
    ///
    /// Returns the provider error unchanged.
    pub async fn send_message(
        &self,
        user_id: &str,
        body: &str,
    ) -> Result<ProviderResponse, WasapiError> {
        self.dispatcher.send_message(user_id, body).await
    }

    /// See [`OutboundDispatcher::send_attachment`].
    ///
    /// # Errors
    ///
    /// Returns the provider or file read error.
    pub async fn send_attachment(
        &self,
        user_id: &str,
        file_path: &Path,
        caption: Option<&str>,
        filename: Option<&str>,
    ) -> Result<ProviderResponse, WasapiError> {
        self.dispatcher
            .send_attachment(user_id, file_path, caption, filename)
            .await
    }

    /// See [`AttachmentResolver::download_file`].
    pub async fn download_file(&self, resource_id: &str) -> Option<AttachmentResult> {
        self.media.download_file(resource_id).await
    }

    /// See [`AttachmentResolver::save_file`].
    ///
    /// # Errors
    ///
    /// Returns an error if the download or the write fails.
    pub async fn save_file(&self, resource_id: &str, dir: Option<&Path>) -> anyhow::Result<PathBuf> {
        self.media.save_file(resource_id, dir).await
    }
}
