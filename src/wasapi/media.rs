//! Inbound attachment retrieval and persistence.
//!
//! Attachments live in the Wasapi media bucket under an opaque resource id.
//! The file extension is derived from the response `Content-Type`; a file is
//! never written without one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, error};
use url::Url;

use super::client::WasapiApi;
use super::{with_deadline, WasapiError};

/// Downloaded attachment bytes and their extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentResult {
    /// File contents.
    pub buffer: Vec<u8>,
    /// Extension without the leading dot (e.g. `"jpeg"`).
    pub extension: String,
}

/// Map a content type to a file extension. Parameters such as
/// `; charset=binary` are ignored. `None` when the type is unknown.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let base = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    let ext = match base.as_str() {
        "image/jpeg" | "image/jpg" => "jpeg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/3gpp" => "3gp",
        "video/quicktime" => "mov",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/aac" => "m4a",
        "audio/amr" => "amr",
        "audio/wav" | "audio/x-wav" => "wav",
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/zip" => "zip",
        "application/json" => "json",
        "text/plain" => "txt",
        "text/csv" => "csv",
        _ => return None,
    };
    Some(ext)
}

/// Fetches attachments from the media bucket and writes them to disk.
pub struct AttachmentResolver {
    api: Arc<dyn WasapiApi>,
    media_base: Url,
    download_dir: PathBuf,
    deadline: Duration,
}

impl AttachmentResolver {
    /// Create a resolver reading from `media_base` and saving into
    /// `download_dir` by default.
    pub fn new(
        api: Arc<dyn WasapiApi>,
        media_base: Url,
        download_dir: PathBuf,
        deadline: Duration,
    ) -> Self {
        Self {
            api,
            media_base,
            download_dir,
            deadline,
        }
    }

    /// `{media_base}/{resource_id}`, with the id encoded as a single path
    /// segment.
    ///
    /// # Errors
    ///
    /// Returns [`WasapiError::MissingMedia`] for a blank id,
    /// [`WasapiError::InvalidResourceId`] for `.` or `..`, or
    /// [`WasapiError::Config`] if the media base cannot take path segments.
    pub fn media_url(&self, resource_id: &str) -> Result<Url, WasapiError> {
        let resource_id = resource_id.trim().trim_start_matches('/');
        if resource_id.is_empty() {
            return Err(WasapiError::MissingMedia);
        }
        if matches!(resource_id, "." | "..") {
            return Err(WasapiError::InvalidResourceId(resource_id.to_owned()));
        }
        let mut url = self.media_base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                WasapiError::Config(format!(
                    "media base is not a hierarchical URL: {}",
                    self.media_base
                ))
            })?
            .pop_if_empty()
            .push(resource_id);
        Ok(url)
    }

    /// Fetch an attachment, reporting why it failed.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`WasapiError::UnknownExtension`] when
    /// the content type has no known extension.
    pub async fn fetch_attachment(
        &self,
        resource_id: &str,
    ) -> Result<AttachmentResult, WasapiError> {
        let url = self.media_url(resource_id)?;
        let media = with_deadline("media fetch", self.deadline, self.api.fetch_media(&url)).await?;
        let content_type = media.content_type.unwrap_or_default();
        let extension = extension_for_content_type(&content_type)
            .ok_or(WasapiError::UnknownExtension(content_type))?;
        debug!(resource_id, extension, bytes = media.bytes.len(), "attachment fetched");
        Ok(AttachmentResult {
            buffer: media.bytes,
            extension: extension.to_owned(),
        })
    }

    /// Fetch an attachment. Failures are logged and yield `None`.
    pub async fn download_file(&self, resource_id: &str) -> Option<AttachmentResult> {
        match self.fetch_attachment(resource_id).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(resource_id, error = %e, "attachment download failed");
                None
            }
        }
    }

    /// Download an attachment and write it as `file-{unix_millis}.{ext}`.
    ///
    /// Writes into `dir`, or the configured download directory when `None`.
    /// The directory is created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails or the file cannot be written.
    pub async fn save_file(&self, resource_id: &str, dir: Option<&Path>) -> anyhow::Result<PathBuf> {
        let attachment = self
            .fetch_attachment(resource_id)
            .await
            .with_context(|| format!("failed to download attachment {resource_id}"))?;

        let dir = dir.unwrap_or(self.download_dir.as_path());
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create download directory: {}", dir.display()))?;

        let file_name = format!(
            "file-{}.{}",
            Utc::now().timestamp_millis(),
            attachment.extension
        );
        let path = dir.join(file_name);
        tokio::fs::write(&path, &attachment.buffer)
            .await
            .with_context(|| format!("failed to write attachment to {}", path.display()))?;

        debug!(path = %path.display(), "attachment saved");
        Ok(path)
    }
}
