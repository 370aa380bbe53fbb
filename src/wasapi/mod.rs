//! Wasapi adapter: API client, webhook normalizer, device status check,
//! outbound dispatcher and attachment resolver.
//!
//! Talks to the Wasapi REST API (`https://api-ws.wasapi.io/api/v1`) for
//! contacts, devices and sends, and to the Wasapi S3 media bucket for
//! inbound attachments.

use std::future::Future;
use std::time::Duration;

use regex::Regex;

pub mod client;
pub mod dispatcher;
pub mod media;
pub mod normalizer;
pub mod payload;
pub mod provider;
pub mod status;

/// Errors from the Wasapi adapter.
#[derive(Debug, thiserror::Error)]
pub enum WasapiError {
    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Wasapi responded with a non-success status.
    #[error("Wasapi returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized, truncated response body.
        body: String,
    },

    /// A provider call did not complete before its deadline.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        /// Name of the operation that timed out.
        operation: &'static str,
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The webhook body is not a valid Wasapi payload.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// No media resource id was supplied.
    #[error("missing media resource id")]
    MissingMedia,

    /// The media resource id cannot be used as a single path segment.
    #[error("invalid media resource id {0:?}")]
    InvalidResourceId(String),

    /// The attachment's content type has no known file extension.
    #[error("unable to determine file extension for content type {0:?}")]
    UnknownExtension(String),

    /// Local filesystem failure while persisting or reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run a provider call with a deadline.
///
/// # Errors
///
/// Returns [`WasapiError::Timeout`] if `deadline` elapses first, otherwise
/// whatever the call itself returns.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    deadline: Duration,
    call: F,
) -> Result<T, WasapiError>
where
    F: Future<Output = Result<T, WasapiError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(WasapiError::Timeout {
            operation,
            after: deadline,
        }),
    }
}

/// Check HTTP response status, returning the response on success.
///
/// # Errors
///
/// Returns [`WasapiError::HttpStatus`] on non-2xx, with the body sanitized.
pub async fn check_http_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, WasapiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WasapiError::HttpStatus {
        status: status.as_u16(),
        body: sanitize_http_error_body(&body),
    })
}

/// Collapse whitespace, redact token-like values and truncate an error body.
pub fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [r"\d+\|[A-Za-z0-9]{20,}", r"Bearer\s+[A-Za-z0-9._\-|]{10,}"] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
