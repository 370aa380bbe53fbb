//! Configuration loading and validation.
//!
//! Loads `config.toml` (or `$WASAPI_BRIDGE_CONFIG`). Environment variables
//! override file values; file values override defaults. The loose [`Config`]
//! is validated once into an immutable [`WasapiSettings`] before any
//! provider call is made.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::wasapi::WasapiError;

/// Default Wasapi REST API base.
pub const DEFAULT_API_BASE: &str = "https://api-ws.wasapi.io/api/v1";

/// Default base of the Wasapi media bucket.
pub const DEFAULT_MEDIA_BASE: &str = "https://wasapi-assets.s3.us-east-2.amazonaws.com/media";

/// Where to obtain an API token.
const TOKEN_HELP_URL: &str = "https://ayuda.wasapi.io/es/articles/8843315-uso-de-la-api-de-wasapi";

/// Where to look up device ids.
pub const DEVICE_HELP_URL: &str = "https://api-docs.wasapi.io/reference/get_whatsapp-numbers";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Wasapi credentials and endpoints.
    pub wasapi: WasapiConfig,
    /// Webhook server settings.
    pub server: ServerConfig,
    /// Network deadlines.
    pub timeouts: TimeoutsConfig,
    /// Attachment persistence.
    pub media: MediaConfig,
}

/// `[wasapi]` section.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct WasapiConfig {
    /// API token. Usually supplied through `WASAPI_TOKEN`.
    pub token: Option<String>,
    /// Device id used as `from_id` on every send.
    pub device_id: Option<String>,
    /// REST API base URL.
    pub api_base: String,
    /// Media bucket base URL.
    pub media_base: String,
}

impl Default for WasapiConfig {
    fn default() -> Self {
        Self {
            token: None,
            device_id: None,
            api_base: DEFAULT_API_BASE.to_owned(),
            media_base: DEFAULT_MEDIA_BASE.to_owned(),
        }
    }
}

impl std::fmt::Debug for WasapiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasapiConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("device_id", &self.device_id)
            .field("api_base", &self.api_base)
            .field("media_base", &self.media_base)
            .finish()
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bot name, used in log lines.
    pub name: String,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "bot".to_owned(),
            host: "0.0.0.0".to_owned(),
            port: 3000,
        }
    }
}

/// `[timeouts]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// TCP connect timeout in seconds.
    pub connect_secs: u64,
    /// Whole-request deadline in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// `[media]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory for downloaded attachments. System temp dir when unset.
    pub download_dir: Option<PathBuf>,
}

/// Validated, immutable provider settings.
#[derive(Clone)]
pub struct WasapiSettings {
    /// API token.
    pub token: String,
    /// Device id used as `from_id`.
    pub device_id: String,
    /// REST API base URL.
    pub api_base: Url,
    /// Media bucket base URL.
    pub media_base: Url,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Deadline for each provider call.
    pub request_timeout: Duration,
    /// Default attachment directory.
    pub download_dir: PathBuf,
}

impl std::fmt::Debug for WasapiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasapiSettings")
            .field("token", &"[REDACTED]")
            .field("device_id", &self.device_id)
            .field("api_base", &self.api_base.as_str())
            .field("media_base", &self.media_base.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("download_dir", &self.download_dir)
            .finish()
    }
}

impl WasapiSettings {
    /// Settings with default endpoints and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`WasapiError::Config`] if `token` or `device_id` is empty.
    pub fn new(token: impl Into<String>, device_id: impl Into<String>) -> Result<Self, WasapiError> {
        let wasapi = WasapiConfig {
            token: Some(token.into()),
            device_id: Some(device_id.into()),
            ..WasapiConfig::default()
        };
        Config {
            wasapi,
            ..Config::default()
        }
        .settings()
    }
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Also loads a `.env` file from the working directory if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to load .env file");
            }
        }
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a TOML file only. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or mistyped fields.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Resolve the config path using a custom env resolver.
    ///
    /// Checks `$WASAPI_BRIDGE_CONFIG` first, then `./config.toml`.
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("WASAPI_BRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests never touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("WASAPI_TOKEN") {
            self.wasapi.token = Some(v);
        }
        if let Some(v) = env("WASAPI_DEVICE_ID") {
            self.wasapi.device_id = Some(v);
        }
        if let Some(v) = env("WASAPI_API_BASE") {
            self.wasapi.api_base = v;
        }
        if let Some(v) = env("WASAPI_MEDIA_BASE") {
            self.wasapi.media_base = v;
        }
        if let Some(v) = env("WASAPI_BRIDGE_PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(
                    var = "WASAPI_BRIDGE_PORT",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("WASAPI_DOWNLOAD_DIR") {
            self.media.download_dir = Some(PathBuf::from(v));
        }
    }

    /// Validate into immutable provider settings.
    ///
    /// # Errors
    ///
    /// Returns [`WasapiError::Config`] when the token or device id is missing
    /// or blank, or when a base URL does not parse.
    pub fn settings(&self) -> Result<WasapiSettings, WasapiError> {
        let token = non_blank(self.wasapi.token.as_deref()).ok_or_else(|| {
            WasapiError::Config(format!("must provide a Wasapi token ({TOKEN_HELP_URL})"))
        })?;
        let device_id = non_blank(self.wasapi.device_id.as_deref()).ok_or_else(|| {
            WasapiError::Config(format!("must provide the device id ({DEVICE_HELP_URL})"))
        })?;

        if self.timeouts.connect_secs == 0 || self.timeouts.request_secs == 0 {
            return Err(WasapiError::Config(format!(
                "timeouts must be at least 1 second (connect_secs = {}, request_secs = {})",
                self.timeouts.connect_secs, self.timeouts.request_secs
            )));
        }

        Ok(WasapiSettings {
            token,
            device_id,
            api_base: parse_base("api_base", &self.wasapi.api_base)?,
            media_base: parse_base("media_base", &self.wasapi.media_base)?,
            connect_timeout: Duration::from_secs(self.timeouts.connect_secs),
            request_timeout: Duration::from_secs(self.timeouts.request_secs),
            download_dir: self
                .media
                .download_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn parse_base(field: &str, raw: &str) -> Result<Url, WasapiError> {
    let url = Url::parse(raw)
        .map_err(|e| WasapiError::Config(format!("invalid {field} {raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(WasapiError::Config(format!(
            "invalid {field} {raw:?}: not a hierarchical URL"
        )));
    }
    Ok(url)
}

/// Resolve the per-user config directory (`~/.wasapi-bridge/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".wasapi-bridge"))
}
