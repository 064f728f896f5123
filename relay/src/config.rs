//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `RELAY_CONFIG`
//! environment variable. A missing file is fine: every field has a default except the upstream
//! credential.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `RELAY_` override YAML values
//! 3. **GROQ_API_KEY** - Special case: fills `upstream.api_key` when it is not set elsewhere
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `RELAY_UPSTREAM__MODEL=whisper-large-v3-turbo` sets the `upstream.model` field.
//!
//! ## Example
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 8080
//! upstream:
//!   api_key: gsk_...
//!   language: en
//!   request_timeout: 60s
//! cors:
//!   allowed_origins:
//!     - "*"
//! static_dir: ./frontend/dist
//! ```

use anyhow::{anyhow, bail};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;
use std::{fmt, path::PathBuf, time::Duration};
use url::Url;

/// Transcription endpoint used when `upstream.url` is not configured.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "RELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have defaults defined in the `Default` implementation; the only value that must
/// be supplied is `upstream.api_key`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// The speech-to-text service uploads are relayed to
    pub upstream: UpstreamConfig,
    /// Browser origins allowed to call the relay
    pub cors: CorsConfig,
    /// Request size limits
    pub limits: LimitsConfig,
    /// Directory holding the built upload page. Served at `/` when set.
    pub static_dir: Option<PathBuf>,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// The credential variable the upstream provider documents. Only ever read from the
/// environment, so `groq_api_key` is not a valid config file key.
#[derive(Debug, Default, Deserialize)]
struct ProviderEnv {
    groq_api_key: Option<String>,
}

/// Connection details and fixed form parameters for the upstream transcription API.
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Full URL of the transcription endpoint
    pub url: Url,
    /// Bearer credential sent on every upstream request
    pub api_key: Option<String>,
    /// Value of the `model` form field
    pub model: String,
    /// Value of the `language` form field
    pub language: String,
    /// Value of the `response_format` form field
    pub response_format: String,
    /// Give up on the upstream call after this long. Unset means wait indefinitely.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

// Keep the credential out of logs.
impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("language", &self.language)
            .field("response_format", &self.response_format)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// Resource limits applied to inbound requests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum upload body size in bytes. Unset means no limit.
    pub max_upload_size: Option<usize>,
}

/// An allowed CORS origin.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            upstream: UpstreamConfig::default(),
            cors: CorsConfig::default(),
            limits: LimitsConfig::default(),
            static_dir: None,
            enable_otel_export: false,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_UPSTREAM_URL).expect("default upstream URL is valid"),
            api_key: None,
            model: "whisper-large-v3".to_string(),
            language: "en".to_string(),
            response_format: "json".to_string(),
            request_timeout: None,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if config.upstream.api_key.is_none() {
            let provider: ProviderEnv = Figment::from(Env::raw().only(&["GROQ_API_KEY"])).extract()?;
            config.upstream.api_key = provider.groq_api_key;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> anyhow::Result<()> {
        self.upstream
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "Invalid configuration: upstream.api_key is not configured. \
                     Set GROQ_API_KEY or RELAY_UPSTREAM__API_KEY, or add upstream.api_key to the config file."
                )
            })?;

        if !matches!(self.upstream.url.scheme(), "http" | "https") {
            bail!(
                "Invalid configuration: upstream.url must use http or https, got '{}'",
                self.upstream.url.scheme()
            );
        }

        for (key, value) in [
            ("upstream.model", &self.upstream.model),
            ("upstream.language", &self.upstream.language),
            ("upstream.response_format", &self.upstream.response_format),
        ] {
            if value.trim().is_empty() {
                bail!("Invalid configuration: {key} cannot be empty");
            }
        }

        if self.cors.allowed_origins.is_empty() {
            bail!("Invalid configuration: cors.allowed_origins cannot be empty. Add at least one allowed origin.");
        }

        if self.limits.max_upload_size == Some(0) {
            bail!("Invalid configuration: limits.max_upload_size cannot be 0. Remove it to disable the limit.");
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            // (RELAY_CONFIG names the file itself, so it is not a config key)
            .merge(Env::prefixed("RELAY_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
