//! Relay uploads to an OpenAI-compatible `/audio/transcriptions` endpoint.

use super::{AudioUpload, Transcriber, UpstreamError};
use crate::config::UpstreamConfig;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

/// Longest upstream error body kept for logs.
const MAX_LOGGED_BODY_CHARS: usize = 512;

/// The only part of the upstream response the relay reads.
#[derive(Debug, Deserialize)]
struct UpstreamTranscription {
    text: Option<String>,
}

/// Forwards uploads to the configured transcription API with a fixed credential and fixed
/// `model`, `language` and `response_format` form fields.
pub struct UpstreamTranscriber {
    client: Client,
    url: Url,
    api_key: String,
    model: String,
    language: String,
    response_format: String,
}

impl UpstreamTranscriber {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("upstream.api_key is not configured"))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key,
            model: config.model.clone(),
            language: config.language.clone(),
            response_format: config.response_format.clone(),
        })
    }

    fn form(&self, upload: AudioUpload) -> Result<Form, UpstreamError> {
        let mut file = Part::bytes(Vec::from(upload.bytes)).file_name(upload.filename);
        if let Some(content_type) = upload.content_type.as_deref() {
            file = file.mime_str(content_type).map_err(UpstreamError::Request)?;
        }

        Ok(Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", self.response_format.clone()))
    }
}

fn truncate_for_log(body: &str) -> String {
    if body.chars().count() <= MAX_LOGGED_BODY_CHARS {
        body.to_string()
    } else {
        let mut truncated: String = body.chars().take(MAX_LOGGED_BODY_CHARS).collect();
        truncated.push_str("...");
        truncated
    }
}

#[async_trait]
impl Transcriber for UpstreamTranscriber {
    #[instrument(skip_all, fields(filename = %upload.filename, size = upload.bytes.len()))]
    async fn transcribe(&self, upload: AudioUpload) -> Result<String, UpstreamError> {
        let form = self.form(upload)?;

        debug!("Relaying upload to {}", self.url);
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(UpstreamError::Transport)?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body),
            });
        }

        let parsed: UpstreamTranscription = serde_json::from_str(&body).map_err(UpstreamError::Decode)?;
        let text = parsed.text.ok_or(UpstreamError::MissingText)?;

        info!(bytes = text.len(), "Transcription received");
        Ok(text)
    }
}
