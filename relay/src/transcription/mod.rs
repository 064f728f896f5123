//! Speech-to-text relay.
//!
//! The HTTP layer only knows about the [`Transcriber`] trait; [`UpstreamTranscriber`] is the
//! implementation that forwards uploads to the hosted transcription API over `reqwest`.

mod upstream;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error as ThisError;

pub use upstream::UpstreamTranscriber;

/// An uploaded audio file, held in memory for the duration of one request.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Bytes,
    pub filename: String,
    /// Content type declared by the client, if any. Forwarded as-is, never checked.
    pub content_type: Option<String>,
}

/// Ways a relayed transcription can fail. None of these are retried.
#[derive(ThisError, Debug)]
pub enum UpstreamError {
    #[error("failed to build upstream request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream response is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("upstream response has no `text` field")]
    MissingText,
}

/// Turns an audio upload into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, upload: AudioUpload) -> Result<String, UpstreamError>;
}
