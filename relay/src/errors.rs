use crate::transcription::UpstreamError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed or incomplete upload
    #[error("{message}")]
    BadRequest { message: String },

    /// Upload exceeded the configured body limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// The transcription service failed or answered with something unusable
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } | Error::PayloadTooLarge { message } => message.clone(),
            Error::Upstream(_) => "Upstream transcription service failed".to_string(),
        }
    }

    /// Classify a multipart parsing failure. Axum reports an exceeded body limit through the
    /// same error type, so the status it carries decides between 413 and 400.
    pub fn from_multipart(err: MultipartError, context: &str) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Error::PayloadTooLarge {
                message: "Uploaded file exceeds the maximum allowed size".to_string(),
            }
        } else {
            Error::BadRequest {
                message: format!("{context}: {}", err.body_text()),
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Upstream(_) => {
                tracing::error!("Upstream transcription error: {:#}", self);
            }
            Error::BadRequest { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors_map_to_bad_gateway_without_detail() {
        let err = Error::from(UpstreamError::Status {
            status: 401,
            body: r#"{"error":{"message":"Invalid API Key gsk_abc"}}"#.to_string(),
        });

        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!err.user_message().contains("gsk_abc"));

        let err = Error::from(UpstreamError::MissingText);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.user_message(), "Upstream transcription service failed");
    }

    #[test]
    fn test_multipart_client_errors_keep_their_message() {
        let err = Error::BadRequest {
            message: "Failed to parse multipart data: missing boundary".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "Failed to parse multipart data: missing boundary");

        let err = Error::PayloadTooLarge {
            message: "Uploaded file exceeds the maximum allowed size".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_into_response_uses_user_message() {
        let response = Error::BadRequest {
            message: "Missing required field: 'audio'".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Missing required field: 'audio'");
    }
}
