use crate::AppState;
use crate::api::models::transcriptions::TranscribeForm;
use crate::errors::{Error, Result};
use crate::transcription::AudioUpload;
use axum::extract::{Multipart, State};
use tracing::{info, instrument};

/// Form field the audio file is read from.
pub const UPLOAD_FIELD: &str = "audio";

/// Filename sent upstream when the client did not supply one.
const FALLBACK_FILENAME: &str = "audio";

#[utoipa::path(
    post,
    path = "/api/transcribe",
    tag = "transcription",
    summary = "Transcribe audio",
    description = "Upload an audio file under the `audio` form field. The file is forwarded unmodified to the \
        configured speech-to-text service and the transcript is returned as plain text.",
    request_body(content = TranscribeForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Transcript of the uploaded audio", body = String, content_type = "text/plain"),
        (status = 400, description = "Malformed form or missing `audio` field"),
        (status = 413, description = "Upload exceeds the configured size limit"),
        (status = 502, description = "The transcription service failed or returned no text")
    )
)]
#[instrument(skip_all)]
pub async fn transcribe(State(state): State<AppState>, mut multipart: Multipart) -> Result<String> {
    let mut upload: Option<AudioUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::from_multipart(e, "Failed to parse multipart data"))?
    {
        // Only the first matching part counts; anything else is skipped.
        if upload.is_some() || field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_FILENAME)
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::from_multipart(e, "Failed to read uploaded file"))?;

        info!(
            filename = %filename,
            content_type = ?content_type,
            size = bytes.len(),
            "Received audio upload"
        );

        upload = Some(AudioUpload {
            bytes,
            filename,
            content_type,
        });
    }

    let upload = upload.ok_or_else(|| Error::BadRequest {
        message: format!("Missing required field: '{UPLOAD_FIELD}'"),
    })?;

    Ok(state.transcriber.transcribe(upload).await?)
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{TEST_TRANSCRIPTIONS_PATH, create_test_config, create_test_server};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn audio_form(bytes: &'static [u8], filename: &str) -> MultipartForm {
        MultipartForm::new().add_part(
            "audio",
            Part::bytes(bytes).file_name(filename.to_string()).mime_type("audio/wav"),
        )
    }

    async fn mock_transcript(server: &MockServer, text: &str) {
        Mock::given(method("POST"))
            .and(path(TEST_TRANSCRIPTIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": text })))
            .mount(server)
            .await;
    }

    #[test_log::test(tokio::test)]
    async fn test_transcribe_returns_plain_text() {
        let upstream = MockServer::start().await;
        mock_transcript(&upstream, "hello world").await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let response = server
            .post("/api/transcribe")
            .multipart(audio_form(b"RIFF fake audio", "hello.wav"))
            .await;

        response.assert_status_ok();
        assert_eq!(response.text(), "hello world");
        let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn test_transcribe_forwards_configured_credential_not_client_one() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "ok" })))
            .expect(1)
            .mount(&upstream)
            .await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let response = server
            .post("/api/transcribe")
            .add_header("authorization", "Bearer client-supplied")
            .multipart(audio_form(b"RIFF fake audio", "hello.wav"))
            .await;

        response.assert_status_ok();

        let requests = upstream.received_requests().await.unwrap();
        let auth_values: Vec<_> = requests[0].headers.get_all("authorization").iter().collect();
        assert_eq!(auth_values.len(), 1);
        assert_eq!(auth_values[0], "Bearer test-key");
    }

    #[tokio::test]
    async fn test_transcribe_preserves_filename_and_bytes() {
        let upstream = MockServer::start().await;
        mock_transcript(&upstream, "ok").await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        server
            .post("/api/transcribe")
            .multipart(audio_form(b"distinctive-audio-bytes", "meeting-notes.m4a"))
            .await
            .assert_status_ok();

        let requests = upstream.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains(r#"filename="meeting-notes.m4a""#));
        assert!(body.contains("distinctive-audio-bytes"));
    }

    #[tokio::test]
    async fn test_transcribe_forwards_empty_file() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "" })))
            .expect(1)
            .mount(&upstream)
            .await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let response = server.post("/api/transcribe").multipart(audio_form(b"", "silence.wav")).await;

        response.assert_status_ok();
        assert_eq!(response.text(), "");
    }

    #[tokio::test]
    async fn test_transcribe_missing_audio_field_is_bad_request() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let form = MultipartForm::new().add_part("file", Part::bytes(&b"RIFF"[..]).file_name("clip.wav"));
        let response = server.post("/api/transcribe").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Missing required field: 'audio'");
    }

    #[tokio::test]
    async fn test_transcribe_ignores_extra_fields() {
        let upstream = MockServer::start().await;
        mock_transcript(&upstream, "ok").await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let form = MultipartForm::new()
            .add_text("note", "ignored")
            .add_part("audio", Part::bytes(&b"first"[..]).file_name("first.wav"))
            .add_part("audio", Part::bytes(&b"second"[..]).file_name("second.wav"));
        server.post("/api/transcribe").multipart(form).await.assert_status_ok();

        let requests = upstream.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains(r#"filename="first.wav""#));
        assert!(!body.contains("second.wav"));
        assert!(!body.contains("ignored"));
    }

    #[tokio::test]
    async fn test_transcribe_uses_fallback_filename() {
        let upstream = MockServer::start().await;
        mock_transcript(&upstream, "ok").await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let form = MultipartForm::new().add_part("audio", Part::bytes(&b"RIFF"[..]));
        server.post("/api/transcribe").multipart(form).await.assert_status_ok();

        let requests = upstream.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains(r#"filename="audio""#));
    }

    #[tokio::test]
    async fn test_transcribe_upstream_error_is_bad_gateway() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({ "error": { "message": "Invalid API Key" } })),
            )
            .mount(&upstream)
            .await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let response = server
            .post("/api/transcribe")
            .multipart(audio_form(b"RIFF fake audio", "hello.wav"))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        assert_eq!(response.text(), "Upstream transcription service failed");
    }

    #[tokio::test]
    async fn test_transcribe_missing_text_is_bad_gateway() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "task": "transcribe" })))
            .mount(&upstream)
            .await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let response = server
            .post("/api/transcribe")
            .multipart(audio_form(b"RIFF fake audio", "hello.wav"))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_transcribe_non_string_text_is_bad_gateway() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": 42 })))
            .expect(1)
            .mount(&upstream)
            .await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let response = server
            .post("/api/transcribe")
            .multipart(audio_form(b"RIFF fake audio", "hello.wav"))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        assert_eq!(response.text(), "Upstream transcription service failed");
    }

    #[tokio::test]
    async fn test_transcribe_unreachable_upstream_is_bad_gateway() {
        let server = create_test_server(create_test_config("http://127.0.0.1:1"));
        let response = server
            .post("/api/transcribe")
            .multipart(audio_form(b"RIFF fake audio", "hello.wav"))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        assert!(!response.text().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_transcribe_upload_over_limit_is_payload_too_large() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;

        let mut config = create_test_config(&upstream.uri());
        config.limits.max_upload_size = Some(64);
        let server = create_test_server(config);

        let response = server
            .post("/api/transcribe")
            .multipart(audio_form(&[b'a'; 4096], "big.wav"))
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_interfere() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("alpha.wav"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "alpha transcript" })))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("beta.wav"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "beta transcript" })))
            .expect(1)
            .mount(&upstream)
            .await;

        let server = create_test_server(create_test_config(&upstream.uri()));
        let (alpha, beta) = tokio::join!(
            async { server.post("/api/transcribe").multipart(audio_form(b"alpha audio", "alpha.wav")).await },
            async { server.post("/api/transcribe").multipart(audio_form(b"beta audio", "beta.wav")).await },
        );

        alpha.assert_status_ok();
        beta.assert_status_ok();
        assert_eq!(alpha.text(), "alpha transcript");
        assert_eq!(beta.text(), "beta transcript");
        assert_eq!(upstream.received_requests().await.unwrap().len(), 2);
    }
}
