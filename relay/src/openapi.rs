//! OpenAPI documentation for the relay, served as JSON at `/api/openapi.json` and rendered at
//! `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Transcription Relay",
        description = "Forwards uploaded audio to a hosted speech-to-text service and returns the transcript."
    ),
    paths(api::handlers::transcribe::transcribe),
    components(schemas(api::models::transcriptions::TranscribeForm)),
    tags((name = "transcription", description = "Speech-to-text"))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_documents_transcribe() {
        let spec = serde_json::to_value(ApiDoc::openapi()).unwrap();

        let operation = &spec["paths"]["/api/transcribe"]["post"];
        assert!(operation.is_object());
        assert!(operation["requestBody"]["content"]["multipart/form-data"].is_object());
        assert!(operation["responses"]["502"].is_object());
    }
}
