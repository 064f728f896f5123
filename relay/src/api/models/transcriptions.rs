use utoipa::ToSchema;

/// Multipart form accepted by `POST /api/transcribe`.
///
/// Only used to document the request body; the handler reads the form field by field.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct TranscribeForm {
    /// The audio file to transcribe. Any format the upstream service accepts.
    #[schema(value_type = String, format = Binary)]
    pub audio: Vec<u8>,
}
