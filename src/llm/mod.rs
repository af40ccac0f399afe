pub mod chat;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_AUDIO_MIME_TYPE: &str = "audio/pcm;rate=16000";

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub transcription_model: Option<String>,
    pub base_url: Option<String>,
    pub audio_mime_type: Option<String>,
}

/// Everything that can go wrong talking to the provider. The user only ever
/// sees the persona's fallback reply; the detail is for the log.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Gemini API key is required")]
    MissingCredential,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },
    #[error("provider returned no text")]
    EmptyResponse,
    #[error("provider reply does not match the response schema: {0}")]
    MalformedReply(#[source] serde_json::Error),
    #[error("audio payload is not valid base64: {0}")]
    InvalidAudio(#[from] base64::DecodeError),
    #[error("provider task failed: {0}")]
    Task(String),
}
