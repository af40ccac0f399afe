use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Session Store Args ---
    /// Session store type (file, redis, memory)
    #[arg(long, env = "SESSION_TYPE", default_value = "file")]
    pub session_type: String,

    /// Path of the session record when using the file store.
    #[arg(long, env = "SESSION_PATH", default_value = ".rishi/session.json")]
    pub session_path: String,

    /// Redis endpoint when using the redis store (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "SESSION_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub session_redis_url: String,

    /// Key under which the user profile is stored.
    #[arg(long, env = "SESSION_KEY", default_value = "rishi_user")]
    pub session_key: String,

    // --- Chat LLM Provider Args ---
    /// API Key for the Gemini API.
    #[arg(long, env = "API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Base URL for the Gemini API (e.g., https://generativelanguage.googleapis.com/v1beta)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let the client handle it
    pub chat_base_url: Option<String>,

    /// Model name for sage replies (e.g., gemini-3-pro-preview)
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Model name for voice transcription (e.g., gemini-3-flash-preview)
    #[arg(long, env = "TRANSCRIPTION_MODEL")]
    pub transcription_model: Option<String>,

    /// MIME type sent along with recorded audio.
    #[arg(long, env = "AUDIO_MIME_TYPE", default_value = "audio/pcm;rate=16000")]
    pub audio_mime_type: String,

    // --- General App Args ---
    /// Shared access code required to register.
    #[arg(long, env = "ACCESS_CODE", default_value = "rishi-exclusive-2024", hide_env_values = true)]
    pub access_code: String,

    /// Optional JSON file overriding the persona texts.
    #[arg(long, env = "PERSONA_PATH")]
    pub persona_path: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
