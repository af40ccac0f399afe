pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;
use super::{ LlmConfig, ProviderError };
use self::gemini::GeminiSageClient;
use crate::config::persona::PersonaConfig;
use crate::models::chat::SageReply;

/// The sage's voice. One call per user turn, a single attempt each.
#[async_trait]
pub trait SageClient: Send + Sync {
    async fn generate_reply(
        &self,
        user_message: &str,
        user_name: &str
    ) -> Result<SageReply, ProviderError>;

    async fn transcribe_audio(&self, audio_base64: &str) -> Result<String, ProviderError>;
}

pub fn new_client(
    config: &LlmConfig,
    persona: Arc<PersonaConfig>
) -> Result<Arc<dyn SageClient>, ProviderError> {
    let client = GeminiSageClient::from_config(config, persona)?;
    Ok(Arc::new(client))
}
