use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{ debug, info };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use serde_json::{ json, Value as JsonValue };
use std::sync::Arc;

use super::SageClient;
use crate::config::persona::PersonaConfig;
use crate::llm::{
    LlmConfig,
    ProviderError,
    DEFAULT_AUDIO_MIME_TYPE,
    DEFAULT_BASE_URL,
    DEFAULT_CHAT_MODEL,
    DEFAULT_TRANSCRIPTION_MODEL,
};
use crate::models::chat::SageReply;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Debug)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    data: String,
    mime_type: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: JsonValue,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
    status: Option<String>,
}

/// The structured-output contract every sage reply must satisfy.
fn response_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "text": { "type": "STRING" },
            "plan": { "type": "ARRAY", "items": { "type": "STRING" } },
            "dopamine_boost": { "type": "STRING" }
        },
        "required": ["text", "plan", "dopamine_boost"]
    })
}

fn build_reply_request(
    persona: &PersonaConfig,
    user_message: &str,
    user_name: &str
) -> GenerateContentRequest {
    GenerateContentRequest {
        system_instruction: Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text {
                text: persona.system_instruction_for(user_name),
            }],
        }),
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart::Text {
                text: user_message.to_string(),
            }],
        }],
        generation_config: Some(GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: response_schema(),
        }),
    }
}

fn build_transcription_request(
    audio_base64: &str,
    mime_type: &str,
    instruction: &str
) -> GenerateContentRequest {
    GenerateContentRequest {
        system_instruction: None,
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![
                GeminiPart::InlineData {
                    inline_data: InlineData {
                        data: audio_base64.to_string(),
                        mime_type: mime_type.to_string(),
                    },
                },
                GeminiPart::Text {
                    text: instruction.to_string(),
                }
            ],
        }],
        generation_config: None,
    }
}

/// Text of the first candidate, thought parts excluded.
fn extract_text(body: &str) -> Result<String, ProviderError> {
    let response: GenerateContentResponse = serde_json
        ::from_str(body)
        .map_err(ProviderError::MalformedReply)?;
    let text: String = response.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content.parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(text)
}

fn parse_sage_reply(text: &str) -> Result<SageReply, ProviderError> {
    serde_json::from_str::<SageReply>(text.trim()).map_err(ProviderError::MalformedReply)
}

fn provider_error_message(body: &str) -> String {
    match serde_json::from_str::<GoogleErrorEnvelope>(body) {
        Ok(envelope) =>
            match envelope.error.status {
                Some(status) => format!("{} ({})", envelope.error.message, status),
                None => envelope.error.message,
            }
        Err(_) => body.chars().take(200).collect(),
    }
}

pub struct GeminiSageClient {
    http: HttpClient,
    api_key: String,
    model: String,
    transcription_model: String,
    base_url: String,
    audio_mime_type: String,
    persona: Arc<PersonaConfig>,
}

impl GeminiSageClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        transcription_model: Option<String>,
        base_url: Option<String>,
        audio_mime_type: Option<String>,
        persona: Arc<PersonaConfig>
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredential);
        }
        Ok(Self {
            http: HttpClient::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            transcription_model: transcription_model.unwrap_or_else(||
                DEFAULT_TRANSCRIPTION_MODEL.to_string()
            ),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            audio_mime_type: audio_mime_type.unwrap_or_else(|| DEFAULT_AUDIO_MIME_TYPE.to_string()),
            persona,
        })
    }

    pub fn from_config(
        config: &LlmConfig,
        persona: Arc<PersonaConfig>
    ) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or(ProviderError::MissingCredential)?;
        Self::new(
            api_key,
            config.completion_model.clone(),
            config.transcription_model.clone(),
            config.base_url.clone(),
            config.audio_mime_type.clone(),
            persona
        )
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), model)
    }

    async fn generate(
        &self,
        model: &str,
        payload: &GenerateContentRequest
    ) -> Result<String, ProviderError> {
        let url = self.endpoint(model);
        debug!("POST {}", url);

        let resp = self.http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(payload)
            .send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: provider_error_message(&body),
            });
        }
        extract_text(&body)
    }
}

#[async_trait]
impl SageClient for GeminiSageClient {
    async fn generate_reply(
        &self,
        user_message: &str,
        user_name: &str
    ) -> Result<SageReply, ProviderError> {
        info!("GeminiSageClient::generate_reply() → model={} base_url={}", self.model, self.base_url);
        let payload = build_reply_request(&self.persona, user_message, user_name);
        let text = self.generate(&self.model, &payload).await?;
        parse_sage_reply(&text)
    }

    async fn transcribe_audio(&self, audio_base64: &str) -> Result<String, ProviderError> {
        BASE64.decode(audio_base64.trim())?;
        info!(
            "GeminiSageClient::transcribe_audio() → model={} mime_type={}",
            self.transcription_model,
            self.audio_mime_type
        );
        let payload = build_transcription_request(
            audio_base64.trim(),
            &self.audio_mime_type,
            &self.persona.transcription_instruction
        );
        let text = self.generate(&self.transcription_model, &payload).await?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona() -> Arc<PersonaConfig> {
        PersonaConfig::builtin()
    }

    fn candidate_body(parts: JsonValue) -> String {
        json!({
            "candidates": [{ "content": { "role": "model", "parts": parts }, "finishReason": "STOP" }]
        }).to_string()
    }

    #[test]
    fn reply_request_carries_persona_turn_and_schema() {
        let request = build_reply_request(&persona(), "Мне тревожно", "Ana");
        let value = serde_json::to_value(&request).unwrap();

        let instruction = value["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("Риши из Гималаев"));
        assert!(instruction.ends_with("Пользователя зовут: Ana."));
        assert!(value["systemInstruction"].get("role").is_none());

        assert_eq!(
            value["contents"],
            json!([{ "role": "user", "parts": [{ "text": "Мне тревожно" }] }])
        );
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            value["generationConfig"]["responseSchema"]["required"],
            json!(["text", "plan", "dopamine_boost"])
        );
        assert_eq!(
            value["generationConfig"]["responseSchema"]["properties"]["plan"],
            json!({ "type": "ARRAY", "items": { "type": "STRING" } })
        );
    }

    #[test]
    fn transcription_request_sends_inline_audio_then_instruction() {
        let request = build_transcription_request("AAAA", "audio/wav", "transcribe");
        let value = serde_json::to_value(&request).unwrap();

        assert!(value.get("systemInstruction").is_none());
        assert!(value.get("generationConfig").is_none());
        assert_eq!(
            value["contents"][0]["parts"],
            json!([
                { "inlineData": { "data": "AAAA", "mimeType": "audio/wav" } },
                { "text": "transcribe" }
            ])
        );
    }

    #[test]
    fn well_formed_reply_is_parsed() {
        let reply_json = json!({
            "text": "Я слышу тебя.",
            "plan": ["Дыши", "Пиши дневник"],
            "dopamine_boost": "Ты справишься!"
        }).to_string();
        let body = candidate_body(json!([{ "text": reply_json }]));

        let reply = parse_sage_reply(&extract_text(&body).unwrap()).unwrap();
        assert_eq!(reply.text, "Я слышу тебя.");
        assert_eq!(reply.plan, vec!["Дыши".to_string(), "Пиши дневник".to_string()]);
        assert_eq!(reply.dopamine_boost, "Ты справишься!");
    }

    #[test]
    fn reply_split_across_parts_is_joined() {
        let body = candidate_body(
            json!([
                { "text": "{\"text\":\"a\",\"plan\":[]," },
                { "text": "\"dopamine_boost\":\"b\"}" }
            ])
        );
        let reply = parse_sage_reply(&extract_text(&body).unwrap()).unwrap();
        assert_eq!(reply.text, "a");
        assert!(reply.plan.is_empty());
    }

    #[test]
    fn thought_parts_are_skipped() {
        let body = candidate_body(
            json!([
                { "text": "thinking about it", "thought": true },
                { "text": "hello" }
            ])
        );
        assert_eq!(extract_text(&body).unwrap(), "hello");
    }

    #[test]
    fn missing_plan_is_malformed() {
        let body = candidate_body(json!([{ "text": "{\"text\":\"a\",\"dopamine_boost\":\"b\"}" }]));
        let err = parse_sage_reply(&extract_text(&body).unwrap()).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedReply(_)));
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        let err = parse_sage_reply("{\"text\":\"a\",\"plan\":\"one step\",\"dopamine_boost\":\"b\"}").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedReply(_)));
    }

    #[test]
    fn prose_instead_of_json_is_malformed() {
        assert!(matches!(parse_sage_reply("Дорогой искатель..."), Err(ProviderError::MalformedReply(_))));
    }

    #[test]
    fn no_candidates_is_empty() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } }).to_string();
        assert!(matches!(extract_text(&body), Err(ProviderError::EmptyResponse)));
    }

    #[test]
    fn non_json_body_is_malformed() {
        assert!(matches!(extract_text("<html>"), Err(ProviderError::MalformedReply(_))));
    }

    #[test]
    fn error_envelope_message_is_extracted() {
        let body = json!({
            "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
        }).to_string();
        assert_eq!(provider_error_message(&body), "API key not valid. (INVALID_ARGUMENT)");
        assert_eq!(provider_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let config = LlmConfig::default();
        assert!(matches!(
            GeminiSageClient::from_config(&config, persona()),
            Err(ProviderError::MissingCredential)
        ));

        let blank = LlmConfig { api_key: Some("  ".to_string()), ..LlmConfig::default() };
        assert!(matches!(
            GeminiSageClient::from_config(&blank, persona()),
            Err(ProviderError::MissingCredential)
        ));
    }

    #[test]
    fn defaults_and_endpoint() {
        let config = LlmConfig {
            api_key: Some("key".to_string()),
            base_url: Some("http://localhost:8080/v1beta/".to_string()),
            ..LlmConfig::default()
        };
        let client = GeminiSageClient::from_config(&config, persona()).unwrap();
        assert_eq!(client.model, DEFAULT_CHAT_MODEL);
        assert_eq!(client.transcription_model, DEFAULT_TRANSCRIPTION_MODEL);
        assert_eq!(
            client.endpoint(&client.model),
            "http://localhost:8080/v1beta/models/gemini-3-pro-preview:generateContent"
        );
    }

    #[tokio::test]
    async fn invalid_audio_never_reaches_the_network() {
        let config = LlmConfig {
            api_key: Some("key".to_string()),
            base_url: Some("http://127.0.0.1:1".to_string()),
            ..LlmConfig::default()
        };
        let client = GeminiSageClient::from_config(&config, persona()).unwrap();
        let err = client.transcribe_audio("not*base64!").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidAudio(_)));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_transport_error() {
        let config = LlmConfig {
            api_key: Some("key".to_string()),
            base_url: Some("http://127.0.0.1:1".to_string()),
            ..LlmConfig::default()
        };
        let client = GeminiSageClient::from_config(&config, persona()).unwrap();
        let err = client.generate_reply("hello", "Ana").await.unwrap_err();
        // An intercepting proxy may answer instead of the refused connection.
        assert!(matches!(err, ProviderError::Transport(_) | ProviderError::Status { .. }));
    }
}
