pub mod access;
pub mod agent;
pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod render;
pub mod repl;
pub mod session;

use access::AccessGate;
use agent::SageAgent;
use cli::Args;
use config::persona::resolve_persona;
use llm::LlmConfig;
use llm::chat::new_client as new_sage_client;
use log::info;
use session::initialize_session_store;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Session Store Type: {}", args.session_type);
    info!("Session Key: {}", args.session_key);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or(llm::DEFAULT_CHAT_MODEL));
    info!(
        "Transcription Model: {}",
        args.transcription_model.as_deref().unwrap_or(llm::DEFAULT_TRANSCRIPTION_MODEL)
    );
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or(llm::DEFAULT_BASE_URL));
    info!("Persona Path: {}", args.persona_path.as_deref().unwrap_or("built-in"));
    info!("-------------------------");

    let persona = resolve_persona(args.persona_path.as_deref())?;

    let llm_config = LlmConfig {
        api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
        completion_model: args.chat_model.clone(),
        transcription_model: args.transcription_model.clone(),
        base_url: args.chat_base_url.clone(),
        audio_mime_type: Some(args.audio_mime_type.clone()),
    };
    let sage = new_sage_client(&llm_config, Arc::clone(&persona))?;
    let sessions = initialize_session_store(&args)?;
    let gate = AccessGate::new(args.access_code.clone());

    let agent = SageAgent::start(sage, sessions, gate, persona).await;
    repl::run_terminal(agent).await
}
