//! superchat - multi-modal chat in the terminal
//!
//! - Gemini models: text, images, audio, video, PDF and DOCX
//! - Groq models: text (and inline images)
//! - Streamed replies, voice recordings answered via a fixed prompt

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use superchat::chat::provider::{
    GeminiFileClient, GeminiProvider, GroqProvider, ModelParameters, ProviderKind,
    available_models, is_plausible_key,
};
use superchat::chat::{AttachmentStore, ChatService, SessionState};
use superchat::ChatError;
use superchat::config::Config;

mod repl;

#[derive(Parser)]
#[command(name = "superchat")]
#[command(about = "Multi-modal chat with Gemini and Groq models")]
struct Args {
    /// Model to chat with (see /models)
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Sampling temperature, 0.0 to 2.0
    #[arg(long)]
    temperature: Option<f32>,

    /// Reply length limit, 100 to 2000
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Google AI Studio API key
    #[arg(long, env = "GOOGLE_API_KEY")]
    google_api_key: Option<String>,

    /// Groq API key
    #[arg(long, env = "GROQ_API_KEY")]
    groq_api_key: Option<String>,

    /// System instruction override
    #[arg(long)]
    system: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from ~/.superchat/.env or current dir)
    let env_path = dirs::home_dir()
        .map(|h| h.join(".superchat").join(".env"))
        .filter(|p| p.exists());
    if let Some(path) = env_path {
        let _ = dotenvy::from_path(&path);
    } else {
        let _ = dotenvy::dotenv();
    }

    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let config = Config::load();

    // CLI args > env vars (handled by clap) > config file > defaults
    let google_key = args.google_api_key.or_else(|| config.google_api_key.clone());
    let groq_key = args.groq_api_key.or_else(|| config.groq_api_key.clone());

    let models = available_models(google_key.as_deref(), groq_key.as_deref());
    if models.is_empty() {
        bail!(
            "No usable API key. Set GOOGLE_API_KEY (AIza...) or GROQ_API_KEY (gsk...), \
             pass --google-api-key/--groq-api-key, or add them to ~/.superchat/config.toml"
        );
    }

    let model = args
        .model
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| models[0].to_string());
    let kind = ProviderKind::for_model(&model)
        .with_context(|| format!("Unknown model '{}'", model))?;

    let params = ModelParameters::new(
        model,
        args.temperature
            .or(config.temperature)
            .unwrap_or(ModelParameters::DEFAULT_TEMPERATURE),
        args.max_tokens
            .or(config.max_tokens)
            .unwrap_or(ModelParameters::DEFAULT_MAX_TOKENS),
    )?;

    let service = match kind {
        ProviderKind::Google => {
            let key = google_key
                .filter(|k| is_plausible_key(kind, Some(k.as_str())))
                .ok_or(ChatError::MissingApiKey("Gemini models"))?;
            let files = Arc::new(GeminiFileClient::new(key.clone()));
            ChatService::new(Arc::new(GeminiProvider::new(key)), params)
                .with_uploader(config.upload_client(files))
        }
        ProviderKind::Groq => {
            let key = groq_key
                .filter(|k| is_plausible_key(kind, Some(k.as_str())))
                .ok_or(ChatError::MissingApiKey("Groq models"))?;
            ChatService::new(Arc::new(GroqProvider::new(key)), params)
        }
    };
    let service = match args.system.or_else(|| config.system_instruction.clone()) {
        Some(system) => service.with_system_instruction(system),
        None => service,
    };

    let store = match &config.staging_dir {
        Some(dir) => AttachmentStore::in_dir(dir)?,
        None => AttachmentStore::temporary()?,
    };
    let session = SessionState::with_store(store);

    repl::print_banner(&service, kind);

    let mut repl = repl::Repl::new(service, session, models)?;
    repl.run().await
}
