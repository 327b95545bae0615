//! Known models and provider selection

/// Multi-modal models (text, image, audio, video, PDF)
pub const GOOGLE_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-pro"];

/// Text models served through Groq
pub const GROQ_MODELS: &[&str] = &[
    "llama-3.1-8b-instant",
    "llama-3.1-70b-versatile",
    "llama3-70b-8192",
    "llama3-8b-8192",
    "gemma2-9b-it",
    "mixtral-8x7b-32768",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    Groq,
}

impl ProviderKind {
    /// Pick the provider serving a model, by name prefix
    pub fn for_model(model: &str) -> Option<Self> {
        if model.starts_with("gemini") {
            Some(ProviderKind::Google)
        } else if ["llama", "gemma", "mixtral"]
            .iter()
            .any(|p| model.starts_with(p))
        {
            Some(ProviderKind::Groq)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Groq => "groq",
        }
    }

    /// Substring every valid key for this provider contains
    fn key_marker(&self) -> &'static str {
        match self {
            ProviderKind::Google => "AIza",
            ProviderKind::Groq => "gsk",
        }
    }
}

/// Cheap sanity check before any network call
pub fn is_plausible_key(kind: ProviderKind, key: Option<&str>) -> bool {
    key.is_some_and(|k| k.contains(kind.key_marker()))
}

/// Models usable with the keys at hand, Google first
pub fn available_models(google_key: Option<&str>, groq_key: Option<&str>) -> Vec<&'static str> {
    let mut models = Vec::new();
    if is_plausible_key(ProviderKind::Google, google_key) {
        models.extend_from_slice(GOOGLE_MODELS);
    }
    if is_plausible_key(ProviderKind::Groq, groq_key) {
        models.extend_from_slice(GROQ_MODELS);
    }
    models
}
