//! AI response backends
//!
//! A backend turns a command plus recent conversation context into reply text.
//! Backends never fail: network and API errors degrade to an apology string so
//! the caller always has something to show.

mod chat;
mod local;

use async_trait::async_trait;

pub use chat::{ChatBackend, ChatProvider};
pub use local::LocalBackend;

use crate::config::Settings;

/// Produces replies to commands
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Engine name shown on the dashboard
    fn name(&self) -> &str;

    /// Answer `prompt`, given recent exchanges oldest first
    async fn ask(&self, prompt: &str, context: &[String]) -> String;
}

/// Build the configured backend
///
/// Unknown providers and missing API keys fall back to [`LocalBackend`].
#[must_use]
pub fn build_backend(settings: &Settings) -> Box<dyn AiBackend> {
    let keys = &settings.api_keys;
    let provider = match settings.ai_provider.as_str() {
        "groq" => keys.groq.clone().map(|k| (ChatProvider::Groq, k)),
        "openai" => keys.openai.clone().map(|k| (ChatProvider::OpenAi, k)),
        _ => None,
    };

    match provider {
        Some((provider, key)) if !key.is_empty() => {
            let model = settings
                .ai_model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string());
            tracing::info!(provider = provider.name(), model, "AI backend configured");
            Box::new(ChatBackend::new(provider, key, model))
        }
        _ => {
            tracing::info!(
                requested = settings.ai_provider,
                "no usable AI provider, using local responses"
            );
            Box::new(LocalBackend)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_uses_local() {
        let settings = Settings::default();
        assert_eq!(build_backend(&settings).name(), "Local");
    }

    #[test]
    fn test_configured_provider() {
        let mut settings = Settings::default();
        settings.ai_provider = "openai".to_string();
        settings.api_keys.openai = Some("sk-test".to_string());
        assert_eq!(build_backend(&settings).name(), "OpenAI");
    }

    #[test]
    fn test_unknown_provider_uses_local() {
        let mut settings = Settings::default();
        settings.ai_provider = "gemini".to_string();
        settings.api_keys.groq = Some("gsk-test".to_string());
        assert_eq!(build_backend(&settings).name(), "Local");
    }
}
