//! OpenAI-compatible chat completions backend (Groq, `OpenAI`)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::AiBackend;
use crate::{Error, Result};

const SYSTEM_PROMPT: &str =
    "Eres Jarvis, un asistente virtual útil y amigable. Responde de forma concisa y directa.";
const MAX_TOKENS: u32 = 150;
const TEMPERATURE: f32 = 0.7;

/// Hosted chat completion service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    /// Groq
    Groq,
    /// `OpenAI`
    OpenAi,
}

impl ChatProvider {
    /// Display name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Groq => "Groq",
            Self::OpenAi => "OpenAI",
        }
    }

    /// Chat completions endpoint
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1/chat/completions",
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
        }
    }

    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Groq => "llama3-8b-8192",
            Self::OpenAi => "gpt-3.5-turbo",
        }
    }
}

/// Chat completions client
pub struct ChatBackend {
    client: Client,
    provider: ChatProvider,
    api_key: String,
    model: String,
    endpoint: String,
}

impl ChatBackend {
    /// Create a client for `provider`
    #[must_use]
    pub fn new(provider: ChatProvider, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            provider,
            api_key,
            model,
            endpoint: provider.endpoint().to_string(),
        }
    }

    /// Send requests to a different endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn complete(&self, prompt: &str, context: &[String]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: build_messages(prompt, context),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("{} request failed: {e}", self.provider.name())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "{} API error: {status} - {body}",
                self.provider.name()
            )));
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::Backend(format!(
                "failed to parse {} response: {e}",
                self.provider.name()
            ))
        })?;

        Ok(result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AiBackend for ChatBackend {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn ask(&self, prompt: &str, context: &[String]) -> String {
        tracing::debug!(provider = self.provider.name(), model = %self.model, "asking AI backend");
        match self.complete(prompt, context).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "AI backend failed");
                format!(
                    "Lo siento, no pude obtener respuesta de {}.",
                    self.provider.name()
                )
            }
        }
    }
}

fn build_messages<'a>(prompt: &'a str, context: &[String]) -> Vec<Message<'a>> {
    let mut messages = vec![Message {
        role: "system",
        content: SYSTEM_PROMPT.into(),
    }];
    if !context.is_empty() {
        messages.push(Message {
            role: "user",
            content: format!("Contexto previo: {}", context.join("\n")).into(),
        });
    }
    messages.push(Message {
        role: "user",
        content: prompt.into(),
    });
    messages
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: std::borrow::Cow<'a, str>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_include_context_when_present() {
        let context = vec!["Usuario: hola | Jarvis: ¡Hola!".to_string()];
        let messages = build_messages("qué hora es", &context);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.starts_with("Contexto previo:"));
        assert_eq!(messages[2].content, "qué hora es");

        assert_eq!(build_messages("hola", &[]).len(), 2);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Son las cinco.  "}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("  Son las cinco.  ")
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_apologizes() {
        let backend = ChatBackend::new(ChatProvider::Groq, "key".to_string(), "m".to_string())
            .with_endpoint("http://127.0.0.1:9/v1/chat/completions");
        let reply = backend.ask("hola", &[]).await;
        assert!(reply.contains("Groq"));
    }
}
