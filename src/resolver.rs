//! Response resolution
//!
//! Integrations get the first chance to answer, in registration order; the AI
//! backend answers whatever they decline. A blank answer becomes
//! [`NO_RESPONSE`].

use std::sync::Arc;

use crate::ai::AiBackend;
use crate::integrations::Integration;

/// Shown when nothing produced a usable answer
pub const NO_RESPONSE: &str = "No se pudo generar respuesta.";

/// Who produced a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    /// An integration, by id
    Integration(String),
    /// The AI backend, by name
    Backend(String),
    /// Nothing usable was produced
    Fallback,
}

/// The answer to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Answer text
    pub response: String,
    /// Who answered
    pub source: ResponseSource,
}

/// Resolve `command` into an answer
///
/// Integration errors are logged and the integration is skipped.
pub async fn resolve(
    command: &str,
    context: &[String],
    integrations: &[Arc<dyn Integration>],
    backend: &dyn AiBackend,
) -> Resolution {
    for integration in integrations.iter().filter(|i| i.can_handle(command)) {
        let id = integration.id();
        tracing::debug!(integration = id, command, "dispatching to integration");

        match integration.handle(command, context).await {
            Ok(Some(reply)) if !reply.response.trim().is_empty() => {
                return Resolution {
                    response: reply.response,
                    source: ResponseSource::Integration(id.to_string()),
                };
            }
            Ok(_) => tracing::debug!(integration = id, "integration declined"),
            Err(e) => tracing::warn!(integration = id, error = %e, "integration failed"),
        }
    }

    let response = backend.ask(command, context).await;
    if response.trim().is_empty() {
        tracing::warn!(backend = backend.name(), "empty response");
        return Resolution {
            response: NO_RESPONSE.to_string(),
            source: ResponseSource::Fallback,
        };
    }

    Resolution {
        response,
        source: ResponseSource::Backend(backend.name().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::integrations::IntegrationReply;
    use crate::{Error, Result};

    struct Canned(&'static str);

    #[async_trait]
    impl AiBackend for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn ask(&self, _: &str, _: &[String]) -> String {
            self.0.to_string()
        }
    }

    enum Behaviour {
        Answer(&'static str),
        Decline,
        Fail,
    }

    struct Fixed {
        id: &'static str,
        keyword: &'static str,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl Integration for Fixed {
        fn id(&self) -> &str {
            self.id
        }

        fn capabilities(&self) -> Vec<String> {
            vec![self.keyword.to_string()]
        }

        async fn handle(&self, _: &str, _: &[String]) -> Result<Option<IntegrationReply>> {
            match self.behaviour {
                Behaviour::Answer(text) => Ok(Some(IntegrationReply::new(text))),
                Behaviour::Decline => Ok(None),
                Behaviour::Fail => Err(Error::integration(self.id, "boom")),
            }
        }
    }

    fn fixed(id: &'static str, keyword: &'static str, behaviour: Behaviour) -> Arc<dyn Integration> {
        Arc::new(Fixed {
            id,
            keyword,
            behaviour,
        })
    }

    #[tokio::test]
    async fn test_matching_integration_wins_over_backend() {
        let integrations = vec![fixed("apps", "abre", Behaviour::Answer("Lanzando..."))];
        let r = resolve("abre firefox", &[], &integrations, &Canned("ai")).await;
        assert_eq!(r.response, "Lanzando...");
        assert_eq!(r.source, ResponseSource::Integration("apps".to_string()));
    }

    #[tokio::test]
    async fn test_decline_and_failure_fall_through() {
        let integrations = vec![
            fixed("broken", "abre", Behaviour::Fail),
            fixed("shy", "abre", Behaviour::Decline),
            fixed("apps", "abre", Behaviour::Answer("ok")),
        ];
        let r = resolve("Abre algo", &[], &integrations, &Canned("ai")).await;
        assert_eq!(r.source, ResponseSource::Integration("apps".to_string()));
    }

    #[tokio::test]
    async fn test_unmatched_goes_to_backend() {
        let integrations = vec![fixed("apps", "abre", Behaviour::Answer("no"))];
        let r = resolve("qué hora es", &[], &integrations, &Canned("las cinco")).await;
        assert_eq!(r.response, "las cinco");
        assert_eq!(r.source, ResponseSource::Backend("canned".to_string()));
    }

    #[tokio::test]
    async fn test_blank_answer_becomes_sentinel() {
        let r = resolve("qué hora es", &[], &[], &Canned("   ")).await;
        assert_eq!(r.response, NO_RESPONSE);
        assert_eq!(r.source, ResponseSource::Fallback);
    }
}
