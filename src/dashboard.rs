//! Terminal dashboard
//!
//! Renders [`UiEvent`]s as lines on stdout and feeds stdin lines to the
//! assistant's input router. Logs go to stderr, so stdout carries only the
//! conversation.

use std::io::Write;
use std::sync::Arc;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::assistant::Assistant;
use crate::events::{EngineKind, Sender, UiEvent};
use crate::input::Routed;

/// Dashboard display options
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardOptions {
    /// Show [`Sender::Debug`] lines
    pub show_debug: bool,
}

/// Render one event, or `None` if it is hidden
#[must_use]
pub fn render(event: &UiEvent, options: DashboardOptions) -> Option<String> {
    match event {
        UiEvent::ChatMessage {
            sender: Sender::Debug,
            ..
        } if !options.show_debug => None,
        UiEvent::ChatMessage { sender, text } => Some(format!(
            "[{}] {sender}: {text}",
            Local::now().format("%H:%M:%S")
        )),
        UiEvent::MicStatus { active } => Some(
            if *active {
                "[mic] escuchando..."
            } else {
                "[mic] en pausa"
            }
            .to_string(),
        ),
        UiEvent::EngineInfo { kind, name } => {
            let label = match kind {
                EngineKind::Tts => "TTS",
                EngineKind::Ai => "IA",
                EngineKind::Stt => "STT",
            };
            Some(format!("[motor] {label}: {name}"))
        }
        UiEvent::MemoryInfo {
            entries,
            corrections,
        } => Some(format!(
            "[memoria] {entries} entradas, {corrections} correcciones"
        )),
        UiEvent::IntegrationsList { integrations } if integrations.is_empty() => {
            Some("[integraciones] ninguna".to_string())
        }
        UiEvent::IntegrationsList { integrations } => {
            Some(format!("[integraciones] {}", integrations.join("; ")))
        }
    }
}

/// Print events until every sender is gone
pub async fn run_dashboard(mut events: mpsc::UnboundedReceiver<UiEvent>, options: DashboardOptions) {
    while let Some(event) = events.recv().await {
        if let Some(line) = render(&event, options) {
            let mut stdout = std::io::stdout().lock();
            if writeln!(stdout, "{line}").and_then(|()| stdout.flush()).is_err() {
                break;
            }
        }
    }
    tracing::debug!("dashboard closed");
}

/// Route stdin lines to the assistant until end of input
pub async fn run_stdin(assistant: Arc<Assistant>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                if assistant.input().route(line) == Routed::Dropped {
                    break;
                }
            }
            Ok(None) => {
                tracing::info!("stdin closed");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stdin");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_lines_hidden_by_default() {
        let event = UiEvent::ChatMessage {
            sender: Sender::Debug,
            text: "detalle".to_string(),
        };
        assert!(render(&event, DashboardOptions::default()).is_none());
        let shown = render(&event, DashboardOptions { show_debug: true }).unwrap();
        assert!(shown.ends_with("Debug: detalle"));
    }

    #[test]
    fn test_status_events() {
        let options = DashboardOptions::default();
        assert_eq!(
            render(&UiEvent::MicStatus { active: true }, options).as_deref(),
            Some("[mic] escuchando...")
        );
        assert_eq!(
            render(
                &UiEvent::MemoryInfo {
                    entries: 2,
                    corrections: 1
                },
                options
            )
            .as_deref(),
            Some("[memoria] 2 entradas, 1 correcciones")
        );
        assert_eq!(
            render(
                &UiEvent::IntegrationsList {
                    integrations: Vec::new()
                },
                options
            )
            .as_deref(),
            Some("[integraciones] ninguna")
        );
    }
}
