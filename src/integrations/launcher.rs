//! Application launcher integration

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Integration, IntegrationReply, ProcessRunner, spawn_error};
use crate::Result;

const KEYWORDS: &[&str] = &[
    "abrir", "abre", "ejecuta", "inicia", "lanzar", "start", "open", "run",
];

/// Launches configured applications by name
pub struct Launcher {
    apps: BTreeMap<String, String>,
    runner: Arc<dyn ProcessRunner>,
}

impl Launcher {
    /// Create a launcher for `apps` (name -> command line)
    #[must_use]
    pub fn new(apps: BTreeMap<String, String>, runner: Arc<dyn ProcessRunner>) -> Self {
        if apps.is_empty() {
            tracing::warn!("launcher has no applications configured");
        }
        Self { apps, runner }
    }

    fn find_app(&self, command: &str) -> Option<(&str, &str)> {
        let command = command.to_lowercase();
        self.apps
            .iter()
            .find(|(name, _)| command.contains(&name.to_lowercase()))
            .map(|(name, line)| (name.as_str(), line.as_str()))
    }
}

#[async_trait]
impl Integration for Launcher {
    fn id(&self) -> &str {
        "launcher"
    }

    fn capabilities(&self) -> Vec<String> {
        KEYWORDS.iter().map(ToString::to_string).collect()
    }

    async fn handle(&self, command: &str, _context: &[String]) -> Result<Option<IntegrationReply>> {
        let Some((name, command_line)) = self.find_app(command) else {
            return Ok(Some(IntegrationReply::new(
                "No encontré qué aplicación abrir. Revisa la configuración.",
            )));
        };

        tracing::info!(app = name, command_line, "launching application");
        self.runner
            .spawn_shell(command_line)
            .map_err(|e| spawn_error(self.id(), name, &e))?;

        Ok(Some(IntegrationReply::new(format!("Lanzando {name}..."))))
    }
}
