//! Integration plugins
//!
//! An integration claims commands by keyword and may answer them. The
//! [`IntegrationRegistry`] holds the built integrations in registration order
//! and is replaced wholesale on reload: a dispatch in progress keeps the list it
//! started with.

mod launcher;
mod session;

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;

pub use launcher::Launcher;
pub use session::{SessionAction, SessionControl};

use crate::config::Settings;
use crate::{Error, Result};

/// An integration's answer to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationReply {
    /// Text shown (and spoken) to the user
    pub response: String,
}

impl IntegrationReply {
    /// Wrap a response
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

/// A command handler triggered by keywords
#[async_trait]
pub trait Integration: Send + Sync {
    /// Unique identifier
    fn id(&self) -> &str;

    /// Trigger keywords, matched case-insensitively as substrings
    fn capabilities(&self) -> Vec<String>;

    /// Handle a command
    ///
    /// `Ok(None)` declines the command so the next candidate can try.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integration`] if the handler fails
    async fn handle(&self, command: &str, context: &[String]) -> Result<Option<IntegrationReply>>;

    /// Release resources before the integration is discarded
    fn shutdown(&self) {}

    /// Whether any capability keyword occurs in `command`
    fn can_handle(&self, command: &str) -> bool {
        let command = command.to_lowercase();
        self.capabilities()
            .iter()
            .any(|cap| command.contains(&cap.to_lowercase()))
    }
}

/// Starts external programs for integrations
pub trait ProcessRunner: Send + Sync {
    /// Start `program` with `args` without waiting for it
    ///
    /// # Errors
    ///
    /// Returns error if the process cannot be started
    fn spawn(&self, program: &str, args: &[&str]) -> std::io::Result<()>;

    /// Start a shell command line without waiting for it
    ///
    /// # Errors
    ///
    /// Returns error if the shell cannot be started
    fn spawn_shell(&self, command_line: &str) -> std::io::Result<()> {
        if cfg!(windows) {
            self.spawn("cmd", &["/C", command_line])
        } else {
            self.spawn("sh", &["-c", command_line])
        }
    }
}

/// Runs processes on the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn spawn(&self, program: &str, args: &[&str]) -> std::io::Result<()> {
        tracing::debug!(program, ?args, "spawning process");
        std::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map(drop)
    }
}

/// Build the integrations enabled in `settings`, in registration order
#[must_use]
pub fn build_integrations(
    settings: &Settings,
    runner: &Arc<dyn ProcessRunner>,
) -> Vec<Arc<dyn Integration>> {
    let mut built: Vec<Arc<dyn Integration>> = Vec::new();
    let config = &settings.integrations;

    if config.launcher.enabled {
        built.push(Arc::new(Launcher::new(
            config.launcher.apps.clone(),
            Arc::clone(runner),
        )));
    } else {
        tracing::debug!("launcher integration disabled");
    }

    if config.session.enabled {
        built.push(Arc::new(SessionControl::new(Arc::clone(runner))));
    } else {
        tracing::debug!("session integration disabled");
    }

    built
}

/// Reloadable list of integrations
pub struct IntegrationRegistry {
    integrations: ArcSwap<Vec<Arc<dyn Integration>>>,
}

impl IntegrationRegistry {
    /// Create a registry over already-built integrations
    #[must_use]
    pub fn new(integrations: Vec<Arc<dyn Integration>>) -> Self {
        for integration in &integrations {
            tracing::info!(id = integration.id(), "integration registered");
        }
        Self {
            integrations: ArcSwap::from_pointee(integrations),
        }
    }

    /// Current list, in registration order
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn Integration>>> {
        self.integrations.load_full()
    }

    /// Swap in a new list and shut the old integrations down
    pub fn replace(&self, integrations: Vec<Arc<dyn Integration>>) {
        let previous = self.integrations.swap(Arc::new(integrations));
        for integration in previous.iter() {
            tracing::debug!(id = integration.id(), "shutting down integration");
            integration.shutdown();
        }
        tracing::info!(count = self.len(), "integrations reloaded");
    }

    /// Shut every integration down
    pub fn shutdown_all(&self) {
        for integration in self.snapshot().iter() {
            integration.shutdown();
        }
    }

    /// One line per integration: id and trigger keywords
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|i| format!("{} ({})", i.id(), i.capabilities().join(", ")))
            .collect()
    }

    /// Number of integrations
    #[must_use]
    pub fn len(&self) -> usize {
        self.integrations.load().len()
    }

    /// Whether no integration is loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.integrations.load().is_empty()
    }
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Map a spawn failure to an integration error
pub(crate) fn spawn_error(id: &str, what: &str, err: &std::io::Error) -> Error {
    Error::integration(id, format!("could not start {what}: {err}"))
}
