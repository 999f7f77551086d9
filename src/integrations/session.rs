//! Session and power control integration

use std::sync::Arc;

use async_trait::async_trait;

use super::{Integration, IntegrationReply, ProcessRunner, spawn_error};
use crate::Result;

/// A session or power action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Restart the machine
    Reboot,
    /// Power off
    Shutdown,
    /// Lock the screen
    Lock,
    /// End the user session
    Logout,
    /// Hibernate to disk
    Hibernate,
    /// Suspend to RAM
    Suspend,
}

impl SessionAction {
    /// Keywords and their actions, checked in this order
    const TRIGGERS: &'static [(&'static str, Self)] = &[
        ("reiniciar", Self::Reboot),
        ("reboot", Self::Reboot),
        ("apagar", Self::Shutdown),
        ("bloquear", Self::Lock),
        ("cerrar sesión", Self::Logout),
        ("logout", Self::Logout),
        ("hibernar", Self::Hibernate),
        ("suspender", Self::Suspend),
        ("sleep", Self::Suspend),
    ];

    /// Find the action named in `command`
    #[must_use]
    pub fn parse(command: &str) -> Option<Self> {
        let command = command.to_lowercase();
        Self::TRIGGERS
            .iter()
            .find(|(keyword, _)| command.contains(keyword))
            .map(|&(_, action)| action)
    }

    /// Platform program and arguments performing the action
    #[must_use]
    pub fn platform_command(self) -> (&'static str, &'static [&'static str]) {
        if cfg!(windows) {
            match self {
                Self::Reboot => ("shutdown", &["/r", "/t", "0"]),
                Self::Shutdown => ("shutdown", &["/s", "/t", "0"]),
                Self::Lock => ("rundll32.exe", &["user32.dll,LockWorkStation"]),
                Self::Logout => ("shutdown", &["/l"]),
                Self::Hibernate => ("shutdown", &["/h"]),
                Self::Suspend => ("rundll32.exe", &["powrprof.dll,SetSuspendState", "0,1,0"]),
            }
        } else if cfg!(target_os = "macos") {
            match self {
                Self::Reboot => ("osascript", &["-e", "tell app \"System Events\" to restart"]),
                Self::Shutdown => ("osascript", &["-e", "tell app \"System Events\" to shut down"]),
                Self::Lock => ("pmset", &["displaysleepnow"]),
                Self::Logout => ("osascript", &["-e", "tell app \"System Events\" to log out"]),
                Self::Hibernate | Self::Suspend => ("pmset", &["sleepnow"]),
            }
        } else {
            match self {
                Self::Reboot => ("systemctl", &["reboot"]),
                Self::Shutdown => ("systemctl", &["poweroff"]),
                Self::Lock => ("loginctl", &["lock-session"]),
                Self::Logout => ("loginctl", &["terminate-session", "self"]),
                Self::Hibernate => ("systemctl", &["hibernate"]),
                Self::Suspend => ("systemctl", &["suspend"]),
            }
        }
    }

    /// Confirmation shown to the user
    #[must_use]
    pub const fn confirmation(self) -> &'static str {
        match self {
            Self::Reboot => "Reiniciando el sistema...",
            Self::Shutdown => "Apagando el sistema...",
            Self::Lock => "Sesión bloqueada.",
            Self::Logout => "Cerrando sesión...",
            Self::Hibernate => "Hibernando el sistema...",
            Self::Suspend => "Suspendiendo el sistema...",
        }
    }
}

/// Locks, logs out, reboots and powers off the machine
pub struct SessionControl {
    runner: Arc<dyn ProcessRunner>,
}

impl SessionControl {
    /// Create the integration
    #[must_use]
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Integration for SessionControl {
    fn id(&self) -> &str {
        "session"
    }

    fn capabilities(&self) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();
        for (keyword, _) in SessionAction::TRIGGERS {
            if !keywords.iter().any(|k| k == *keyword) {
                keywords.push((*keyword).to_string());
            }
        }
        keywords
    }

    async fn handle(&self, command: &str, _context: &[String]) -> Result<Option<IntegrationReply>> {
        let Some(action) = SessionAction::parse(command) else {
            return Ok(Some(IntegrationReply::new(
                "No reconozco esa acción de sesión.",
            )));
        };

        let (program, args) = action.platform_command();

        tracing::warn!(?action, program, "performing session action");
        self.runner
            .spawn(program, args)
            .map_err(|e| spawn_error(self.id(), program, &e))?;

        Ok(Some(IntegrationReply::new(action.confirmation())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::Error;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ProcessRunner for Recorder {
        fn spawn(&self, program: &str, _args: &[&str]) -> std::io::Result<()> {
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
            }
            self.calls.lock().unwrap().push(program.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(SessionAction::parse("Bloquear pantalla"), Some(SessionAction::Lock));
        assert_eq!(SessionAction::parse("cerrar sesión ya"), Some(SessionAction::Logout));
        assert_eq!(SessionAction::parse("apagar todo"), Some(SessionAction::Shutdown));
        assert_eq!(SessionAction::parse("qué hora es"), None);
    }

    #[tokio::test]
    async fn test_handle_runs_platform_command() {
        let runner = Arc::new(Recorder::default());
        let session = SessionControl::new(Arc::clone(&runner) as Arc<dyn ProcessRunner>);

        let reply = session.handle("suspender el equipo", &[]).await.unwrap();
        assert_eq!(reply, Some(IntegrationReply::new("Suspendiendo el sistema...")));
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_integration_error() {
        let runner = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let session = SessionControl::new(runner);

        let err = session.handle("reiniciar", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Integration { .. }));
    }

    #[test]
    fn test_capabilities_are_unique() {
        let session = SessionControl::new(Arc::new(Recorder::default()));
        let caps = session.capabilities();
        assert!(caps.contains(&"bloquear".to_string()));
        assert_eq!(caps.len(), SessionAction::TRIGGERS.len());
    }
}
