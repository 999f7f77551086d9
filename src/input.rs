//! Text input routing
//!
//! Every line typed on the text channel goes through [`InputRouter::route`].
//! Normally the line becomes a command. While some flow is waiting for a reply
//! (the armed command window, a reload confirmation) it holds a
//! [`ReplyClaim`] and the next line is delivered to it instead. Dropping the
//! claim releases it.

use std::sync::{Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};

/// Where a routed line went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Delivered to a waiting reply claim
    Claimed,
    /// Queued as a command
    Command,
    /// Nobody is receiving commands any more
    Dropped,
}

/// Routes text lines to commands or to a pending reply
#[derive(Debug)]
pub struct InputRouter {
    claim: Mutex<Option<oneshot::Sender<String>>>,
    commands: mpsc::UnboundedSender<String>,
}

impl InputRouter {
    /// Create a router and the receiver for ordinary commands
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (
            Self {
                claim: Mutex::new(None),
                commands,
            },
            rx,
        )
    }

    /// Claim the next line
    ///
    /// A newer claim replaces an older one, whose receiver then yields `None`.
    #[must_use]
    pub fn claim(&self) -> ReplyClaim {
        let (tx, rx) = oneshot::channel();
        let previous = self
            .claim
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx);
        if previous.is_some() {
            tracing::debug!("replacing pending reply claim");
        }
        ReplyClaim { rx }
    }

    /// Claim the next line unless another live claim is pending
    ///
    /// For flows that must not take input away from a question already being
    /// asked.
    #[must_use]
    pub fn try_claim(&self) -> Option<ReplyClaim> {
        let mut slot = self.claim.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        *slot = Some(tx);
        Some(ReplyClaim { rx })
    }

    /// Deliver a line
    pub fn route(&self, line: String) -> Routed {
        let pending = self
            .claim
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let line = match pending {
            Some(tx) => match tx.send(line) {
                Ok(()) => return Routed::Claimed,
                // claimant went away; treat as an ordinary command
                Err(line) => line,
            },
            None => line,
        };

        if self.commands.send(line).is_ok() {
            Routed::Command
        } else {
            tracing::warn!("command receiver closed, dropping text input");
            Routed::Dropped
        }
    }
}

/// A pending claim on the next text line
#[derive(Debug)]
pub struct ReplyClaim {
    rx: oneshot::Receiver<String>,
}

impl ReplyClaim {
    /// Wait for the claimed line; `None` if the claim was superseded
    pub async fn recv(self) -> Option<String> {
        self.rx.await.ok()
    }
}
