//! The `listening` flag
//!
//! While any pause is held the voice loop does not open the microphone. Two
//! parties pause it: command resolution and the config watcher. Pauses nest,
//! so listening resumes only when the last guard is dropped, in whatever order
//! the guards go.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared pause counter for voice capture
#[derive(Debug, Clone, Default)]
pub struct ListeningFlag {
    pauses: Arc<AtomicUsize>,
}

impl ListeningFlag {
    /// Create a flag with no pauses held
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no pause is held
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.pauses.load(Ordering::SeqCst) == 0
    }

    /// Number of pauses currently held
    #[must_use]
    pub fn pause_depth(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    /// Hold a pause until the guard drops
    #[must_use = "listening resumes as soon as the guard is dropped"]
    pub fn pause(&self) -> PauseGuard {
        let depth = self.pauses.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(depth, "listening paused");
        PauseGuard { flag: self.clone() }
    }
}

/// Releases one pause on drop
#[derive(Debug)]
pub struct PauseGuard {
    flag: ListeningFlag,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        let depth = self.flag.pauses.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(depth, listening = depth == 0, "pause released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_and_resume() {
        let flag = ListeningFlag::new();
        assert!(flag.is_listening());
        {
            let _guard = flag.pause();
            assert!(!flag.is_listening());
        }
        assert!(flag.is_listening());
    }

    #[test]
    fn test_overlapping_pauses_release_in_any_order() {
        let flag = ListeningFlag::new();

        // outer released first
        let busy = flag.pause();
        let watcher = flag.pause();
        drop(busy);
        assert!(!flag.is_listening());
        drop(watcher);
        assert!(flag.is_listening());

        // inner released first
        let watcher = flag.pause();
        let busy = flag.pause();
        drop(busy);
        assert!(!flag.is_listening());
        assert_eq!(flag.pause_depth(), 1);
        drop(watcher);
        assert!(flag.is_listening());
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let flag = ListeningFlag::new();
        let inner = flag.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.pause();
            panic!("resolution failed");
        });
        assert!(result.is_err());
        assert!(flag.is_listening());
    }
}
