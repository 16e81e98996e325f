//! Reentrancy guard for host notifications
//!
//! Importing an entity saves it through the host, and the host answers every
//! save with a notification. Without a guard that notification would export
//! the entity straight back to disk while the import is still running. Batch
//! operations hold a [`PauseScope`] for their whole duration and every
//! notification callback checks [`ReentrancyGuard::is_paused`] first.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Reference-counted pause flag.
///
/// Each [`pause`](Self::pause) increments a depth counter and each
/// [`unpause`](Self::unpause) decrements it; the guard reports paused while
/// the depth is above zero, so scopes nest safely.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    depth: AtomicUsize,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a paused section.
    pub fn pause(&self) {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(depth, "Notifications paused");
    }

    /// Leave a paused section. Unbalanced calls are ignored.
    pub fn unpause(&self) {
        let result = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
                depth.checked_sub(1)
            });
        match result {
            Ok(previous) => tracing::trace!(depth = previous - 1, "Notifications unpaused"),
            Err(_) => tracing::warn!("Unpause called while not paused"),
        }
    }

    /// True while at least one pause is active.
    pub fn is_paused(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Pause until the returned scope is dropped.
    ///
    /// The matching unpause runs on every exit path, including early
    /// returns and unwinding.
    pub fn pause_scope(&self) -> PauseScope<'_> {
        self.pause();
        PauseScope { guard: self }
    }
}

/// Scoped acquisition of a [`ReentrancyGuard`]
#[must_use = "notifications are unpaused as soon as the scope is dropped"]
#[derive(Debug)]
pub struct PauseScope<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for PauseScope<'_> {
    fn drop(&mut self) {
        self.guard.unpause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_pauses_and_releases() {
        let guard = ReentrancyGuard::new();
        assert!(!guard.is_paused());
        {
            let _scope = guard.pause_scope();
            assert!(guard.is_paused());
        }
        assert!(!guard.is_paused());
    }

    #[test]
    fn nested_scopes_stay_paused_until_outermost_release() {
        let guard = ReentrancyGuard::new();
        let outer = guard.pause_scope();
        {
            let _inner = guard.pause_scope();
            assert_eq!(guard.depth(), 2);
        }
        assert!(guard.is_paused(), "inner release must not clear the outer pause");
        drop(outer);
        assert!(!guard.is_paused());
    }

    #[test]
    fn scope_releases_on_early_return() {
        fn fails(guard: &ReentrancyGuard) -> Result<(), String> {
            let _scope = guard.pause_scope();
            Err::<(), String>("boom".to_string())?;
            Ok(())
        }

        let guard = ReentrancyGuard::new();
        assert!(fails(&guard).is_err());
        assert!(!guard.is_paused());
    }

    #[test]
    fn scope_releases_on_panic() {
        let guard = ReentrancyGuard::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = guard.pause_scope();
            panic!("import blew up");
        }));
        assert!(result.is_err());
        assert!(!guard.is_paused());
    }

    #[test]
    fn unbalanced_unpause_does_not_underflow() {
        let guard = ReentrancyGuard::new();
        guard.unpause();
        assert_eq!(guard.depth(), 0);
        guard.pause();
        assert!(guard.is_paused());
    }
}
