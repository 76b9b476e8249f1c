//! Connection Lifecycle Hooks
//!
//! Observers for connection state changes. Hooks never alter control flow;
//! they exist so hosts can surface connectivity in their UI.

use parking_lot::Mutex;

/// A lifecycle notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection attempt is starting
    Connecting {
        /// Reconnect attempt counter (0 for the initial connect)
        attempt: u32,
    },
    /// The transport is open
    Connected,
    /// The transport closed
    Disconnected {
        /// Whether the peer closed cleanly
        clean: bool,
    },
    /// A connection-level error occurred
    Error {
        /// Error description
        message: String,
    },
}

/// A registered lifecycle observer
pub type LifecycleHook = Box<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// A set of lifecycle observers
#[derive(Default)]
pub struct HookSet {
    hooks: Mutex<Vec<LifecycleHook>>,
}

impl HookSet {
    /// Create an empty hook set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn register(&self, hook: LifecycleHook) {
        self.hooks.lock().push(hook);
    }

    /// Notify every observer of an event
    pub fn emit(&self, event: &ConnectionEvent) {
        for hook in self.hooks.lock().iter() {
            hook(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_hooks_observe_events() {
        let hooks = HookSet::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        hooks.register(Box::new(move |event| {
            if matches!(event, ConnectionEvent::Connected) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        hooks.emit(&ConnectionEvent::Connected);
        hooks.emit(&ConnectionEvent::Disconnected { clean: true });
        hooks.emit(&ConnectionEvent::Connected);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_hook_set_is_silent() {
        let hooks = HookSet::new();
        hooks.emit(&ConnectionEvent::Error {
            message: "x".to_string(),
        });
    }
}
