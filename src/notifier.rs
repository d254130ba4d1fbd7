//! Diagnostic notification sink.
//!
//! Matchers report why a value or request failed to match through a
//! [`Notifier`]. Reporting never affects the match outcome.

/// Receives human-readable diagnostics from the matching engine.
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
}

/// Default notifier that forwards every message to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn info(&self, message: &str) {
        tracing::info!(target: "stubwire::notify", "{}", message);
    }
}

/// Collects messages in memory so tests can assert on them.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CollectingNotifier {
    messages: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl CollectingNotifier {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[cfg(test)]
impl Notifier for CollectingNotifier {
    fn info(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
