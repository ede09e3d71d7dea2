//! Discovery sink

use std::sync::{Mutex, PoisonError};

use super::{EngineMessage, Finished, MessageSink};
use crate::models::TestCase;

/// Collects discovered test cases in the order the engine reports them
#[derive(Debug, Default)]
pub struct DiscoverySink {
    test_cases: Mutex<Vec<TestCase>>,
    failure: Mutex<Option<String>>,
    finished: Finished,
}

impl DiscoverySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finished(&self) -> &Finished {
        &self.finished
    }

    /// Reason the engine aborted discovery, if it did
    pub fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take_test_cases(&self) -> Vec<TestCase> {
        std::mem::take(
            &mut *self
                .test_cases
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl MessageSink for DiscoverySink {
    fn on_message(&self, message: EngineMessage) {
        match message {
            EngineMessage::TestCaseDiscovered(test_case) => self
                .test_cases
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(test_case),
            EngineMessage::DiscoveryComplete => self.finished.set(),
            EngineMessage::EngineFailed(reason) => {
                *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
                self.finished.set();
            }
            EngineMessage::Diagnostic(text) => tracing::debug!("[discovery] {}", text),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_order_and_signals() {
        let sink = DiscoverySink::new();
        sink.on_message(EngineMessage::TestCaseDiscovered(TestCase::new("b", "b", "c")));
        sink.on_message(EngineMessage::TestCaseDiscovered(TestCase::new("a", "a", "c")));
        assert!(!sink.finished().is_set());

        sink.on_message(EngineMessage::DiscoveryComplete);
        assert!(sink.finished().is_set());

        let ids: Vec<_> = sink
            .take_test_cases()
            .into_iter()
            .map(|tc| tc.unique_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(sink.take_test_cases().is_empty());
        assert!(sink.failure().is_none());
    }

    #[test]
    fn test_engine_failure_releases_waiter() {
        let sink = DiscoverySink::new();
        sink.on_message(EngineMessage::TestCaseDiscovered(TestCase::new("a", "a", "c")));
        sink.on_message(EngineMessage::EngineFailed("task panicked".into()));

        assert!(sink.finished().is_set());
        assert_eq!(sink.failure().as_deref(), Some("task panicked"));
    }
}
