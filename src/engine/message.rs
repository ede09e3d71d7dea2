//! Engine messages and completion signalling

use chrono::{DateTime, Local};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::error;

use crate::models::TestCase;

/// Messages a front controller reports while discovering or executing
#[derive(Clone, Debug)]
pub enum EngineMessage {
    TestCaseDiscovered(TestCase),
    DiscoveryComplete,
    AssemblyStarting {
        test_framework: String,
        environment: String,
        started_at: DateTime<Local>,
    },
    CollectionStarting {
        collection: String,
    },
    TestPassed {
        test_case: TestCase,
        time: f64,
        output: String,
    },
    TestFailed {
        test_case: TestCase,
        time: f64,
        message: String,
        stack_trace: Option<String>,
        output: String,
    },
    TestSkipped {
        test_case: TestCase,
        reason: String,
    },
    CollectionFinished {
        collection: String,
        total: u32,
        failed: u32,
        skipped: u32,
        time: f64,
    },
    AssemblyFinished {
        total: u32,
        failed: u32,
        skipped: u32,
        time: f64,
    },
    Diagnostic(String),
    /// The engine task died before reporting completion. Terminal.
    EngineFailed(String),
}

/// Receiver for engine messages. Implementations synchronise internally.
pub trait MessageSink: Send + Sync {
    fn on_message(&self, message: EngineMessage);
}

/// Spawn an engine task and report its panic or abort to `sink`.
///
/// A task that dies never sends its completion message, so the watcher
/// sends [`EngineMessage::EngineFailed`] in its place.
pub fn spawn_watched<F>(handle: &Handle, task: F, sink: Arc<dyn MessageSink>)
where
    F: Future<Output = ()> + Send + 'static,
{
    let worker = handle.spawn(task);
    handle.spawn(async move {
        if let Err(err) = worker.await {
            error!("Engine task failed: {}", err);
            sink.on_message(EngineMessage::EngineFailed(err.to_string()));
        }
    });
}

/// One-shot completion signal.
///
/// `set` may be called any number of times; `wait` returns immediately
/// once the signal has been set.
#[derive(Debug)]
pub struct Finished {
    tx: watch::Sender<bool>,
}

impl Finished {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl Default for Finished {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct LastMessage {
        message: Mutex<Option<EngineMessage>>,
        finished: Finished,
    }

    impl MessageSink for LastMessage {
        fn on_message(&self, message: EngineMessage) {
            *self.message.lock().unwrap() = Some(message);
            self.finished.set();
        }
    }

    #[tokio::test]
    async fn test_spawn_watched_reports_panic() {
        let sink = Arc::new(LastMessage::default());
        spawn_watched(
            &Handle::current(),
            async { panic!("collection runner crashed") },
            sink.clone(),
        );

        tokio::time::timeout(Duration::from_secs(5), sink.finished.wait())
            .await
            .expect("panic should be reported");
        match sink.message.lock().unwrap().take() {
            Some(EngineMessage::EngineFailed(reason)) => {
                assert!(reason.contains("collection runner crashed"))
            }
            other => panic!("unexpected message: {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_spawn_watched_silent_on_success() {
        let sink = Arc::new(LastMessage::default());
        let done = Arc::new(Finished::new());
        let setter = done.clone();
        spawn_watched(&Handle::current(), async move { setter.set() }, sink.clone());

        done.wait().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sink.message.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finished_wakes_waiter() {
        let finished = Arc::new(Finished::new());
        assert!(!finished.is_set());

        let setter = finished.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            setter.set();
        });

        tokio::time::timeout(Duration::from_secs(5), finished.wait())
            .await
            .expect("waiter should be released");
        assert!(finished.is_set());
    }

    #[tokio::test]
    async fn test_finished_already_set() {
        let finished = Finished::new();
        finished.set();
        finished.set();
        finished.wait().await;
        assert!(finished.is_set());
    }
}
