//! Execution sink: console forwarding, summary capture and report fragments

use std::sync::{Arc, Mutex, PoisonError};

use crate::engine::{EngineMessage, Finished, MessageSink};
use crate::models::{AssemblyJob, ExecutionSummary, TestCase};
use crate::output::ConsoleReporter;
use crate::results::ReportNode;

use super::failure::cause_chain;

#[derive(Default)]
struct VisitorState {
    summary: ExecutionSummary,
    assembly: Option<ReportNode>,
    /// Collection nodes in first-seen order
    collections: Vec<ReportNode>,
    failure: Option<String>,
}

impl VisitorState {
    fn collection_mut(&mut self, name: &str) -> &mut ReportNode {
        let index = match self
            .collections
            .iter()
            .position(|node| node.attr("name") == Some(name))
        {
            Some(index) => index,
            None => {
                self.collections
                    .push(ReportNode::new("collection").with_attr("name", name));
                self.collections.len() - 1
            }
        };
        &mut self.collections[index]
    }

    fn push_test(&mut self, node: ReportNode, collection: &str) {
        if self.assembly.is_some() {
            self.collection_mut(collection).push(node);
        }
    }
}

/// Sink handed to a controller's execution phase.
///
/// Every message is forwarded to the console reporter. When a report was
/// requested the visitor also builds the assembly's `<assembly>` fragment.
/// `AssemblyFinished` records the summary and releases waiters.
pub struct ExecutionVisitor {
    assembly_name: String,
    reporter: Arc<dyn ConsoleReporter>,
    state: Mutex<VisitorState>,
    finished: Finished,
}

impl ExecutionVisitor {
    pub fn new(job: &AssemblyJob, needs_report: bool, reporter: Arc<dyn ConsoleReporter>) -> Self {
        let assembly = needs_report.then(|| assembly_node(job));
        Self {
            assembly_name: job.display_name(),
            reporter,
            state: Mutex::new(VisitorState {
                assembly,
                ..Default::default()
            }),
            finished: Finished::new(),
        }
    }

    pub fn finished(&self) -> &Finished {
        &self.finished
    }

    /// Reason the engine aborted execution, if it did
    pub fn failure(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failure
            .clone()
    }

    /// Take the captured summary and fragment. Call once execution finished.
    pub fn finish(&self) -> (ExecutionSummary, Option<ReportNode>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let collections = std::mem::take(&mut state.collections);
        let fragment = state.assembly.take().map(|mut assembly| {
            for collection in collections {
                assembly.push(collection);
            }
            assembly
        });
        (state.summary, fragment)
    }

    fn record(&self, message: &EngineMessage) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match message {
            EngineMessage::AssemblyStarting {
                test_framework,
                environment,
                started_at,
            } => {
                if let Some(assembly) = state.assembly.as_mut() {
                    assembly.set_attr("test-framework", test_framework);
                    assembly.set_attr("environment", environment);
                    assembly.set_attr("run-date", started_at.format("%Y-%m-%d"));
                    assembly.set_attr("run-time", started_at.format("%H:%M:%S"));
                }
            }
            EngineMessage::CollectionStarting { collection } => {
                if state.assembly.is_some() {
                    state.collection_mut(collection);
                }
            }
            EngineMessage::TestPassed {
                test_case,
                time,
                output,
            } => {
                let node = with_output(test_node(test_case, "Pass", *time), output);
                state.push_test(node, &test_case.collection);
            }
            EngineMessage::TestFailed {
                test_case,
                time,
                message,
                stack_trace,
                output,
            } => {
                let mut failure =
                    ReportNode::new("failure").with_child(ReportNode::new("message").with_text(message));
                if let Some(trace) = stack_trace {
                    failure.push(ReportNode::new("stack-trace").with_text(trace));
                }
                let node = with_output(test_node(test_case, "Fail", *time), output).with_child(failure);
                state.push_test(node, &test_case.collection);
            }
            EngineMessage::TestSkipped { test_case, reason } => {
                let node = test_node(test_case, "Skip", 0.0)
                    .with_child(ReportNode::new("reason").with_text(reason));
                state.push_test(node, &test_case.collection);
            }
            EngineMessage::CollectionFinished {
                collection,
                total,
                failed,
                skipped,
                time,
            } => {
                if state.assembly.is_some() {
                    let summary = ExecutionSummary::new(*total, *failed, *skipped, *time);
                    set_counts(state.collection_mut(collection), &summary);
                }
            }
            EngineMessage::AssemblyFinished {
                total,
                failed,
                skipped,
                time,
            } => {
                let summary = ExecutionSummary::new(*total, *failed, *skipped, *time);
                state.summary = summary;
                if let Some(assembly) = state.assembly.as_mut() {
                    set_counts(assembly, &summary);
                }
            }
            EngineMessage::EngineFailed(reason) => state.failure = Some(reason.clone()),
            EngineMessage::TestCaseDiscovered(_)
            | EngineMessage::DiscoveryComplete
            | EngineMessage::Diagnostic(_) => {}
        }
    }
}

impl MessageSink for ExecutionVisitor {
    fn on_message(&self, message: EngineMessage) {
        self.reporter.on_message(&self.assembly_name, &message);
        self.record(&message);
        if matches!(
            message,
            EngineMessage::AssemblyFinished { .. } | EngineMessage::EngineFailed(_)
        ) {
            self.finished.set();
        }
    }
}

fn assembly_node(job: &AssemblyJob) -> ReportNode {
    let config = job
        .config_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    ReportNode::new("assembly")
        .with_attr("name", job.assembly_path.display())
        .with_attr("config-file", config)
}

fn test_node(test_case: &TestCase, result: &str, time: f64) -> ReportNode {
    let mut node = ReportNode::new("test")
        .with_attr("name", &test_case.display_name)
        .with_attr("type", &test_case.collection)
        .with_attr("method", &test_case.unique_id)
        .with_attr("time", format!("{:.3}", time))
        .with_attr("result", result);
    if !test_case.traits.is_empty() {
        let mut traits = ReportNode::new("traits");
        for (name, value) in test_case.traits.pairs() {
            traits.push(
                ReportNode::new("trait")
                    .with_attr("name", name)
                    .with_attr("value", value),
            );
        }
        node.push(traits);
    }
    node
}

fn with_output(node: ReportNode, output: &str) -> ReportNode {
    if output.is_empty() {
        node
    } else {
        node.with_child(ReportNode::new("output").with_text(output))
    }
}

fn set_counts(node: &mut ReportNode, summary: &ExecutionSummary) {
    node.set_attr("total", summary.total);
    node.set_attr("passed", summary.passed());
    node.set_attr("failed", summary.failed);
    node.set_attr("skipped", summary.skipped);
    node.set_attr("time", format!("{:.3}", summary.time));
}

/// Fragment recorded for a job that could not run at all
pub(crate) fn error_fragment(job: &AssemblyJob, err: &anyhow::Error) -> ReportNode {
    let mut errors = ReportNode::new("errors");
    errors.push(
        ReportNode::new("error")
            .with_attr("type", "fatal")
            .with_attr("name", job.display_name())
            .with_child(ReportNode::new("message").with_text(cause_chain(err).join("\n"))),
    );
    assembly_node(job)
        .with_attr("total", 0)
        .with_attr("passed", 0)
        .with_attr("failed", 0)
        .with_attr("skipped", 0)
        .with_attr("time", "0.000")
        .with_attr("errors", 1)
        .with_child(errors)
}
