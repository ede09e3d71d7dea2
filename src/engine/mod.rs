//! Test engine capability
//!
//! The runner drives an opaque front controller through discovery and
//! execution. Both phases are submit-then-wait: the controller reports
//! progress to a [`MessageSink`] and the sink's [`Finished`] signal marks
//! completion.

mod controller;
mod discovery;
mod manifest;
mod message;

pub use controller::{ControllerFactory, DiscoveryOptions, ExecutionOptions, FrontController};
pub use discovery::DiscoverySink;
pub use manifest::{JobConfig, ManifestController, ManifestFactory, SuiteManifest};
pub use message::{spawn_watched, EngineMessage, Finished, MessageSink};

/// Short description of the host, e.g. `64-bit linux (x86_64)`.
pub fn host_environment() -> String {
    format!(
        "{}-bit {} ({})",
        usize::BITS,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
