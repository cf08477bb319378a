#![cfg_attr(docsrs, feature(doc_cfg))]

//! # fob-worker
//!
//! Child builds for worker entry points.
//!
//! When the outer build meets a worker module, this crate spins up an isolated
//! child compilation for it, wires the host engine's capability plugins into
//! that compilation, and reports the files it emitted back to the caller. Two
//! host engine API generations are supported: the newer one exposes its plugin
//! classes directly and reports completion through a future, the older one is
//! reached through module paths and reports completion through a hook.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fob_worker::{LoaderContext, LoaderOptions, WorkerLoader};
//!
//! # async fn example(ctx: &dyn LoaderContext) -> fob_worker::Result<()> {
//! let options = LoaderOptions::from_value(serde_json::json!({
//!     "filename": "[name].worker.js"
//! }))?;
//!
//! let files = WorkerLoader::new().pitch(ctx, "./worker.js", &options).await?;
//! for file in &files {
//!     println!("emitted: {file}");
//! }
//! # Ok(()) }
//! ```
//!
//! ## Pipeline
//!
//! 1. [`PluginResolver`] detects the engine generation and resolves a
//!    [`CapabilityPluginSet`] (cached per engine handle).
//! 2. [`request::configure`] derives the child output options and creates the
//!    child compilation.
//! 3. [`wiring::wire`] applies the plugins in a fixed order.
//! 4. [`CompletionBridge`] runs the child build through the adapter matching
//!    the compilation's capabilities.

pub mod bridge;
pub mod codegen;
pub mod compilation;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod loader;
pub mod naming;
pub mod plugins;
pub mod request;
pub mod wiring;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use bridge::{AdapterKind, CompletionAdapter, CompletionBridge, CompletionJob};
pub use codegen::WorkerModule;
pub use compilation::{ChildCompilation, ChildOutput, CompilationCache, CompletionHook, EntryChunk};
pub use config::{CompilerOptions, ExternalItem, LoaderOptions, OutputOptions, WorkerConstructor};
pub use diagnostics::{DiagnosticSeverity, Diagnostics, WorkerDiagnostic};
pub use engine::{EngineGeneration, HostEngine, PluginNamespace};
pub use loader::{LoaderContext, WorkerLoader};
pub use plugins::{
    CapabilityPlugin, CapabilityPluginSet, PluginArgs, PluginClass, PluginConstructor,
    PluginResolver, PluginRole, PluginSlot,
};
pub use request::{ChildBuildRequest, ChildOutputOptions};
pub use wiring::{PlannedPlugin, WiringInput, WiringStep};

/// Ordered file identifiers emitted by a child build for its worker entry.
pub type EmittedFiles = Vec<String>;

/// Error types for fob-worker operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Loader options failed schema or logical validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A plugin class or engine capability required for this request is missing.
    #[error("Collaborator unavailable: {collaborator} ({reason})")]
    CollaboratorUnavailable { collaborator: String, reason: String },

    /// The child compilation reported errors.
    #[error("Child build failed for {request}: {}", format_child_errors(.errors))]
    ChildBuildFailure {
        request: String,
        errors: Vec<WorkerDiagnostic>,
    },

    /// The completion adapter panicked or abandoned its completion hook.
    #[error("Completion adapter failed for {request}: {message}")]
    AdapterThrow { request: String, message: String },

    /// The host engine refused an operation.
    #[error("Host engine error: {0}")]
    Engine(String),
}

/// Result type alias for fob-worker operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn unavailable(collaborator: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CollaboratorUnavailable {
            collaborator: collaborator.into(),
            reason: reason.into(),
        }
    }
}

fn format_child_errors(errors: &[WorkerDiagnostic]) -> String {
    match errors {
        [] => "unknown child build error".to_string(),
        [single] => single.message.clone(),
        many => format!(
            "{} errors: {}",
            many.len(),
            many.iter()
                .map(|d| d.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Error::CollaboratorUnavailable { .. } => "COLLABORATOR_UNAVAILABLE",
            Error::ChildBuildFailure { .. } => "CHILD_BUILD_FAILURE",
            Error::AdapterThrow { .. } => "ADAPTER_THROW",
            Error::Engine(_) => "ENGINE_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::InvalidConfiguration(msg) => Some(Box::new(format!(
                "Check the worker loader options.\nError: {}",
                msg
            ))),
            Error::CollaboratorUnavailable { collaborator, .. } => Some(Box::new(format!(
                "The host engine does not provide '{}'. Check that the engine version is supported.",
                collaborator
            ))),
            Error::ChildBuildFailure { errors, .. } if errors.len() > 1 => Some(Box::new(
                "Multiple child build errors occurred. See the build diagnostics.".to_string(),
            )),
            Error::AdapterThrow { .. } => Some(Box::new(
                "This is a bug in the host engine integration. Please report it.".to_string(),
            )),
            _ => None,
        }
    }
}
