//! Completion bridge.
//!
//! Runs a wired child compilation to completion and turns whatever the engine
//! reports into a single [`Result`]. The adapter is chosen by probing the
//! compilation itself, not by the generation the plugin set was resolved for:
//! a compilation exposing a cache speaks the newer protocol.

pub mod legacy;
pub mod modern;

pub use legacy::LegacyAdapter;
pub use modern::ModernAdapter;

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::compilation::{ChildCompilation, ChildOutput};
use crate::diagnostics::{Diagnostics, WorkerDiagnostic};
use crate::request::ChildBuildRequest;
use crate::{EmittedFiles, Error, Result};

/// Completion protocol of a child compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Future-based completion with cache access.
    Modern,
    /// Hook-based completion.
    Legacy,
}

impl AdapterKind {
    pub fn probe(unit: &dyn ChildCompilation) -> Self {
        if unit.cache().is_some() {
            AdapterKind::Modern
        } else {
            AdapterKind::Legacy
        }
    }
}

/// Per-request data an adapter needs besides the compilation.
#[derive(Debug, Clone)]
pub struct CompletionJob {
    pub request: String,
    pub compiler_name: String,
    pub entry_name: String,
    /// Diagnostics of the outer build; child errors and warnings land here.
    pub diagnostics: Diagnostics,
}

impl CompletionJob {
    pub fn new(request: &ChildBuildRequest, diagnostics: Diagnostics) -> Self {
        Self {
            request: request.request.clone(),
            compiler_name: request.compiler_name.clone(),
            entry_name: request.entry_name.clone(),
            diagnostics,
        }
    }
}

/// Drives one completion protocol.
#[async_trait]
pub trait CompletionAdapter: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> AdapterKind;

    /// Run the child build and extract the entry's emitted files.
    async fn complete(
        &self,
        unit: Box<dyn ChildCompilation>,
        job: &CompletionJob,
    ) -> Result<EmittedFiles>;
}

/// Dispatches child compilations to the matching adapter.
#[derive(Debug, Clone)]
pub struct CompletionBridge {
    modern: Arc<dyn CompletionAdapter>,
    legacy: Arc<dyn CompletionAdapter>,
}

impl Default for CompletionBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionBridge {
    pub fn new() -> Self {
        Self::with_adapters(Arc::new(ModernAdapter), Arc::new(LegacyAdapter))
    }

    pub fn with_adapters(
        modern: Arc<dyn CompletionAdapter>,
        legacy: Arc<dyn CompletionAdapter>,
    ) -> Self {
        Self { modern, legacy }
    }

    pub fn adapter(&self, kind: AdapterKind) -> &Arc<dyn CompletionAdapter> {
        match kind {
            AdapterKind::Modern => &self.modern,
            AdapterKind::Legacy => &self.legacy,
        }
    }

    /// Run the child build through the adapter its compilation calls for.
    ///
    /// An adapter panic, whether raised while creating or while polling its
    /// future, becomes [`Error::AdapterThrow`].
    pub async fn run(
        &self,
        unit: Box<dyn ChildCompilation>,
        job: CompletionJob,
    ) -> Result<EmittedFiles> {
        let kind = AdapterKind::probe(unit.as_ref());
        let adapter = self.adapter(kind);
        tracing::debug!(compiler = %job.compiler_name, ?kind, "dispatching child build");

        let outcome = match catch_unwind(AssertUnwindSafe(|| adapter.complete(unit, &job))) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(payload) => Err(payload),
        };

        outcome.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::warn!(
                compiler = %job.compiler_name,
                %message,
                "completion adapter panicked"
            );
            Err(Error::AdapterThrow {
                request: job.request.clone(),
                message,
            })
        })
    }

    /// Callback form of [`run`](Self::run). `on_done` is called exactly once.
    pub async fn run_with_callback<F>(
        &self,
        unit: Box<dyn ChildCompilation>,
        job: CompletionJob,
        on_done: F,
    ) where
        F: FnOnce(Result<EmittedFiles>) + Send,
    {
        on_done(self.run(unit, job).await);
    }
}

/// Merge the child's diagnostics into the outer build and extract the files.
///
/// A child build without an entry named after the job fails like a build
/// that reported errors.
pub(crate) fn finish(job: &CompletionJob, output: ChildOutput) -> Result<EmittedFiles> {
    let files = output.entry_files(&job.entry_name);
    let ChildOutput {
        errors, warnings, ..
    } = output;

    if !warnings.is_empty() {
        tracing::warn!(
            compiler = %job.compiler_name,
            count = warnings.len(),
            "child build reported warnings"
        );
    }

    job.diagnostics
        .merge_child(&job.compiler_name, errors.clone(), warnings);

    if !errors.is_empty() {
        tracing::warn!(
            compiler = %job.compiler_name,
            count = errors.len(),
            "child build failed"
        );
        return Err(Error::ChildBuildFailure {
            request: job.request.clone(),
            errors,
        });
    }

    let Some(files) = files else {
        let missing = WorkerDiagnostic::error(format!("failed to compile worker {}", job.request));
        job.diagnostics
            .merge_child(&job.compiler_name, [missing.clone()], Vec::new());
        tracing::warn!(
            compiler = %job.compiler_name,
            entry = %job.entry_name,
            "child build produced no worker entry"
        );
        return Err(Error::ChildBuildFailure {
            request: job.request.clone(),
            errors: vec![missing],
        });
    };

    tracing::info!(compiler = %job.compiler_name, files = files.len(), "child build finished");
    Ok(files)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "adapter panicked".to_string()
    }
}
