//! Worker loader entry point.
//!
//! [`WorkerLoader::pitch`] runs the whole pipeline for one worker request:
//! validate options, resolve the engine's plugins, configure and wire the
//! child compilation, then complete it through the [`CompletionBridge`].

use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

use crate::bridge::{CompletionBridge, CompletionJob};
use crate::codegen::WorkerModule;
use crate::compilation::ChildCompilation;
use crate::config::{CompilerOptions, LoaderOptions};
use crate::diagnostics::{Diagnostics, WorkerDiagnostic};
use crate::engine::HostEngine;
use crate::plugins::PluginResolver;
use crate::request::{self, ChildOutputOptions};
use crate::wiring::{self, WiringInput};
use crate::{EmittedFiles, Error, Result};

/// What the outer build exposes to the loader for one request.
pub trait LoaderContext: Send + Sync {
    fn engine(&self) -> Arc<dyn HostEngine>;

    fn compiler_options(&self) -> &CompilerOptions;

    /// Resource whose import triggered the request.
    fn resource_path(&self) -> &Path;

    /// Target of the outer build, if declared.
    fn target(&self) -> Option<&str>;

    /// Create a fresh child compilation with the given output options.
    fn create_child_compiler(
        &self,
        name: &str,
        output: &ChildOutputOptions,
    ) -> Result<Box<dyn ChildCompilation>>;

    /// Diagnostics collection of the outer build.
    fn diagnostics(&self) -> Diagnostics;
}

#[derive(Debug, Clone)]
enum Resolver {
    Global,
    Owned(Arc<PluginResolver>),
}

/// Runs worker requests against a resolver and a completion bridge.
#[derive(Debug, Clone)]
pub struct WorkerLoader {
    resolver: Resolver,
    bridge: CompletionBridge,
}

impl Default for WorkerLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerLoader {
    /// Loader using the process-wide resolver and the default adapters.
    pub fn new() -> Self {
        Self {
            resolver: Resolver::Global,
            bridge: CompletionBridge::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<PluginResolver>) -> Self {
        self.resolver = Resolver::Owned(resolver);
        self
    }

    pub fn with_bridge(mut self, bridge: CompletionBridge) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn resolver(&self) -> &PluginResolver {
        match &self.resolver {
            Resolver::Global => PluginResolver::global(),
            Resolver::Owned(resolver) => resolver,
        }
    }

    /// Build the worker entry for `request` in a child compilation.
    ///
    /// Returns the files emitted for the worker entry. Child compile errors are
    /// merged into the context's diagnostics and reported as
    /// [`Error::ChildBuildFailure`].
    pub async fn pitch(
        &self,
        ctx: &dyn LoaderContext,
        request: &str,
        options: &LoaderOptions,
    ) -> Result<EmittedFiles> {
        let span = tracing::info_span!(
            "worker_child_build",
            request,
            compiler = tracing::field::Empty
        );

        async move {
            options.validate()?;

            let engine = ctx.engine();
            let plugins = self.resolver().resolve(&engine)?;

            let (child, mut unit) = request::configure(ctx, request, options)?;
            tracing::Span::current().record("compiler", child.compiler_name.as_str());

            let input = WiringInput::new(&child, ctx.compiler_options());
            let applied = wiring::wire(unit.as_mut(), &plugins, &input)?;
            tracing::debug!(?applied, generation = %plugins.generation(), "child compilation wired");

            let job = CompletionJob::new(&child, ctx.diagnostics());
            self.bridge.run(unit, job).await
        }
        .instrument(span)
        .await
    }

    /// Callback form of [`pitch`](Self::pitch). `on_done` is called exactly once.
    pub async fn pitch_with_callback<F>(
        &self,
        ctx: &dyn LoaderContext,
        request: &str,
        options: &LoaderOptions,
        on_done: F,
    ) where
        F: FnOnce(Result<EmittedFiles>) + Send,
    {
        on_done(self.pitch(ctx, request, options).await);
    }

    /// Build the worker and render the module replacing its import.
    ///
    /// The module constructs the worker from the first emitted file.
    pub async fn pitch_module(
        &self,
        ctx: &dyn LoaderContext,
        request: &str,
        options: &LoaderOptions,
    ) -> Result<String> {
        let files = self.pitch(ctx, request, options).await?;
        let Some(entry) = files.first() else {
            return Err(Error::ChildBuildFailure {
                request: request.to_string(),
                errors: vec![WorkerDiagnostic::error(
                    "child build emitted no files for the worker entry",
                )],
            });
        };
        WorkerModule::new(options).generate(entry)
    }
}
