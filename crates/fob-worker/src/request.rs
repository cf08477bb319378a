//! Child build configuration.
//!
//! Turns the outer build's options plus the loader options of one request into
//! a [`ChildBuildRequest`], and asks the outer build for a fresh child
//! compilation named after the request.

use std::path::PathBuf;

use crate::compilation::ChildCompilation;
use crate::config::{CompilerOptions, LoaderOptions};
use crate::loader::LoaderContext;
use crate::naming::{self, WORKER_GLOBAL_OBJECT};
use crate::Result;

/// Output configuration of a child build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildOutputOptions {
    pub filename: String,
    pub chunk_filename: String,
    pub public_path: Option<String>,
    /// Always the worker global binding (`self`).
    pub global_object: &'static str,
}

/// Everything known about one worker request before its child build starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildBuildRequest {
    /// Raw module request, e.g. `./worker.js`.
    pub request: String,
    /// Working context directory of the outer build.
    pub context: PathBuf,
    /// Target of the outer build, if it declared one.
    pub target: Option<String>,
    /// Resource that triggered this request.
    pub resource_path: PathBuf,
    /// Entry name of the child build.
    pub entry_name: String,
    /// Name the child compiler is created under.
    pub compiler_name: String,
    pub output: ChildOutputOptions,
}

impl ChildBuildRequest {
    pub fn new(
        outer: &CompilerOptions,
        request: &str,
        target: Option<&str>,
        resource_path: impl Into<PathBuf>,
        options: &LoaderOptions,
    ) -> Result<Self> {
        let resource_path = resource_path.into();
        let entry_name = naming::entry_name(&resource_path)?;

        let filename = options
            .filename
            .clone()
            .unwrap_or_else(|| naming::default_filename(&outer.output.filename));

        let chunk_filename = options.chunk_filename.clone().unwrap_or_else(|| {
            let outer_chunks = outer
                .output
                .chunk_filename
                .as_deref()
                .unwrap_or(outer.output.filename.as_str());
            naming::default_chunk_filename(outer_chunks)
        });

        let public_path = options
            .public_path
            .clone()
            .or_else(|| outer.output.public_path.clone());

        Ok(Self {
            request: request.to_string(),
            context: outer.context.clone(),
            target: target.map(str::to_string),
            resource_path,
            entry_name,
            compiler_name: naming::child_compiler_name(request),
            output: ChildOutputOptions {
                filename,
                chunk_filename,
                public_path,
                global_object: WORKER_GLOBAL_OBJECT,
            },
        })
    }

    /// Request string handed to entry registration (outer loaders bypassed).
    pub fn entry_request(&self) -> String {
        naming::bypass_loaders(&self.request)
    }
}

/// Build the request and create its child compilation.
///
/// The returned compilation has no plugins applied yet.
pub fn configure(
    ctx: &dyn LoaderContext,
    request: &str,
    options: &LoaderOptions,
) -> Result<(ChildBuildRequest, Box<dyn ChildCompilation>)> {
    let child = ChildBuildRequest::new(
        ctx.compiler_options(),
        request,
        ctx.target(),
        ctx.resource_path(),
        options,
    )?;

    tracing::debug!(
        compiler = %child.compiler_name,
        filename = %child.output.filename,
        chunk_filename = %child.output.chunk_filename,
        "creating child compiler"
    );

    let unit = ctx.create_child_compiler(&child.compiler_name, &child.output)?;
    Ok((child, unit))
}
