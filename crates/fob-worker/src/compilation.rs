//! The isolated child compilation created for one worker request.
//!
//! Engines implement [`ChildCompilation`] for their child compiler type. The
//! two engine generations finish a child build differently, so the trait has
//! one method per completion protocol; an engine implements the one it speaks
//! and leaves the other at its default, which reports the protocol as
//! unavailable.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;

use crate::diagnostics::WorkerDiagnostic;
use crate::{EmittedFiles, Error, Result};

/// Files produced for one entry point of a child build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryChunk {
    pub name: String,
    /// Emitted files in the order the engine reported them.
    pub files: Vec<String>,
}

impl EntryChunk {
    pub fn new(name: impl Into<String>, files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

/// What a finished child build reports back.
#[derive(Debug, Clone, Default)]
pub struct ChildOutput {
    pub entries: Vec<EntryChunk>,
    /// Emitted asset sources by filename.
    pub assets: IndexMap<String, String>,
    pub errors: Vec<WorkerDiagnostic>,
    pub warnings: Vec<WorkerDiagnostic>,
}

impl ChildOutput {
    /// Files of the entry named `entry_name`, or `None` when the child build
    /// produced no such entry.
    pub fn entry_files(&self, entry_name: &str) -> Option<EmittedFiles> {
        self.entries
            .iter()
            .find(|entry| entry.name == entry_name)
            .map(|entry| entry.files.clone())
    }
}

/// Cache access exposed by newer-generation child compilations.
pub trait CompilationCache: Send + Sync {
    fn get(&self, ident: &str, etag: &str) -> Option<EmittedFiles>;

    fn store(&self, ident: &str, etag: &str, files: &[String]);
}

/// One-shot completion hook for the older generation's protocol.
pub type CompletionHook = Box<dyn FnOnce(Result<ChildOutput>) + Send>;

/// An isolated child compilation owned by a single worker request.
#[async_trait]
pub trait ChildCompilation: Send {
    /// Name the outer build created this compilation under.
    fn name(&self) -> &str;

    /// Access to the concrete type for engine plugins.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Cache access; only newer-generation compilations have one.
    fn cache(&self) -> Option<Arc<dyn CompilationCache>> {
        None
    }

    /// Run the child build and resolve once it finished (newer generation).
    async fn run_as_child(&mut self) -> Result<ChildOutput> {
        Err(Error::unavailable(
            "run_as_child",
            format!("child compilation '{}' does not support it", self.name()),
        ))
    }

    /// Start the child build and fire `done` once it finished (older generation).
    ///
    /// The engine must call `done` exactly once.
    fn run_with_hook(&mut self, done: CompletionHook) {
        done(Err(Error::unavailable(
            "run_with_hook",
            format!("child compilation '{}' does not support it", self.name()),
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_files_prefers_named_entry() {
        let output = ChildOutput {
            entries: vec![
                EntryChunk::new("runtime", ["runtime.js"]),
                EntryChunk::new("worker", ["worker.js", "worker.js.map"]),
            ],
            ..Default::default()
        };

        assert_eq!(
            output.entry_files("worker"),
            Some(vec!["worker.js".to_string(), "worker.js.map".to_string()])
        );
    }

    #[test]
    fn entry_files_ignore_other_entries() {
        let output = ChildOutput {
            entries: vec![EntryChunk::new("other", ["0.worker.js"])],
            ..Default::default()
        };

        assert_eq!(output.entry_files("worker"), None);
        assert_eq!(ChildOutput::default().entry_files("worker"), None);
    }
}
