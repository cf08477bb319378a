//! Diagnostics reported by child builds.
//!
//! Child compilations report errors and warnings of their own. They are merged
//! into the outer build's [`Diagnostics`] collection so a failing worker shows
//! up next to the rest of the build output.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A single diagnostic produced while building a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDiagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    /// Module the diagnostic points at, if the engine reported one.
    pub module: Option<String>,
    /// Child compiler that produced the diagnostic.
    pub origin: Option<String>,
}

impl WorkerDiagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            module: None,
            origin: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
            module: None,
            origin: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

#[derive(Debug, Default)]
struct Collected {
    errors: Vec<WorkerDiagnostic>,
    warnings: Vec<WorkerDiagnostic>,
}

/// Append-only diagnostics collection of the outer build.
///
/// Cloning is cheap and every clone appends to the same collection, so
/// concurrent child builds can report into it without coordination.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    inner: Arc<Mutex<Collected>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic, routed by its severity.
    pub fn push(&self, diagnostic: WorkerDiagnostic) {
        let mut collected = self.inner.lock();
        match diagnostic.severity {
            DiagnosticSeverity::Error => collected.errors.push(diagnostic),
            DiagnosticSeverity::Warning => collected.warnings.push(diagnostic),
        }
    }

    /// Append child diagnostics, stamping each with the child compiler name.
    ///
    /// Diagnostics that already carry an origin keep it.
    pub fn merge_child(
        &self,
        origin: &str,
        errors: impl IntoIterator<Item = WorkerDiagnostic>,
        warnings: impl IntoIterator<Item = WorkerDiagnostic>,
    ) {
        let stamp = |mut d: WorkerDiagnostic| {
            if d.origin.is_none() {
                d.origin = Some(origin.to_string());
            }
            d
        };

        let mut collected = self.inner.lock();
        collected.errors.extend(errors.into_iter().map(stamp));
        collected.warnings.extend(warnings.into_iter().map(stamp));
    }

    pub fn errors(&self) -> Vec<WorkerDiagnostic> {
        self.inner.lock().errors.clone()
    }

    pub fn warnings(&self) -> Vec<WorkerDiagnostic> {
        self.inner.lock().warnings.clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.inner.lock().errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        let collected = self.inner.lock();
        collected.errors.is_empty() && collected.warnings.is_empty()
    }
}
