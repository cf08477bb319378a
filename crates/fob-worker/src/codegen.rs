//! Generation of the module that replaces a worker import in the outer bundle.

use crate::config::LoaderOptions;
use crate::{Error, Result};

/// Constructor used when the options name none.
pub const DEFAULT_WORKER_CONSTRUCTOR: &str = "Worker";

/// Runtime variable holding the outer build's public path.
pub const RUNTIME_PUBLIC_PATH: &str = "__webpack_public_path__";

/// Renders the worker factory module for one emitted worker file.
#[derive(Debug, Clone, Copy)]
pub struct WorkerModule<'a> {
    options: &'a LoaderOptions,
}

impl<'a> WorkerModule<'a> {
    pub fn new(options: &'a LoaderOptions) -> Self {
        Self { options }
    }

    /// Source of the factory module constructing a worker from `filename`.
    pub fn generate(&self, filename: &str) -> Result<String> {
        let constructor = self
            .options
            .worker
            .as_ref()
            .map_or(DEFAULT_WORKER_CONSTRUCTOR, |worker| worker.kind());

        let public_path = match &self.options.public_path {
            Some(path) => json_literal(path)?,
            None => RUNTIME_PUBLIC_PATH.to_string(),
        };

        let mut args = format!("{public_path} + {}", json_literal(filename)?);
        if let Some(options) = self.options.worker.as_ref().and_then(|w| w.options()) {
            let options = serde_json::to_string(options)
                .map_err(|e| Error::InvalidConfiguration(format!("worker options: {e}")))?;
            args.push_str(", ");
            args.push_str(&options);
        }

        let export = if self.options.es_module() {
            "export default"
        } else {
            "module.exports ="
        };

        Ok(format!(
            "{export} function Worker_fn() {{\n  return new {constructor}({args});\n}}\n"
        ))
    }
}

fn json_literal(value: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::InvalidConfiguration(e.to_string()))
}
