//! Configuration types.
//!
//! - [`CompilerOptions`]: the outer build's options, as far as child builds read them
//! - [`LoaderOptions`]: per-request worker loader options
//!
//! Loader options are layered with figment (defaults < config file < inline
//! options), checked against their JSON schema and then validated logically.

use figment::{
    Figment,
    providers::{Format as _, Json, Serialized},
};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Default output filename pattern of the outer build.
pub const DEFAULT_OUTPUT_FILENAME: &str = "[name].js";

/// Config file picked up by [`LoaderOptions::load`] when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "fob-worker.json";

/// Options of the outer build that child builds depend on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Working context directory of the outer build.
    #[serde(default)]
    pub context: PathBuf,

    #[serde(default)]
    pub output: OutputOptions,

    #[serde(default)]
    pub optimization: OptimizationOptions,

    /// External modules, verbatim. `None` when the key is not declared.
    #[serde(
        default,
        deserialize_with = "deserialize_externals",
        skip_serializing_if = "Option::is_none"
    )]
    pub externals: Option<Vec<ExternalItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub externals_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    #[serde(default = "default_output_filename")]
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_object: Option<String>,

    /// Older-generation library target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<LibraryOptions>,

    /// Output is emitted as ES modules.
    #[serde(default)]
    pub module: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            filename: default_output_filename(),
            chunk_filename: None,
            public_path: None,
            global_object: None,
            library_target: None,
            library: None,
            module: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryOptions {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationOptions {
    #[serde(default)]
    pub mangle_wasm_imports: bool,
}

/// One entry of the outer build's `externals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalItem {
    /// A module name left external as-is.
    Name(String),
    /// Module name → runtime reference.
    Map(IndexMap<String, Value>),
}

fn default_output_filename() -> String {
    DEFAULT_OUTPUT_FILENAME.to_string()
}

fn deserialize_externals<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<ExternalItem>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<ExternalItem>),
        One(ExternalItem),
    }

    Ok(Some(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    }))
}

/// Worker constructor used by the generated worker module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum WorkerConstructor {
    /// Constructor name, e.g. `"SharedWorker"`.
    Type(String),
    /// Constructor name plus options passed as its second argument.
    Detailed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Map<String, Value>>,
    },
}

impl WorkerConstructor {
    pub fn kind(&self) -> &str {
        match self {
            WorkerConstructor::Type(kind) => kind,
            WorkerConstructor::Detailed { kind, .. } => kind,
        }
    }

    pub fn options(&self) -> Option<&Map<String, Value>> {
        match self {
            WorkerConstructor::Type(_) => None,
            WorkerConstructor::Detailed { options, .. } => options.as_ref(),
        }
    }
}

/// Worker loader options.
///
/// `filename` and `chunkFilename` are restricted to the child output
/// directory: absolute paths and `..` segments are rejected by
/// [`LoaderOptions::validate`], even though the host engine would accept them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoaderOptions {
    /// Filename pattern of the worker entry chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Filename pattern of non-entry worker chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_filename: Option<String>,

    /// Public path the worker bundle is served from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_path: Option<String>,

    /// Worker constructor for the generated module (defaults to `Worker`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerConstructor>,

    /// Emit an ES module (`export default`) instead of CommonJS (defaults to true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es_module: Option<bool>,
}

impl LoaderOptions {
    /// JSON schema of the loader options.
    pub fn schema() -> Value {
        schemars::schema_for!(LoaderOptions).to_value()
    }

    /// Check a raw options value against [`LoaderOptions::schema`].
    pub fn check_schema(value: &Value) -> Result<()> {
        let schema = Self::schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| Error::InvalidConfiguration(format!("invalid options schema: {e}")))?;

        let problems: Vec<String> = validator
            .iter_errors(value)
            .map(|e| e.to_string())
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration(problems.join("; ")))
        }
    }

    /// Create from a raw JSON value (schema check, deserialize, validate).
    pub fn from_value(value: Value) -> Result<Self> {
        Self::check_schema(&value)?;
        let options: LoaderOptions = serde_json::from_value(value)
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from multiple sources.
    /// Priority: inline options > config file > defaults
    ///
    /// Each top-level key comes from one source: an inline `worker` object
    /// replaces the file's `worker` rather than merging into it.
    ///
    /// Without an explicit `config_file`, `fob-worker.json` in the current
    /// directory is used when it exists.
    pub fn load(inline: &Value, config_file: Option<&Path>) -> Result<Self> {
        Self::check_schema(inline)?;

        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let config_file = config_file.map(Path::to_path_buf).or_else(|| {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            default_path.exists().then(|| default_path.to_path_buf())
        });

        if let Some(path) = config_file {
            tracing::debug!(path = %path.display(), "merging worker loader config file");
            let mut file: Map<String, Value> = Figment::from(Json::file(path))
                .extract()
                .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
            // Inline keys replace file values whole; figment would deep-merge them.
            if let Some(inline) = inline.as_object() {
                file.retain(|key, _| !inline.contains_key(key));
            }
            figment = figment.merge(Serialized::defaults(file));
        }

        figment = figment.merge(Serialized::defaults(inline));

        let options: LoaderOptions = figment
            .extract()
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Validate options for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if let Some(filename) = &self.filename {
            validate_pattern("filename", filename)?;
        }
        if let Some(chunk_filename) = &self.chunk_filename {
            validate_pattern("chunkFilename", chunk_filename)?;
        }
        if let Some(worker) = &self.worker {
            validate_identifier("worker", worker.kind())?;
        }
        Ok(())
    }

    pub fn es_module(&self) -> bool {
        self.es_module.unwrap_or(true)
    }
}

/// Validate an output filename pattern: non-empty, relative, no `..` segments.
///
/// Worker bundles must not be written outside the output directory.
fn validate_pattern(field: &str, pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(Error::InvalidConfiguration(format!(
            "{field} cannot be empty"
        )));
    }

    let path = Path::new(pattern);
    if path.is_absolute() || pattern.starts_with('/') {
        return Err(Error::InvalidConfiguration(format!(
            "{field} must be relative to the output directory (got '{pattern}')"
        )));
    }

    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::InvalidConfiguration(format!(
            "{field} cannot contain '..' segments (got '{pattern}')"
        )));
    }

    Ok(())
}

/// Validate a name follows JavaScript identifier rules.
fn validate_identifier(field: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(Error::InvalidConfiguration(format!(
            "{field} cannot be empty"
        )));
    };

    if !first.is_alphabetic() && first != '_' && first != '$' {
        return Err(Error::InvalidConfiguration(format!(
            "{field} must start with a letter, underscore, or dollar sign (got '{name}')"
        )));
    }

    if let Some(c) = chars.find(|c| !c.is_alphanumeric() && *c != '_' && *c != '$') {
        return Err(Error::InvalidConfiguration(format!(
            "invalid character '{c}' in {field} '{name}'"
        )));
    }

    Ok(())
}
