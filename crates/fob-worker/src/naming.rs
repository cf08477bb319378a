//! Naming helpers for child builds.
//!
//! Output filename derivation, externals type inference, entry names, child
//! compiler names and the loader bypass prefix.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::config::CompilerOptions;
use crate::{Error, Result};

/// Prefix of every child compiler name.
pub const CHILD_COMPILER_PREFIX: &str = "worker-loader";

/// Request prefix that disables the outer build's loaders for a reference.
pub const LOADER_BYPASS_PREFIX: &str = "!!";

/// Global binding of the worker execution context.
pub const WORKER_GLOBAL_OBJECT: &str = "self";

/// Externals type when nothing in the outer options says otherwise.
pub const DEFAULT_EXTERNALS_TYPE: &str = "var";

const NAME_PLACEHOLDER: &str = "[name]";

// Extension plus optional query string at the end of a pattern.
static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.([a-z]+)(\?.+)?$").expect("valid extension regex"));

fn insert_worker_suffix(pattern: &str) -> String {
    EXTENSION.replace(pattern, ".worker.$1$2").into_owned()
}

/// Default worker entry filename derived from the outer build's filename.
///
/// Patterns with a `[name]` placeholder are kept as-is. The child entry is
/// named after the importing resource, so `[name].js` can resolve to the same
/// name as an outer entry; set `filename` in the loader options to avoid that.
/// Fixed names get a `.worker` infix before the extension.
pub fn default_filename(outer_filename: &str) -> String {
    if outer_filename.contains(NAME_PLACEHOLDER) {
        outer_filename.to_string()
    } else {
        insert_worker_suffix(outer_filename)
    }
}

/// Default worker chunk filename derived from the outer build's chunk filename.
///
/// Chunk ids are per-compilation, so the `.worker` infix is always inserted.
pub fn default_chunk_filename(outer_chunk_filename: &str) -> String {
    insert_worker_suffix(outer_chunk_filename)
}

/// Externals type inferred from the outer build's options.
pub fn externals_type(options: &CompilerOptions) -> String {
    if let Some(target) = &options.output.library_target {
        return target.clone();
    }
    if let Some(kind) = &options.externals_type {
        return kind.clone();
    }
    if let Some(library) = &options.output.library {
        return library.kind.clone();
    }
    if options.output.module {
        return "module".to_string();
    }
    DEFAULT_EXTERNALS_TYPE.to_string()
}

/// Entry name for a child build: the resource's base name without extension.
pub fn entry_name(resource_path: &Path) -> Result<String> {
    resource_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "resource path has no file name: {}",
                resource_path.display()
            ))
        })
}

/// Name of the child compiler created for a raw module request.
pub fn child_compiler_name(request: &str) -> String {
    format!("{CHILD_COMPILER_PREFIX} {request}")
}

/// Prefix a request so the outer build's loader chain is skipped for it.
pub fn bypass_loaders(request: &str) -> String {
    format!("{LOADER_BYPASS_PREFIX}{request}")
}
