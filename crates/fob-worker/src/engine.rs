//! Host engine handle and API generations.
//!
//! The host engine is the build engine running the outer build. This crate
//! only needs three things from it: its version string, and a way to reach the
//! plugin classes of whichever generation is running.

use crate::plugins::PluginClass;

/// Version prefix identifying the newer engine generation.
pub const V5_VERSION_PREFIX: &str = "5";

/// Major API generation of the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineGeneration {
    /// Plugin classes exposed on the engine handle; completion via `run_as_child`.
    V5,
    /// Plugin classes loaded from module paths; completion via hooks.
    V4,
}

impl EngineGeneration {
    /// Detect the generation from an engine version string.
    pub fn detect(version: &str) -> Self {
        if version.starts_with(V5_VERSION_PREFIX) {
            Self::V5
        } else {
            Self::V4
        }
    }
}

impl std::fmt::Display for EngineGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineGeneration::V5 => write!(f, "v5"),
            EngineGeneration::V4 => write!(f, "v4"),
        }
    }
}

/// Plugin classes exposed directly by a newer-generation engine.
#[derive(Debug, Clone, Default)]
pub struct PluginNamespace {
    pub node_target: Option<PluginClass>,
    pub entry: Option<PluginClass>,
    pub web_worker_template: Option<PluginClass>,
    pub externals: Option<PluginClass>,
    pub fetch_compile_wasm: Option<PluginClass>,
    pub fetch_compile_async_wasm: Option<PluginClass>,
}

/// The running host build engine.
///
/// Handles are shared as `Arc<dyn HostEngine>`. The crate never owns the
/// engine; cached data keyed by a handle holds it weakly.
pub trait HostEngine: Send + Sync {
    /// Engine version string, e.g. `"5.88.2"`.
    fn version(&self) -> &str;

    /// Plugin classes exposed on the handle (newer generation only).
    fn namespace(&self) -> Option<PluginNamespace> {
        None
    }

    /// Load a plugin class from one of the engine's module paths (older generation).
    fn require(&self, _module_path: &str) -> Option<PluginClass> {
        None
    }
}
