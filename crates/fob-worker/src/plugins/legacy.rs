//! Module paths of the older (V4) engine generation.
//!
//! V4 engines do not expose plugin classes on the handle; each class lives at a
//! fixed module path inside the engine package and is loaded through
//! [`HostEngine::require`].

use super::{CapabilityPluginSet, PluginRole, PluginSlot};
use crate::engine::{EngineGeneration, HostEngine};
use crate::{Error, Result};

pub const NODE_TARGET_PLUGIN: &str = "lib/node/NodeTargetPlugin";
pub const SINGLE_ENTRY_PLUGIN: &str = "lib/SingleEntryPlugin";
pub const WEB_WORKER_TEMPLATE_PLUGIN: &str = "lib/webworker/WebWorkerTemplatePlugin";
pub const EXTERNALS_PLUGIN: &str = "lib/ExternalsPlugin";
pub const FETCH_COMPILE_WASM_PLUGIN: &str = "lib/web/FetchCompileWasmTemplatePlugin";

/// Module path for each role V4 can fill, and whether it must be present.
pub const MODULE_PATHS: [(PluginRole, &str, bool); 5] = [
    (PluginRole::NodeTarget, NODE_TARGET_PLUGIN, true),
    (PluginRole::Entry, SINGLE_ENTRY_PLUGIN, true),
    (PluginRole::WebWorkerTemplate, WEB_WORKER_TEMPLATE_PLUGIN, true),
    (PluginRole::Externals, EXTERNALS_PLUGIN, true),
    (PluginRole::FetchCompileWasm, FETCH_COMPILE_WASM_PLUGIN, false),
];

/// Resolve the V4 plugin set through module paths.
///
/// The async wasm-fetch role does not exist in this generation and is always
/// [`PluginSlot::Absent`].
pub(crate) fn resolve(engine: &dyn HostEngine) -> Result<CapabilityPluginSet> {
    let mut set = CapabilityPluginSet::new(EngineGeneration::V4);

    for (role, path, required) in MODULE_PATHS {
        match engine.require(path) {
            Some(class) => set = set.with(role, class),
            None if required => {
                return Err(Error::unavailable(
                    path,
                    format!(
                        "module path not found in engine {} ({role})",
                        engine.version()
                    ),
                ));
            }
            None => {
                tracing::debug!(path, %role, "optional plugin module not available");
            }
        }
    }

    Ok(set.with_slot(PluginRole::FetchCompileAsyncWasm, PluginSlot::Absent))
}
