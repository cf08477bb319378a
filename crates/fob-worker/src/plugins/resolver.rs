//! Capability plugin resolution with a per-engine cache.
//!
//! Resolution inspects the engine once; later calls for the same handle get the
//! same `Arc<CapabilityPluginSet>` back. Entries hold the engine weakly and are
//! dropped once the engine is gone.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::{Arc, LazyLock, Weak};

use super::{CapabilityPluginSet, PluginRole, legacy};
use crate::engine::{EngineGeneration, HostEngine, PluginNamespace};
use crate::{Error, Result};

/// Default number of engines the resolver keeps sets for.
pub const DEFAULT_CAPACITY: usize = 64;

static GLOBAL: LazyLock<PluginResolver> = LazyLock::new(PluginResolver::new);

/// Identity token of a host engine handle (its allocation address).
///
/// The token is only meaningful while the cache holds a `Weak` to the same
/// allocation, which keeps the address from being reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(usize);

impl EngineId {
    pub fn of(engine: &Arc<dyn HostEngine>) -> Self {
        Self(Arc::as_ptr(engine).cast::<()>() as usize)
    }
}

struct CachedSet {
    engine: Weak<dyn HostEngine>,
    plugins: Arc<CapabilityPluginSet>,
}

impl CachedSet {
    fn is_alive(&self) -> bool {
        self.engine.strong_count() > 0
    }
}

/// Resolves and caches [`CapabilityPluginSet`]s per host engine.
pub struct PluginResolver {
    cache: Mutex<IndexMap<EngineId, CachedSet>>,
    capacity: usize,
}

impl PluginResolver {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a resolver that keeps at most `capacity` engines (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Process-wide resolver.
    pub fn global() -> &'static PluginResolver {
        &GLOBAL
    }

    /// Resolve the plugin set for an engine, reusing a cached set when present.
    ///
    /// Failures are not cached. The engine is inspected without holding the
    /// cache lock, so engine lookups may resolve other engines through the
    /// same resolver. When two callers race, the first inserted set wins.
    pub fn resolve(&self, engine: &Arc<dyn HostEngine>) -> Result<Arc<CapabilityPluginSet>> {
        let id = EngineId::of(engine);

        if let Some(plugins) = self.cached(id) {
            return Ok(plugins);
        }

        let plugins = Arc::new(detect(engine.as_ref())?);

        let mut cache = self.cache.lock();
        if let Some(entry) = cache.get(&id).filter(|entry| entry.is_alive()) {
            return Ok(Arc::clone(&entry.plugins));
        }

        tracing::debug!(
            version = engine.version(),
            generation = %plugins.generation(),
            "resolved capability plugins"
        );

        cache.retain(|_, entry| entry.is_alive());
        while cache.len() >= self.capacity {
            cache.shift_remove_index(0);
        }
        cache.insert(
            id,
            CachedSet {
                engine: Arc::downgrade(engine),
                plugins: Arc::clone(&plugins),
            },
        );

        Ok(plugins)
    }

    fn cached(&self, id: EngineId) -> Option<Arc<CapabilityPluginSet>> {
        let mut cache = self.cache.lock();
        match cache.get(&id) {
            Some(entry) if entry.is_alive() => Some(Arc::clone(&entry.plugins)),
            Some(_) => {
                cache.shift_remove(&id);
                None
            }
            None => None,
        }
    }

    /// Drop the cached set for one engine. Returns whether an entry existed.
    pub fn invalidate(&self, engine: &Arc<dyn HostEngine>) -> bool {
        self.cache
            .lock()
            .shift_remove(&EngineId::of(engine))
            .is_some()
    }

    /// Drop entries whose engine has been released. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let mut cache = self.cache.lock();
        let before = cache.len();
        cache.retain(|_, entry| entry.is_alive());
        before - cache.len()
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl std::fmt::Debug for PluginResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginResolver")
            .field("cached", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for PluginResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Inspect an engine and build its plugin set, without caching.
pub fn detect(engine: &dyn HostEngine) -> Result<CapabilityPluginSet> {
    match EngineGeneration::detect(engine.version()) {
        EngineGeneration::V5 => resolve_v5(engine),
        EngineGeneration::V4 => legacy::resolve(engine),
    }
}

fn resolve_v5(engine: &dyn HostEngine) -> Result<CapabilityPluginSet> {
    let namespace = engine.namespace().ok_or_else(|| {
        Error::unavailable(
            "plugin namespace",
            format!("engine {} exposes no plugin classes", engine.version()),
        )
    })?;

    let PluginNamespace {
        node_target,
        entry,
        web_worker_template,
        externals,
        fetch_compile_wasm,
        fetch_compile_async_wasm,
    } = namespace;

    let mut set = CapabilityPluginSet::new(EngineGeneration::V5);
    for (role, class) in [
        (PluginRole::NodeTarget, node_target),
        (PluginRole::Entry, entry),
        (PluginRole::WebWorkerTemplate, web_worker_template),
        (PluginRole::Externals, externals),
        (PluginRole::FetchCompileWasm, fetch_compile_wasm),
        (PluginRole::FetchCompileAsyncWasm, fetch_compile_async_wasm),
    ] {
        let class = class.ok_or_else(|| {
            Error::unavailable(
                role.to_string(),
                format!("missing from engine {} namespace", engine.version()),
            )
        })?;
        set = set.with(role, class);
    }

    Ok(set)
}
