//! Capability plugins handed out by the host engine.
//!
//! This module provides:
//! - [`PluginRole`]: the logical roles a child build needs filled
//! - [`PluginConstructor`] / [`CapabilityPlugin`]: engine-provided plugin classes and instances
//! - [`CapabilityPluginSet`]: the resolved role → class mapping for one engine
//! - [`PluginResolver`]: generation detection and per-engine caching

pub mod legacy;
pub mod resolver;

pub use resolver::{EngineId, PluginResolver, detect};

use crate::compilation::ChildCompilation;
use crate::config::ExternalItem;
use crate::engine::EngineGeneration;
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Logical role of a capability plugin in a child build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginRole {
    /// Targets a host-process (non-browser) runtime.
    NodeTarget,
    /// Registers the worker entry point.
    Entry,
    /// Wraps output in the web worker chunk format.
    WebWorkerTemplate,
    /// Leaves configured modules to be provided at runtime.
    Externals,
    /// Synchronous WebAssembly fetch/compile support.
    FetchCompileWasm,
    /// Asynchronous WebAssembly fetch/compile support (V5 only).
    FetchCompileAsyncWasm,
}

impl PluginRole {
    pub const ALL: [PluginRole; 6] = [
        PluginRole::NodeTarget,
        PluginRole::Entry,
        PluginRole::WebWorkerTemplate,
        PluginRole::Externals,
        PluginRole::FetchCompileWasm,
        PluginRole::FetchCompileAsyncWasm,
    ];

    fn index(self) -> usize {
        match self {
            PluginRole::NodeTarget => 0,
            PluginRole::Entry => 1,
            PluginRole::WebWorkerTemplate => 2,
            PluginRole::Externals => 3,
            PluginRole::FetchCompileWasm => 4,
            PluginRole::FetchCompileAsyncWasm => 5,
        }
    }
}

impl std::fmt::Display for PluginRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PluginRole::NodeTarget => "node-target",
            PluginRole::Entry => "entry",
            PluginRole::WebWorkerTemplate => "web-worker-template",
            PluginRole::Externals => "externals",
            PluginRole::FetchCompileWasm => "fetch-compile-wasm",
            PluginRole::FetchCompileAsyncWasm => "fetch-compile-async-wasm",
        };
        f.write_str(name)
    }
}

/// Arguments a plugin class is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginArgs {
    WebWorkerTemplate,
    NodeTarget,
    FetchCompileWasm {
        mangle_imports: bool,
    },
    FetchCompileAsyncWasm,
    Externals {
        externals_type: String,
        externals: Vec<ExternalItem>,
    },
    /// V5 entry registration: the name travels in an options object.
    Entry {
        context: PathBuf,
        request: String,
        name: String,
    },
    /// V4 entry registration: the name is a positional argument.
    SingleEntry {
        context: PathBuf,
        request: String,
        name: String,
    },
}

/// A plugin instance ready to be applied to a child compilation.
pub trait CapabilityPlugin: Send + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Apply the plugin to the child compilation.
    ///
    /// Engines downcast the compilation through [`ChildCompilation::as_any_mut`]
    /// to reach their concrete type.
    fn apply(self: Box<Self>, unit: &mut dyn ChildCompilation) -> Result<()>;
}

/// A plugin class exposed by the host engine.
pub trait PluginConstructor: Send + Sync + std::fmt::Debug {
    fn class_name(&self) -> &str;

    fn construct(&self, args: PluginArgs) -> Result<Box<dyn CapabilityPlugin>>;
}

/// Shared reference to a plugin class.
pub type PluginClass = Arc<dyn PluginConstructor>;

/// A role's entry in a [`CapabilityPluginSet`].
#[derive(Debug, Clone, Default)]
pub enum PluginSlot {
    Present(PluginClass),
    /// The running generation has no class for this role.
    #[default]
    Absent,
}

impl PluginSlot {
    pub fn as_class(&self) -> Option<&PluginClass> {
        match self {
            PluginSlot::Present(class) => Some(class),
            PluginSlot::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, PluginSlot::Absent)
    }
}

impl From<Option<PluginClass>> for PluginSlot {
    fn from(class: Option<PluginClass>) -> Self {
        class.map_or(PluginSlot::Absent, PluginSlot::Present)
    }
}

/// Plugin classes resolved for one host engine, tagged with its generation.
///
/// Immutable once built; shared behind an `Arc` by [`PluginResolver`].
#[derive(Debug, Clone)]
pub struct CapabilityPluginSet {
    generation: EngineGeneration,
    slots: [PluginSlot; 6],
}

impl CapabilityPluginSet {
    /// Create a set with every role absent.
    pub fn new(generation: EngineGeneration) -> Self {
        Self {
            generation,
            slots: Default::default(),
        }
    }

    /// Fill a role with a class.
    pub fn with(mut self, role: PluginRole, class: PluginClass) -> Self {
        self.slots[role.index()] = PluginSlot::Present(class);
        self
    }

    /// Fill or clear a role.
    pub fn with_slot(mut self, role: PluginRole, slot: PluginSlot) -> Self {
        self.slots[role.index()] = slot;
        self
    }

    pub fn generation(&self) -> EngineGeneration {
        self.generation
    }

    pub fn slot(&self, role: PluginRole) -> &PluginSlot {
        &self.slots[role.index()]
    }

    pub fn get(&self, role: PluginRole) -> Option<&PluginClass> {
        self.slot(role).as_class()
    }

    pub fn contains(&self, role: PluginRole) -> bool {
        self.get(role).is_some()
    }
}
