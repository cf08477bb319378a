//! Shared test utilities for fob-worker tests
//!
//! In-memory stand-ins for the host engine, its plugin classes, child
//! compilations and the loader context.

#![allow(dead_code)]

use async_trait::async_trait;
use fob_worker::plugins::legacy;
use fob_worker::{
    ChildCompilation, ChildOutput, ChildOutputOptions, CompilationCache, CompilerOptions,
    CapabilityPlugin, Diagnostics, EmittedFiles, EntryChunk, Error, HostEngine, LoaderContext,
    PluginArgs, PluginClass, PluginConstructor, PluginNamespace, Result, WorkerDiagnostic,
};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Plugin classes
// ---------------------------------------------------------------------------

/// A plugin applied to a [`FakeUnit`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPlugin {
    pub class: String,
    pub args: PluginArgs,
}

/// Plugin class whose instances record themselves on the unit they are applied to.
#[derive(Debug)]
pub struct RecordingClass {
    name: String,
}

impl RecordingClass {
    pub fn new(name: impl Into<String>) -> PluginClass {
        Arc::new(Self { name: name.into() })
    }
}

impl PluginConstructor for RecordingClass {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn construct(&self, args: PluginArgs) -> Result<Box<dyn CapabilityPlugin>> {
        Ok(Box::new(RecordedPlugin {
            class: self.name.clone(),
            args,
        }))
    }
}

#[derive(Debug)]
struct RecordedPlugin {
    class: String,
    args: PluginArgs,
}

impl CapabilityPlugin for RecordedPlugin {
    fn name(&self) -> &str {
        &self.class
    }

    fn apply(self: Box<Self>, unit: &mut dyn ChildCompilation) -> Result<()> {
        let unit = unit
            .as_any_mut()
            .downcast_mut::<FakeUnit>()
            .ok_or_else(|| Error::Engine("plugin applied to a foreign compilation".into()))?;
        unit.applied.lock().push(AppliedPlugin {
            class: self.class,
            args: self.args,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

pub struct FakeEngine {
    version: String,
    namespace: Option<PluginNamespace>,
    modules: HashMap<String, PluginClass>,
    lookups: AtomicUsize,
}

impl FakeEngine {
    /// Newer-generation engine exposing every plugin class.
    pub fn v5() -> Self {
        Self::with_namespace("5.88.2", full_namespace())
    }

    pub fn with_namespace(version: &str, namespace: PluginNamespace) -> Self {
        Self {
            version: version.to_string(),
            namespace: Some(namespace),
            modules: HashMap::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Older-generation engine with every module path available.
    pub fn v4() -> Self {
        Self::with_modules("4.46.0", legacy::MODULE_PATHS.iter().map(|(_, path, _)| *path))
    }

    /// Older-generation engine missing one module path.
    pub fn v4_without(missing: &str) -> Self {
        Self::with_modules(
            "4.46.0",
            legacy::MODULE_PATHS
                .iter()
                .map(|(_, path, _)| *path)
                .filter(|path| *path != missing),
        )
    }

    pub fn with_modules<'a>(version: &str, paths: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            version: version.to_string(),
            namespace: None,
            modules: paths
                .into_iter()
                .map(|path| (path.to_string(), RecordingClass::new(class_name(path))))
                .collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of namespace and module path lookups made so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn into_handle(self) -> Arc<dyn HostEngine> {
        Arc::new(self)
    }
}

impl HostEngine for FakeEngine {
    fn version(&self) -> &str {
        &self.version
    }

    fn namespace(&self) -> Option<PluginNamespace> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.namespace.clone()
    }

    fn require(&self, module_path: &str) -> Option<PluginClass> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.modules.get(module_path).cloned()
    }
}

pub fn full_namespace() -> PluginNamespace {
    PluginNamespace {
        node_target: Some(RecordingClass::new("NodeTargetPlugin")),
        entry: Some(RecordingClass::new("EntryPlugin")),
        web_worker_template: Some(RecordingClass::new("WebWorkerTemplatePlugin")),
        externals: Some(RecordingClass::new("ExternalsPlugin")),
        fetch_compile_wasm: Some(RecordingClass::new("FetchCompileWasmPlugin")),
        fetch_compile_async_wasm: Some(RecordingClass::new("FetchCompileAsyncWasmPlugin")),
    }
}

fn class_name(module_path: &str) -> &str {
    module_path.rsplit('/').next().unwrap_or(module_path)
}

// ---------------------------------------------------------------------------
// Child compilations
// ---------------------------------------------------------------------------

/// How a [`FakeUnit`] finishes.
#[derive(Clone)]
pub enum Completion {
    /// Report the output right away.
    Immediate(ChildOutput),
    /// Report the output from another thread after a short delay.
    Threaded(ChildOutput),
    /// Panic while running.
    Panic(&'static str),
    /// Drop the completion hook without firing it.
    DropHook,
}

/// Shared record of what happened to the units a context created.
#[derive(Clone, Default)]
pub struct UnitLog {
    pub applied: Arc<Mutex<Vec<AppliedPlugin>>>,
    /// Completion protocol methods called, in order.
    pub calls: Arc<Mutex<Vec<&'static str>>>,
}

impl UnitLog {
    pub fn applied_classes(&self) -> Vec<String> {
        self.applied.lock().iter().map(|p| p.class.clone()).collect()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

pub struct FakeUnit {
    name: String,
    applied: Arc<Mutex<Vec<AppliedPlugin>>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    completion: Completion,
    cache: Option<Arc<dyn CompilationCache>>,
}

impl FakeUnit {
    pub fn new(name: &str, log: &UnitLog, completion: Completion) -> Self {
        Self {
            name: name.to_string(),
            applied: Arc::clone(&log.applied),
            calls: Arc::clone(&log.calls),
            completion,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CompilationCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[async_trait]
impl ChildCompilation for FakeUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn cache(&self) -> Option<Arc<dyn CompilationCache>> {
        self.cache.clone()
    }

    async fn run_as_child(&mut self) -> Result<ChildOutput> {
        self.calls.lock().push("run_as_child");
        match self.completion.clone() {
            Completion::Immediate(output) => Ok(output),
            Completion::Threaded(output) => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(output)
            }
            Completion::Panic(message) => panic!("{message}"),
            Completion::DropHook => Err(Error::Engine("no hook in this protocol".into())),
        }
    }

    fn run_with_hook(&mut self, done: fob_worker::CompletionHook) {
        self.calls.lock().push("run_with_hook");
        match self.completion.clone() {
            Completion::Immediate(output) => done(Ok(output)),
            Completion::Threaded(output) => {
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_millis(10));
                    done(Ok(output));
                });
            }
            Completion::Panic(message) => panic!("{message}"),
            Completion::DropHook => drop(done),
        }
    }
}

/// Output with a single entry chunk.
pub fn emitted(entry: &str, files: &[&str]) -> ChildOutput {
    let mut output = ChildOutput {
        entries: vec![EntryChunk::new(entry, files.iter().copied())],
        ..Default::default()
    };
    for file in files {
        output
            .assets
            .insert(file.to_string(), format!("/* {file} */"));
    }
    output
}

/// Output carrying compile errors and no entry.
pub fn failed(messages: &[&str]) -> ChildOutput {
    ChildOutput {
        errors: messages
            .iter()
            .map(|m| WorkerDiagnostic::error(*m).with_module("./worker.js"))
            .collect(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MapCache {
    entries: Mutex<HashMap<(String, String), EmittedFiles>>,
    hits: AtomicUsize,
}

impl MapCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl CompilationCache for MapCache {
    fn get(&self, ident: &str, etag: &str) -> Option<EmittedFiles> {
        let found = self
            .entries
            .lock()
            .get(&(ident.to_string(), etag.to_string()))
            .cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        found
    }

    fn store(&self, ident: &str, etag: &str, files: &[String]) {
        self.entries
            .lock()
            .insert((ident.to_string(), etag.to_string()), files.to_vec());
    }
}

// ---------------------------------------------------------------------------
// Loader context
// ---------------------------------------------------------------------------

pub struct FakeContext {
    engine: Arc<dyn HostEngine>,
    options: CompilerOptions,
    resource: PathBuf,
    target: Option<String>,
    diagnostics: Diagnostics,
    completion: Mutex<Completion>,
    cache: Option<Arc<dyn CompilationCache>>,
    refuse_child: bool,
    pub log: UnitLog,
    /// Child compilers created, with their output options.
    pub created: Mutex<Vec<(String, ChildOutputOptions)>>,
}

impl FakeContext {
    pub fn new(engine: Arc<dyn HostEngine>, options: CompilerOptions) -> Self {
        Self {
            engine,
            options,
            resource: PathBuf::from("/project/src/main.js"),
            target: None,
            diagnostics: Diagnostics::new(),
            completion: Mutex::new(Completion::Immediate(emitted("main", &["worker.js"]))),
            cache: None,
            refuse_child: false,
            log: UnitLog::default(),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.resource = path.into();
        self
    }

    pub fn completion(self, completion: Completion) -> Self {
        *self.completion.lock() = completion;
        self
    }

    pub fn set_completion(&self, completion: Completion) {
        *self.completion.lock() = completion;
    }

    pub fn cache(mut self, cache: Arc<dyn CompilationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn refuse_child(mut self) -> Self {
        self.refuse_child = true;
        self
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn created_output(&self) -> ChildOutputOptions {
        self.created
            .lock()
            .last()
            .map(|(_, output)| output.clone())
            .expect("a child compiler was created")
    }
}

impl LoaderContext for FakeContext {
    fn engine(&self) -> Arc<dyn HostEngine> {
        Arc::clone(&self.engine)
    }

    fn compiler_options(&self) -> &CompilerOptions {
        &self.options
    }

    fn resource_path(&self) -> &Path {
        &self.resource
    }

    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    fn create_child_compiler(
        &self,
        name: &str,
        output: &ChildOutputOptions,
    ) -> Result<Box<dyn ChildCompilation>> {
        if self.refuse_child {
            return Err(Error::Engine(format!("cannot create child compiler '{name}'")));
        }
        self.created.lock().push((name.to_string(), output.clone()));

        let mut unit = FakeUnit::new(name, &self.log, self.completion.lock().clone());
        if let Some(cache) = &self.cache {
            unit = unit.with_cache(Arc::clone(cache));
        }
        Ok(Box::new(unit))
    }

    fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.clone()
    }
}

pub fn compiler_options(value: serde_json::Value) -> CompilerOptions {
    serde_json::from_value(value).expect("valid compiler options")
}
