//! Plugin wiring for child compilations.
//!
//! Wiring is an ordered list of [`WiringStep`]s. Each step declares when it
//! applies and whether a missing plugin class is an error. [`plan`] turns a
//! plugin set and a request into the list of plugins to apply without touching
//! any compilation; [`wire`] constructs and applies them.

use std::path::PathBuf;

use crate::compilation::ChildCompilation;
use crate::config::{CompilerOptions, ExternalItem};
use crate::engine::EngineGeneration;
use crate::plugins::{CapabilityPluginSet, PluginArgs, PluginClass, PluginRole};
use crate::request::ChildBuildRequest;
use crate::{Error, Result, naming};

/// Targets for which the child build keeps browser semantics.
pub const BROWSER_TARGETS: [&str; 2] = ["webworker", "web"];

/// One step of child compilation wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WiringStep {
    /// Worker chunk wrapper format. Always applied.
    WebWorkerTemplate,
    /// Host-process runtime, unless the outer target is a browser target.
    NodeTarget,
    /// Synchronous wasm fetch, when the engine has the class.
    FetchCompileWasm,
    /// Asynchronous wasm fetch, when the engine has the class.
    FetchCompileAsyncWasm,
    /// Externals, when the outer build declares any.
    Externals,
    /// Entry registration. Always applied, always last.
    Entry,
}

impl WiringStep {
    /// Application order.
    pub const ORDER: [WiringStep; 6] = [
        WiringStep::WebWorkerTemplate,
        WiringStep::NodeTarget,
        WiringStep::FetchCompileWasm,
        WiringStep::FetchCompileAsyncWasm,
        WiringStep::Externals,
        WiringStep::Entry,
    ];

    pub fn role(self) -> PluginRole {
        match self {
            WiringStep::WebWorkerTemplate => PluginRole::WebWorkerTemplate,
            WiringStep::NodeTarget => PluginRole::NodeTarget,
            WiringStep::FetchCompileWasm => PluginRole::FetchCompileWasm,
            WiringStep::FetchCompileAsyncWasm => PluginRole::FetchCompileAsyncWasm,
            WiringStep::Externals => PluginRole::Externals,
            WiringStep::Entry => PluginRole::Entry,
        }
    }

    /// Whether a missing class fails wiring once the step applies.
    ///
    /// The wasm steps apply only when their class is present.
    pub fn requires_class(self) -> bool {
        !matches!(
            self,
            WiringStep::FetchCompileWasm | WiringStep::FetchCompileAsyncWasm
        )
    }

    /// Whether the step applies to this request.
    pub fn applies(self, input: &WiringInput) -> bool {
        match self {
            WiringStep::NodeTarget => !input.is_browser_target(),
            WiringStep::Externals => input.externals.is_some(),
            WiringStep::WebWorkerTemplate
            | WiringStep::FetchCompileWasm
            | WiringStep::FetchCompileAsyncWasm
            | WiringStep::Entry => true,
        }
    }

    fn args(self, input: &WiringInput, generation: EngineGeneration) -> PluginArgs {
        match self {
            WiringStep::WebWorkerTemplate => PluginArgs::WebWorkerTemplate,
            WiringStep::NodeTarget => PluginArgs::NodeTarget,
            WiringStep::FetchCompileWasm => PluginArgs::FetchCompileWasm {
                mangle_imports: input.mangle_wasm_imports,
            },
            WiringStep::FetchCompileAsyncWasm => PluginArgs::FetchCompileAsyncWasm,
            WiringStep::Externals => PluginArgs::Externals {
                externals_type: input.externals_type.clone(),
                externals: input.externals.clone().unwrap_or_default(),
            },
            WiringStep::Entry => {
                let context = input.context.clone();
                let request = input.entry_request.clone();
                let name = input.entry_name.clone();
                match generation {
                    EngineGeneration::V5 => PluginArgs::Entry {
                        context,
                        request,
                        name,
                    },
                    EngineGeneration::V4 => PluginArgs::SingleEntry {
                        context,
                        request,
                        name,
                    },
                }
            }
        }
    }
}

/// Request data the wiring steps read.
#[derive(Debug, Clone, PartialEq)]
pub struct WiringInput {
    pub target: Option<String>,
    pub mangle_wasm_imports: bool,
    pub externals: Option<Vec<ExternalItem>>,
    pub externals_type: String,
    pub context: PathBuf,
    /// Entry request with the loader bypass prefix applied.
    pub entry_request: String,
    pub entry_name: String,
}

impl WiringInput {
    pub fn new(request: &ChildBuildRequest, outer: &CompilerOptions) -> Self {
        Self {
            target: request.target.clone(),
            mangle_wasm_imports: outer.optimization.mangle_wasm_imports,
            externals: outer.externals.clone(),
            externals_type: naming::externals_type(outer),
            context: request.context.clone(),
            entry_request: request.entry_request(),
            entry_name: request.entry_name.clone(),
        }
    }

    pub fn is_browser_target(&self) -> bool {
        self.target
            .as_deref()
            .is_some_and(|target| BROWSER_TARGETS.contains(&target))
    }
}

/// A plugin selected for application.
#[derive(Debug, Clone)]
pub struct PlannedPlugin {
    pub step: WiringStep,
    pub class: PluginClass,
    pub args: PluginArgs,
}

/// Select the plugins to apply, in application order.
pub fn plan(set: &CapabilityPluginSet, input: &WiringInput) -> Result<Vec<PlannedPlugin>> {
    let mut planned = Vec::with_capacity(WiringStep::ORDER.len());

    for step in WiringStep::ORDER {
        if !step.applies(input) {
            continue;
        }

        let Some(class) = set.get(step.role()) else {
            if step.requires_class() {
                return Err(Error::unavailable(
                    step.role().to_string(),
                    format!("no plugin class in the {} plugin set", set.generation()),
                ));
            }
            continue;
        };

        planned.push(PlannedPlugin {
            step,
            class: class.clone(),
            args: step.args(input, set.generation()),
        });
    }

    Ok(planned)
}

/// Construct and apply the planned plugins to a child compilation.
///
/// Returns the steps that were applied.
pub fn wire(
    unit: &mut dyn ChildCompilation,
    set: &CapabilityPluginSet,
    input: &WiringInput,
) -> Result<Vec<WiringStep>> {
    let planned = plan(set, input)?;
    let mut applied = Vec::with_capacity(planned.len());

    for PlannedPlugin { step, class, args } in planned {
        let plugin = class.construct(args)?;
        tracing::debug!(
            compiler = unit.name(),
            plugin = plugin.name(),
            ?step,
            "applying plugin"
        );
        plugin.apply(unit)?;
        applied.push(step);
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{CapabilityPlugin, PluginConstructor};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Class(&'static str);

    impl PluginConstructor for Class {
        fn class_name(&self) -> &str {
            self.0
        }

        fn construct(&self, _args: PluginArgs) -> Result<Box<dyn CapabilityPlugin>> {
            Err(Error::unavailable(self.0, "plan tests never construct"))
        }
    }

    fn full_set(generation: EngineGeneration) -> CapabilityPluginSet {
        PluginRole::ALL
            .into_iter()
            .fold(CapabilityPluginSet::new(generation), |set, role| {
                set.with(role, Arc::new(Class("Plugin")))
            })
    }

    fn input(target: Option<&str>) -> WiringInput {
        WiringInput {
            target: target.map(str::to_string),
            mangle_wasm_imports: false,
            externals: None,
            externals_type: "var".into(),
            context: PathBuf::from("/project"),
            entry_request: "!!./worker.js".into(),
            entry_name: "main".into(),
        }
    }

    fn steps(planned: &[PlannedPlugin]) -> Vec<WiringStep> {
        planned.iter().map(|p| p.step).collect()
    }

    #[test]
    fn full_v5_set_plans_in_order() {
        let planned = plan(&full_set(EngineGeneration::V5), &input(Some("node"))).unwrap();
        assert_eq!(
            steps(&planned),
            vec![
                WiringStep::WebWorkerTemplate,
                WiringStep::NodeTarget,
                WiringStep::FetchCompileWasm,
                WiringStep::FetchCompileAsyncWasm,
                WiringStep::Entry,
            ]
        );
    }

    #[test]
    fn browser_targets_skip_node_target() {
        for target in ["web", "webworker"] {
            let planned = plan(&full_set(EngineGeneration::V5), &input(Some(target))).unwrap();
            assert!(!steps(&planned).contains(&WiringStep::NodeTarget), "{target}");
        }
    }

    #[test]
    fn other_targets_apply_node_target() {
        for target in [None, Some(""), Some("node"), Some("electron-renderer"), Some("Web")] {
            let planned = plan(&full_set(EngineGeneration::V5), &input(target)).unwrap();
            assert!(
                steps(&planned).contains(&WiringStep::NodeTarget),
                "{target:?}"
            );
        }
    }

    #[test]
    fn absent_wasm_classes_are_skipped() {
        let set = full_set(EngineGeneration::V4)
            .with_slot(PluginRole::FetchCompileWasm, Default::default())
            .with_slot(PluginRole::FetchCompileAsyncWasm, Default::default());
        let planned = plan(&set, &input(Some("web"))).unwrap();

        assert_eq!(
            steps(&planned),
            vec![WiringStep::WebWorkerTemplate, WiringStep::Entry]
        );
    }

    #[test]
    fn missing_required_class_fails() {
        let set = full_set(EngineGeneration::V5).with_slot(PluginRole::Entry, Default::default());
        let err = plan(&set, &input(None)).unwrap_err();
        assert!(matches!(err, Error::CollaboratorUnavailable { .. }));

        let set = full_set(EngineGeneration::V5)
            .with_slot(PluginRole::WebWorkerTemplate, Default::default());
        assert!(plan(&set, &input(None)).is_err());
    }

    #[test]
    fn externals_wired_once_with_inferred_type() {
        let mut with_externals = input(Some("web"));
        with_externals.externals = Some(vec![ExternalItem::Name("react".into())]);
        with_externals.externals_type = "commonjs".into();

        let planned = plan(&full_set(EngineGeneration::V5), &with_externals).unwrap();
        let externals: Vec<_> = planned
            .iter()
            .filter(|p| p.step == WiringStep::Externals)
            .collect();

        assert_eq!(externals.len(), 1);
        assert_eq!(
            externals[0].args,
            PluginArgs::Externals {
                externals_type: "commonjs".into(),
                externals: vec![ExternalItem::Name("react".into())],
            }
        );
    }

    #[test]
    fn entry_args_follow_generation() {
        let v5 = plan(&full_set(EngineGeneration::V5), &input(None)).unwrap();
        let v4 = plan(&full_set(EngineGeneration::V4), &input(None)).unwrap();

        assert!(matches!(
            &v5.last().unwrap().args,
            PluginArgs::Entry { request, name, .. } if request == "!!./worker.js" && name == "main"
        ));
        assert!(matches!(
            &v4.last().unwrap().args,
            PluginArgs::SingleEntry { request, name, .. } if request == "!!./worker.js" && name == "main"
        ));
    }

    #[test]
    fn wasm_sync_carries_mangle_policy() {
        let mut mangled = input(None);
        mangled.mangle_wasm_imports = true;
        let planned = plan(&full_set(EngineGeneration::V5), &mangled).unwrap();

        let wasm = planned
            .iter()
            .find(|p| p.step == WiringStep::FetchCompileWasm)
            .unwrap();
        assert_eq!(
            wasm.args,
            PluginArgs::FetchCompileWasm {
                mangle_imports: true
            }
        );
    }
}
