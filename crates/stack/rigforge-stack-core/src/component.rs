//! Component: a named, identified rig-building unit with declared attributes
//! and a `run()` side effect.
//!
//! Concrete components embed a [`ComponentCore`] (identity, attribute set,
//! persisted build/guide bookkeeping) and implement the [`Component`] trait
//! on top of it. `run()` must be idempotent: every component clears the nodes
//! recorded by its previous run before emitting new ones, so rebuilds after
//! guide removal never accumulate duplicates.

use indexmap::IndexMap;
use rigforge_api_core::{NodeId, Scene, Value};

use crate::attribute::{AttrKind, Attribute, AttributeSet, DeclareOpts};
use crate::config::Config;
use crate::error::StackError;
use crate::guide::{self, GuideData, GUIDE_OPTION};
use crate::registry::Registry;
use crate::serial::AttributeRepr;

/// Hidden option tracking nodes emitted by the previous run.
pub const BUILD_NODES_OPTION: &str = "Build Nodes";

/// Ad-hoc maintenance action descriptor, keyed for host-menu dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserFunction {
    pub id: String,
    pub label: String,
}

impl UserFunction {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        UserFunction {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Everything a component run gets to touch: the scene capability, the
/// shared configuration and the registry (for spawning auxiliary
/// sub-components such as a limb's twister).
pub struct BuildContext<'a> {
    pub scene: &'a mut dyn Scene,
    pub config: &'a Config,
    pub registry: &'a Registry,
}

impl<'a> BuildContext<'a> {
    pub fn new(scene: &'a mut dyn Scene, config: &'a Config, registry: &'a Registry) -> Self {
        BuildContext {
            scene,
            config,
            registry,
        }
    }

    /// Instantiate an auxiliary component by identifier.
    pub fn spawn(&self, identifier: &str) -> Result<Box<dyn Component>, StackError> {
        self.registry.create(identifier)
    }
}

/// Identity and attribute storage shared by every component implementation.
#[derive(Debug, Default)]
pub struct ComponentCore {
    identifier: String,
    label: Option<String>,
    attrs: AttributeSet,
    /// Unknown attributes carried through deserialization untouched, so
    /// newer files survive a round trip through an older component version.
    pub(crate) extra: IndexMap<String, AttributeRepr>,
    last_sync_revision: u64,
}

impl ComponentCore {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let mut attrs = AttributeSet::default();
        // Every component tracks its previous build output for idempotency.
        let declared = attrs.declare(
            &identifier,
            BUILD_NODES_OPTION,
            AttrKind::Option,
            DeclareOpts::hidden(),
        );
        debug_assert!(declared.is_ok(), "{declared:?}");
        ComponentCore {
            identifier,
            label: None,
            attrs,
            extra: IndexMap::new(),
            last_sync_revision: 0,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    /// Display name used in reports and error messages.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{} '{}'", self.identifier, label),
            None => self.identifier.clone(),
        }
    }

    pub fn declare_input(&mut self, name: &str, opts: DeclareOpts) -> Result<(), StackError> {
        let component = self.identifier.clone();
        self.attrs.declare(&component, name, AttrKind::Input, opts)
    }

    pub fn declare_option(&mut self, name: &str, opts: DeclareOpts) -> Result<(), StackError> {
        let component = self.identifier.clone();
        self.attrs.declare(&component, name, AttrKind::Option, opts)
    }

    pub fn declare_output(&mut self, name: &str, opts: DeclareOpts) -> Result<(), StackError> {
        let component = self.identifier.clone();
        self.attrs.declare(&component, name, AttrKind::Output, opts)
    }

    pub fn input(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name, AttrKind::Input)
    }

    pub fn option(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name, AttrKind::Option)
    }

    pub fn output(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name, AttrKind::Output)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.get_mut(name, AttrKind::Input)
    }

    pub fn option_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.get_mut(name, AttrKind::Option)
    }

    pub fn output_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.get_mut(name, AttrKind::Output)
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attrs
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attrs
    }

    /// Set an output value during `run()`. Missing slot is a programmer
    /// error surfaced as a resolution failure on this component.
    pub fn set_output(&mut self, name: &str, value: Value) -> Result<(), StackError> {
        let component = self.display_name();
        match self.output_mut(name) {
            Some(attr) => {
                attr.set(value);
                Ok(())
            }
            None => Err(StackError::resolution(
                component,
                name,
                "no such output declared",
            )),
        }
    }

    /// Replace the variable-cardinality output range `prefix 0..n`.
    /// This is the one sanctioned post-construction declaration path.
    pub fn redeclare_outputs(&mut self, prefix: &str, count: usize) -> Result<(), StackError> {
        let component = self.identifier.clone();
        let stale: Vec<String> = self
            .attrs
            .iter()
            .filter(|a| a.kind() == AttrKind::Output)
            .map(|a| a.name().to_string())
            .filter(|name| {
                name.strip_prefix(prefix)
                    .map(|rest| rest.trim().parse::<usize>().is_ok())
                    .unwrap_or(false)
            })
            .collect();
        for name in stale {
            self.attrs.undeclare(&name);
        }
        for i in 0..count {
            self.attrs.declare(
                &component,
                &format!("{prefix} {i}"),
                AttrKind::Output,
                DeclareOpts::optional(),
            )?;
        }
        Ok(())
    }

    /// Nodes recorded by the previous run, if any.
    pub fn previous_build_nodes(&self) -> Vec<NodeId> {
        self.option(BUILD_NODES_OPTION)
            .map(|attr| attr.value())
            .and_then(|v| {
                v.as_list().map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_node().map(str::to_string))
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    pub fn record_build_nodes(&mut self, nodes: &[NodeId]) {
        if let Some(attr) = self.option_mut(BUILD_NODES_OPTION) {
            attr.set(Value::List(
                nodes.iter().cloned().map(Value::NodeRef).collect(),
            ));
        }
    }

    /// Delete whatever the previous run emitted so a re-run reproduces the
    /// same scene state instead of accumulating duplicates.
    pub fn reset_previous_build(&mut self, scene: &mut dyn Scene) -> Result<(), StackError> {
        for node in self.previous_build_nodes() {
            if scene.exists(&node) {
                scene.delete(&node)?;
            }
        }
        self.record_build_nodes(&[]);
        Ok(())
    }

    /// Declare the hidden guide option; guide-capable components call this
    /// from their constructor.
    pub fn declare_guide_option(&mut self) -> Result<(), StackError> {
        let component = self.identifier.clone();
        self.attrs
            .declare(&component, GUIDE_OPTION, AttrKind::Option, DeclareOpts::hidden())
    }

    pub fn guide_data(&self) -> GuideData {
        self.option(GUIDE_OPTION)
            .map(|attr| attr.value())
            .and_then(|v| GuideData::from_value(&v))
            .unwrap_or_default()
    }

    pub fn set_guide_data(&mut self, data: &GuideData) {
        if let Some(attr) = self.option_mut(GUIDE_OPTION) {
            attr.set(data.to_value());
        }
    }

    pub fn guide_active(&self) -> bool {
        self.guide_data().is_active()
    }

    /// True when any attribute changed since the last `sync` pass.
    pub(crate) fn needs_sync(&self) -> bool {
        self.attrs.revision() != self.last_sync_revision
    }

    pub(crate) fn mark_synced(&mut self) {
        self.last_sync_revision = self.attrs.revision();
    }
}

pub trait Component {
    fn core(&self) -> &ComponentCore;
    fn core_mut(&mut self) -> &mut ComponentCore;

    /// Stable registry key ("Standard : Arm", "Augment : Twister", …).
    fn identifier(&self) -> &str {
        self.core().identifier()
    }

    /// Component-specific gate run before `run()`. Returning an error skips
    /// this component without aborting independent siblings.
    fn is_valid(&self) -> Result<(), String> {
        Ok(())
    }

    /// Emit the scene graph for this component. Must be re-enterable; see
    /// [`ComponentCore::reset_previous_build`].
    fn run(&mut self, ctx: &mut BuildContext<'_>) -> Result<(), StackError>;

    /// Change-notification hook: invoked by the stack when attribute
    /// revisions moved since the last sync. Components with
    /// variable-cardinality outputs re-declare them here.
    fn sync(&mut self) {}

    /// Maintenance actions exposed to the host menu.
    fn user_functions(&self) -> Vec<UserFunction> {
        Vec::new()
    }

    /// Dispatch a user function by id. The host adapter reads its own
    /// ambient state (selection, current frame) and passes it in explicitly.
    fn call_user_function(
        &mut self,
        id: &str,
        _ctx: &mut BuildContext<'_>,
        _selection: &[NodeId],
    ) -> Result<(), StackError> {
        Err(StackError::validation(
            self.core().display_name(),
            format!("unknown user function '{id}'"),
        ))
    }

    /// Build the temporary guide rig. Legal only when no guide is active.
    fn create_guide(&mut self, _ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
        Err(StackError::validation(
            self.core().display_name(),
            "component has no guide lifecycle",
        ))
    }

    /// Capture the guide pose, delete the guide and restore the skeleton.
    /// Legal only while a guide is active.
    fn remove_guide(&mut self, _ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
        Err(StackError::validation(
            self.core().display_name(),
            "component has no guide lifecycle",
        ))
    }
}

impl std::fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("identifier", &self.identifier())
            .finish()
    }
}

/// Shared guide plumbing for components that pose a joint list.
pub fn create_guide_for_targets(
    core: &mut ComponentCore,
    scene: &mut dyn Scene,
    targets: &[NodeId],
    name_prefix: &str,
) -> Result<(), StackError> {
    let component = core.display_name();
    let current = core.guide_data();
    let next = guide::create_guide(&component, scene, &current, targets, name_prefix)?;
    core.set_guide_data(&next);
    Ok(())
}

pub fn remove_guide_for_targets(
    core: &mut ComponentCore,
    scene: &mut dyn Scene,
) -> Result<(), StackError> {
    let component = core.display_name();
    let current = core.guide_data();
    let next = guide::remove_guide(&component, scene, &current)?;
    core.set_guide_data(&next);
    Ok(())
}
