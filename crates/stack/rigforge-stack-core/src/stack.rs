//! Stack: an ordered, serializable list of components representing one rig.
//!
//! `build()` is a strict sequential loop — components never run concurrently
//! because scene mutations are globally ordered side effects. Execution
//! follows a topological order seeded from address dependencies with stack
//! position as the deterministic tiebreak, so a stack with no
//! cross-references builds in exact stack order while forward references
//! still resolve. Failures are contained per component: validation and
//! resolution problems skip the component (and anything downstream of it)
//! without aborting independent siblings.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use indexmap::IndexMap;
use log::{debug, error, warn};
use rigforge_api_core::{Address, ComponentRef, NodeId, Scene, Value};

use crate::attribute::{AttrKind, Binding};
use crate::component::{BuildContext, Component};
use crate::config::Config;
use crate::error::StackError;
use crate::registry::Registry;
use crate::report::{BuildReport, BuildStatus, ComponentReport};
use crate::serial::{AttributeRepr, ComponentSpec, StackSpec};

#[derive(Default)]
pub struct Stack {
    components: Vec<Box<dyn Component>>,
    config: Config,
}

impl Stack {
    pub fn new(config: Config) -> Self {
        Stack {
            components: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component(&self, index: usize) -> Option<&dyn Component> {
        self.components.get(index).map(|c| c.as_ref())
    }

    pub fn component_mut(&mut self, index: usize) -> Option<&mut (dyn Component + 'static)> {
        self.components.get_mut(index).map(|c| c.as_mut())
    }

    pub fn components(&self) -> impl Iterator<Item = &dyn Component> {
        self.components.iter().map(|c| c.as_ref())
    }

    /// Instantiate `identifier` via the registry and insert it at `index`
    /// (append when `None`). Returns the new component's position.
    pub fn add(
        &mut self,
        registry: &Registry,
        identifier: &str,
        label: Option<String>,
        index: Option<usize>,
    ) -> Result<usize, StackError> {
        let mut component = registry.create(identifier)?;
        component.core_mut().set_label(label);
        let at = index.unwrap_or(self.components.len()).min(self.components.len());
        self.components.insert(at, component);
        Ok(at)
    }

    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Component>> {
        if index < self.components.len() {
            Some(self.components.remove(index))
        } else {
            None
        }
    }

    pub fn reorder(&mut self, from: usize, to: usize) {
        if from < self.components.len() && to < self.components.len() && from != to {
            let component = self.components.remove(from);
            self.components.insert(to, component);
        }
    }

    /// Resolve a component reference to a stack position. Labels must match
    /// exactly one component.
    fn resolve_ref(&self, component_ref: &ComponentRef) -> Result<usize, String> {
        match component_ref {
            ComponentRef::Index(i) => {
                if *i < self.components.len() {
                    Ok(*i)
                } else {
                    Err(format!("stack index {i} out of range"))
                }
            }
            ComponentRef::Label(label) => {
                let matches: Vec<usize> = self
                    .components
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.core().label() == Some(label.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                match matches.len() {
                    0 => Err(format!("no component labelled '{label}'")),
                    1 => Ok(matches[0]),
                    n => Err(format!("label '{label}' is ambiguous ({n} matches)")),
                }
            }
        }
    }

    /// Resolve an address to the owning component's output attribute value.
    /// Lazy by design: callers invoke this at build time, so forward
    /// references work as long as no cycle exists.
    pub fn lookup_attribute(&self, address: &Address) -> Result<(usize, Value), String> {
        let index = self.resolve_ref(&address.component)?;
        let component = &self.components[index];
        let attr = component
            .core()
            .output(&address.attribute)
            .ok_or_else(|| {
                format!(
                    "{} has no output '{}'",
                    component.core().display_name(),
                    address.attribute
                )
            })?;
        Ok((index, attr.value()))
    }

    /// Full-chain inheritance: the nearest preceding component with a
    /// same-named, same-kind attribute holding a non-empty value wins,
    /// chained across all predecessors (not just one hop).
    pub fn inherited_value(&self, index: usize, kind: AttrKind, name: &str) -> Option<Value> {
        for j in (0..index.min(self.components.len())).rev() {
            if let Some(attr) = self.components[j].core().attributes().get(name, kind) {
                let value = attr.value();
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        None
    }

    /// The value an attribute takes effect with: its own if set, otherwise
    /// the inherited one when `should_inherit` is on.
    pub fn effective_value(&self, index: usize, kind: AttrKind, name: &str) -> Option<Value> {
        let attr = self.components.get(index)?.core().attributes().get(name, kind)?;
        if attr.is_set() {
            return Some(attr.value());
        }
        if attr.should_inherit {
            return self.inherited_value(index, kind, name);
        }
        None
    }

    /// Validate and run every component, in dependency order, collecting
    /// per-component outcomes. Never throws on a component failure.
    pub fn build(&mut self, registry: &Registry, scene: &mut dyn Scene) -> BuildReport {
        let n = self.components.len();

        // Change-notification pass: let variable-cardinality components
        // re-declare outputs before dependencies are collected.
        for component in &mut self.components {
            if component.core().needs_sync() {
                component.sync();
                component.core_mut().mark_synced();
            }
        }

        // Resolution caches are per-build state.
        for component in &mut self.components {
            for attr in component.core_mut().attributes_mut().iter_mut() {
                attr.clear_resolved();
            }
        }

        let (deps, mut early_errors) = self.collect_dependencies();

        let (order, cycle_members) = topo_order(&deps);
        let mut statuses: Vec<Option<BuildStatus>> = (0..n).map(|_| None).collect();

        if !cycle_members.is_empty() {
            let names: Vec<String> = cycle_members
                .iter()
                .map(|&i| self.components[i].core().display_name())
                .collect();
            let err = StackError::Cycle {
                members: names.clone(),
            };
            for &i in &cycle_members {
                statuses[i] = Some(BuildStatus::Failed {
                    error: err.to_string(),
                });
            }
        }

        for &i in &order {
            let name = self.components[i].core().display_name();

            // A component whose upstream failed is itself failed-unresolved.
            if let Some(&j) = deps[i]
                .iter()
                .find(|&&j| !matches!(statuses[j], Some(BuildStatus::Ok)))
            {
                let upstream = self.components[j].core().display_name();
                statuses[i] = Some(BuildStatus::Failed {
                    error: StackError::resolution(
                        &name,
                        "",
                        format!("upstream component {upstream} did not build"),
                    )
                    .to_string(),
                });
                continue;
            }

            if !early_errors[i].is_empty() {
                let err = early_errors[i].remove(0);
                statuses[i] = Some(BuildStatus::Failed {
                    error: err.to_string(),
                });
                continue;
            }

            match self.prepare_component(i) {
                Ok(()) => {}
                Err(err) => {
                    statuses[i] = Some(BuildStatus::Failed {
                        error: err.to_string(),
                    });
                    continue;
                }
            }

            if let Some(reason) = self.validation_failure(i) {
                statuses[i] = Some(BuildStatus::Skipped { reason });
                continue;
            }

            if self.components[i].core().guide_active() {
                statuses[i] = Some(BuildStatus::Failed {
                    error: StackError::guide(&name, "you must remove the guide before building")
                        .to_string(),
                });
                continue;
            }

            debug!("building component {i}: {name}");
            let mut ctx = BuildContext::new(scene, &self.config, registry);
            statuses[i] = Some(match self.components[i].run(&mut ctx) {
                Ok(()) => BuildStatus::Ok,
                Err(err) => BuildStatus::Failed {
                    error: err.to_string(),
                },
            });
        }

        let mut report = BuildReport::default();
        for (i, status) in statuses.into_iter().enumerate() {
            let core = self.components[i].core();
            let status = status.unwrap_or(BuildStatus::Skipped {
                reason: "not reached".to_string(),
            });
            match &status {
                BuildStatus::Ok => {}
                BuildStatus::Skipped { reason } => {
                    warn!("skipped component {}: {}", core.display_name(), reason)
                }
                BuildStatus::Failed { error: e } => {
                    error!("failed component {}: {}", core.display_name(), e)
                }
            }
            report.components.push(ComponentReport {
                index: i,
                identifier: core.identifier().to_string(),
                label: core.label().map(str::to_string),
                status,
            });
        }
        debug!("build finished: {}", report.summary());
        report
    }

    /// Gather dependency edges from address bindings. Dangling or illegal
    /// addresses become deferred per-component resolution errors rather
    /// than edges.
    fn collect_dependencies(&self) -> (Vec<Vec<usize>>, Vec<Vec<StackError>>) {
        let n = self.components.len();
        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut errors: Vec<Vec<StackError>> = vec![Vec::new(); n];
        for i in 0..n {
            let name = self.components[i].core().display_name();
            for attr in self.components[i].core().attributes().iter() {
                let Some(address) = attr.address() else {
                    continue;
                };
                if attr.kind() != AttrKind::Input {
                    errors[i].push(StackError::resolution(
                        &name,
                        attr.name(),
                        "options are never cross-referenced",
                    ));
                    continue;
                }
                match self.resolve_ref(&address.component) {
                    Ok(j) if j == i => errors[i].push(StackError::resolution(
                        &name,
                        attr.name(),
                        "component references itself",
                    )),
                    Ok(j) => {
                        if !deps[i].contains(&j) {
                            deps[i].push(j);
                        }
                    }
                    Err(reason) => {
                        errors[i].push(StackError::resolution(&name, attr.name(), reason))
                    }
                }
            }
        }
        (deps, errors)
    }

    /// Resolve addressed inputs and inherited options into the component's
    /// per-build cache.
    fn prepare_component(&mut self, index: usize) -> Result<(), StackError> {
        let name = self.components[index].core().display_name();

        let mut resolved: Vec<(String, Value)> = Vec::new();
        for attr in self.components[index].core().attributes().iter() {
            if let Some(address) = attr.address() {
                let (_, value) = self
                    .lookup_attribute(address)
                    .map_err(|reason| StackError::resolution(&name, attr.name(), reason))?;
                if value.is_empty() {
                    return Err(StackError::resolution(
                        &name,
                        attr.name(),
                        format!("output '{address}' is empty after build"),
                    ));
                }
                resolved.push((attr.name().to_string(), value));
            } else if attr.should_inherit && !attr.is_set() {
                if let Some(value) = self.inherited_value(index, attr.kind(), attr.name()) {
                    resolved.push((attr.name().to_string(), value));
                }
            }
        }

        let core = self.components[index].core_mut();
        for (attr_name, value) in resolved {
            if let Some(attr) = core.attributes_mut().by_name_mut(&attr_name) {
                attr.set_resolved(value);
            }
        }
        Ok(())
    }

    /// First validation failure for a component, if any.
    fn validation_failure(&self, index: usize) -> Option<String> {
        let component = &self.components[index];
        for attr in component.core().attributes().iter() {
            if !attr.is_valid() {
                return Some(format!("attribute '{}' is empty", attr.name()));
            }
        }
        component.is_valid().err()
    }

    /// Dispatch a maintenance action on one component, with the host's
    /// selection passed in explicitly.
    pub fn call_user_function(
        &mut self,
        index: usize,
        id: &str,
        registry: &Registry,
        scene: &mut dyn Scene,
        selection: &[NodeId],
    ) -> Result<(), StackError> {
        let mut ctx = BuildContext::new(scene, &self.config, registry);
        match self.components.get_mut(index) {
            Some(component) => component.call_user_function(id, &mut ctx, selection),
            None => Err(StackError::validation(
                "stack",
                format!("no component at index {index}"),
            )),
        }
    }

    pub fn create_guide(
        &mut self,
        index: usize,
        registry: &Registry,
        scene: &mut dyn Scene,
    ) -> Result<(), StackError> {
        let mut ctx = BuildContext::new(scene, &self.config, registry);
        match self.components.get_mut(index) {
            Some(component) => component.create_guide(&mut ctx),
            None => Err(StackError::validation(
                "stack",
                format!("no component at index {index}"),
            )),
        }
    }

    pub fn remove_guide(
        &mut self,
        index: usize,
        registry: &Registry,
        scene: &mut dyn Scene,
    ) -> Result<(), StackError> {
        let mut ctx = BuildContext::new(scene, &self.config, registry);
        match self.components.get_mut(index) {
            Some(component) => component.remove_guide(&mut ctx),
            None => Err(StackError::validation(
                "stack",
                format!("no component at index {index}"),
            )),
        }
    }

    /// Snapshot the stack structure plus every set attribute, in order.
    pub fn serialize(&self) -> StackSpec {
        let mut spec = StackSpec::default();
        for component in &self.components {
            let core = component.core();
            let mut attributes: IndexMap<String, AttributeRepr> = IndexMap::new();
            for attr in core.attributes().iter() {
                if let Some(repr) = AttributeRepr::from_binding(attr.binding()) {
                    attributes.insert(attr.name().to_string(), repr);
                }
            }
            for (name, repr) in &core.extra {
                attributes.insert(name.clone(), repr.clone());
            }
            spec.components.push(ComponentSpec {
                identifier: core.identifier().to_string(),
                label: core.label().map(str::to_string),
                attributes,
            });
        }
        spec
    }

    /// Rebuild a stack from persisted data. Unknown attribute names are
    /// preserved for the next save; missing ones keep declared defaults.
    pub fn deserialize(
        registry: &Registry,
        config: Config,
        spec: StackSpec,
    ) -> Result<Stack, StackError> {
        let mut stack = Stack::new(config);
        for component_spec in spec.components {
            let mut component = registry.create(&component_spec.identifier)?;
            component.core_mut().set_label(component_spec.label);
            for (attr_name, repr) in component_spec.attributes {
                let core = component.core_mut();
                match core.attributes_mut().by_name_mut(&attr_name) {
                    Some(attr) => match repr.clone().into_binding() {
                        Binding::Unset => {}
                        Binding::Literal(value) => attr.set(value),
                        Binding::Address(address) => attr.set_address(address),
                    },
                    None => {
                        core.extra.insert(attr_name, repr);
                    }
                }
            }
            stack.components.push(component);
        }
        Ok(stack)
    }

    pub fn to_json(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string_pretty(&self.serialize())?)
    }

    pub fn from_json(
        registry: &Registry,
        config: Config,
        raw: &str,
    ) -> Result<Stack, StackError> {
        let spec: StackSpec = serde_json::from_str(raw)?;
        Stack::deserialize(registry, config, spec)
    }
}

/// Kahn's algorithm with a min-index ready heap: deterministic, and exact
/// stack order when no cross-component references exist. Returns the order
/// plus any cycle members (which are absent from the order). Components
/// that merely depend on a cycle are not cycle members; they stay in the
/// order, after their upstream, so the build fails them against it.
fn topo_order(deps: &[Vec<usize>]) -> (Vec<usize>, Vec<usize>) {
    let n = deps.len();
    let mut indegree = vec![0usize; n];
    let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, upstream) in deps.iter().enumerate() {
        indegree[i] = upstream.len();
        for &j in upstream {
            downstream[j].push(i);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| indegree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &j in &downstream[i] {
            indegree[j] -= 1;
            if indegree[j] == 0 {
                ready.push(Reverse(j));
            }
        }
    }
    if order.len() == n {
        return (order, Vec::new());
    }

    // Leftovers are either on a cycle or downstream of one. Peel nodes
    // with no unresolved dependents off the residual graph; whatever
    // survives the peel is cyclic. The peeled dependents rejoin the order
    // upstream-first.
    let mut residual = vec![true; n];
    for &i in &order {
        residual[i] = false;
    }
    let mut out_degree = vec![0usize; n];
    for (i, upstream) in deps.iter().enumerate() {
        if !residual[i] {
            continue;
        }
        for &j in upstream {
            if residual[j] {
                out_degree[j] += 1;
            }
        }
    }
    let mut peel: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| residual[i] && out_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut peeled = Vec::new();
    while let Some(Reverse(i)) = peel.pop() {
        peeled.push(i);
        residual[i] = false;
        for &j in &deps[i] {
            if residual[j] {
                out_degree[j] -= 1;
                if out_degree[j] == 0 {
                    peel.push(Reverse(j));
                }
            }
        }
    }
    let cycle: Vec<usize> = (0..n).filter(|&i| residual[i]).collect();
    peeled.reverse();
    order.extend(peeled);
    (order, cycle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topo_prefers_stack_order() {
        // no deps: pure stack order
        let deps = vec![vec![], vec![], vec![]];
        let (order, cycle) = topo_order(&deps);
        assert_eq!(order, vec![0, 1, 2]);
        assert!(cycle.is_empty());
    }

    #[test]
    fn topo_handles_forward_reference() {
        // component 0 depends on component 2
        let deps = vec![vec![2], vec![], vec![]];
        let (order, cycle) = topo_order(&deps);
        assert_eq!(order, vec![1, 2, 0]);
        assert!(cycle.is_empty());
    }

    #[test]
    fn topo_reports_cycles() {
        let deps = vec![vec![1], vec![0], vec![]];
        let (order, cycle) = topo_order(&deps);
        assert_eq!(order, vec![2]);
        assert_eq!(cycle, vec![0, 1]);
    }

    #[test]
    fn topo_keeps_cycle_dependents_out_of_the_cycle() {
        // 0 and 1 form the cycle; 2 and 3 only depend on it
        let deps = vec![vec![1], vec![0], vec![0], vec![2]];
        let (order, cycle) = topo_order(&deps);
        assert_eq!(cycle, vec![0, 1]);
        assert_eq!(order, vec![2, 3]);
    }
}
