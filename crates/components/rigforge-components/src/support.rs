//! Small helpers shared by the built-in components.

use rigforge_api_core::{NodeId, Scene};
use rigforge_mechanics_core::MechanicsError;
use rigforge_stack_core::{ComponentCore, Config, Side, StackError};

/// Mechanics failures surface as this component's failure; scene errors
/// keep their own variant so hosts can tell backend trouble apart.
pub(crate) fn mechanics_failure(component: &str, err: MechanicsError) -> StackError {
    match err {
        MechanicsError::Scene(e) => StackError::Scene(e),
        other => StackError::validation(component, other.to_string()),
    }
}

pub(crate) fn node_input(core: &ComponentCore, name: &str) -> Option<NodeId> {
    core.input(name)
        .map(|a| a.value())
        .and_then(|v| v.as_node().map(str::to_string))
}

pub(crate) fn text_input(core: &ComponentCore, name: &str) -> Option<String> {
    core.input(name)
        .map(|a| a.value())
        .and_then(|v| v.as_text().map(str::to_string))
}

pub(crate) fn bool_option(core: &ComponentCore, name: &str) -> bool {
    core.option(name)
        .map(|a| a.value())
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

pub(crate) fn float_option(core: &ComponentCore, name: &str) -> Option<f32> {
    core.option(name).map(|a| a.value()).and_then(|v| v.as_f32())
}

/// Side parsed from the (possibly inherited) "Location" option.
pub(crate) fn location_side(config: &Config, core: &ComponentCore) -> Option<Side> {
    core.option("Location")
        .map(|a| a.value())
        .and_then(|v| v.as_text().map(str::to_string))
        .and_then(|s| config.parse_side(&s))
}

/// Side-qualified label without a role suffix, e.g. `"L_Arm"`.
pub(crate) fn qualified_label(config: &Config, side: Option<Side>, label: &str) -> String {
    match side {
        Some(side) => format!("{}{}{}", config.side_token(side), config.separator, label),
        None => label.to_string(),
    }
}

/// Walk the parent hierarchy from `tip` up to `root`, returning the chain
/// root to tip.
pub(crate) fn walk_chain(
    scene: &dyn Scene,
    component: &str,
    root: &NodeId,
    tip: &NodeId,
) -> Result<Vec<NodeId>, StackError> {
    if !scene.exists(root) {
        return Err(StackError::validation(
            component,
            format!("root joint '{root}' does not exist"),
        ));
    }
    let mut chain = vec![tip.clone()];
    let mut cursor = tip.clone();
    while &cursor != root {
        match scene.parent(&cursor)? {
            Some(parent) => {
                chain.push(parent.clone());
                cursor = parent;
            }
            None => {
                return Err(StackError::validation(
                    component,
                    format!("'{tip}' is not a descendant of '{root}'"),
                ))
            }
        }
    }
    chain.reverse();
    Ok(chain)
}

/// Pose the skeleton from the last removed guide before building, so the
/// rig lands where the guide was left. A guide that was never posed (or
/// never created) leaves the skeleton untouched.
pub(crate) fn apply_captured_pose(
    core: &ComponentCore,
    scene: &mut dyn Scene,
) -> Result<(), StackError> {
    let data = core.guide_data();
    for (target, world) in data.targets.iter().zip(&data.captured_world) {
        if scene.exists(target) {
            scene.set_world_matrix(target, *world)?;
        }
    }
    Ok(())
}
