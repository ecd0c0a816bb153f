//! Guide lifecycle: a temporary manipulation rig posed before the permanent
//! control rig is built.
//!
//! Two-state machine per component: `NoGuide -> GuideActive -> NoGuide`.
//! Creation snapshots the driven skeleton's local transforms and spawns one
//! proxy per target; removal re-captures the proxies' world matrices into the
//! persisted record, deletes the proxies and restores the skeleton, so the
//! permanent build starts from a deterministic pose whether or not a guide
//! was ever used.
//!
//! State lives in a hidden option (`GUIDE_OPTION`) as a `Value::Record`, so
//! it survives serialization. A component with a non-empty proxy list is in
//! `GuideActive`; building from that state is a `GuideState` error.

use hashbrown::HashMap;
use rigforge_api_core::{math, NodeId, Scene, Value};

use crate::error::StackError;

/// Name of the hidden option guide-capable components declare.
pub const GUIDE_OPTION: &str = "Guide Data";

/// Persisted guide record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GuideData {
    /// Live proxy nodes; non-empty iff the guide is active.
    pub proxies: Vec<NodeId>,
    /// Skeleton joints the guide poses, index-aligned with `proxies`.
    pub targets: Vec<NodeId>,
    /// Local matrices of `targets` at guide creation time.
    pub rest_local: Vec<[f32; 16]>,
    /// World matrices captured at the last guide removal; matrices, not
    /// node names, so the data outlives the deleted proxies.
    pub captured_world: Vec<[f32; 16]>,
}

impl GuideData {
    pub fn is_active(&self) -> bool {
        !self.proxies.is_empty()
    }

    pub fn to_value(&self) -> Value {
        let mut map = HashMap::new();
        map.insert(
            "proxies".to_string(),
            Value::List(self.proxies.iter().cloned().map(Value::NodeRef).collect()),
        );
        map.insert(
            "targets".to_string(),
            Value::List(self.targets.iter().cloned().map(Value::NodeRef).collect()),
        );
        map.insert(
            "rest_local".to_string(),
            Value::List(self.rest_local.iter().map(|m| Value::Matrix(*m)).collect()),
        );
        map.insert(
            "captured_world".to_string(),
            Value::List(
                self.captured_world
                    .iter()
                    .map(|m| Value::Matrix(*m))
                    .collect(),
            ),
        );
        Value::Record(map)
    }

    pub fn from_value(value: &Value) -> Option<GuideData> {
        let map = value.as_record()?;
        let nodes = |key: &str| -> Vec<NodeId> {
            map.get(key)
                .and_then(Value::as_list)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_node().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };
        let matrices = |key: &str| -> Vec<[f32; 16]> {
            map.get(key)
                .and_then(Value::as_list)
                .map(|items| items.iter().filter_map(Value::as_matrix).collect())
                .unwrap_or_default()
        };
        Some(GuideData {
            proxies: nodes("proxies"),
            targets: nodes("targets"),
            rest_local: matrices("rest_local"),
            captured_world: matrices("captured_world"),
        })
    }
}

/// Create guide proxies for `targets`, snapshotting their rest transforms.
/// Legal only from the no-guide state.
pub fn create_guide(
    component: &str,
    scene: &mut dyn Scene,
    current: &GuideData,
    targets: &[NodeId],
    name_prefix: &str,
) -> Result<GuideData, StackError> {
    if current.is_active() {
        return Err(StackError::guide(
            component,
            "a guide already exists; remove it first",
        ));
    }
    let mut data = GuideData {
        captured_world: current.captured_world.clone(),
        ..GuideData::default()
    };
    for (i, target) in targets.iter().enumerate() {
        let world = scene.world_matrix(target)?;
        let local = scene.local_matrix(target)?;
        let proxy = scene.create_node("guide", &format!("{name_prefix}_guide{i}"))?;
        scene.set_world_matrix(&proxy, world)?;
        data.proxies.push(proxy);
        data.targets.push(target.clone());
        data.rest_local.push(local);
    }
    Ok(data)
}

/// Capture the posed guide, delete the proxies and restore the skeleton.
/// Legal only from the guide-active state.
///
/// Round-trip invariant: create followed by an edit-free remove leaves every
/// target's transforms numerically identical to before creation.
pub fn remove_guide(
    component: &str,
    scene: &mut dyn Scene,
    current: &GuideData,
) -> Result<GuideData, StackError> {
    if !current.is_active() {
        return Err(StackError::guide(component, "no guide is active"));
    }
    let mut captured = Vec::with_capacity(current.proxies.len());
    for proxy in &current.proxies {
        captured.push(scene.world_matrix(proxy)?);
        scene.delete(proxy)?;
    }
    for (target, rest) in current.targets.iter().zip(&current.rest_local) {
        if scene.exists(target) {
            scene.set_local_matrix(target, *rest)?;
        }
    }
    Ok(GuideData {
        proxies: Vec::new(),
        targets: current.targets.clone(),
        rest_local: Vec::new(),
        captured_world: captured,
    })
}

/// Captured world translation for guide index `i`, if any.
pub fn captured_position(data: &GuideData, i: usize) -> Option<[f32; 3]> {
    data.captured_world
        .get(i)
        .map(|m| math::mat4_translation(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_round_trip() {
        let data = GuideData {
            proxies: vec!["g0".into(), "g1".into()],
            targets: vec!["upper".into(), "tip".into()],
            rest_local: vec![math::MAT4_IDENTITY; 2],
            captured_world: vec![],
        };
        let v = data.to_value();
        let back = GuideData::from_value(&v).unwrap();
        assert_eq!(data, back);
        assert!(back.is_active());
    }

    #[test]
    fn inactive_when_no_proxies() {
        let data = GuideData {
            targets: vec!["upper".into()],
            captured_world: vec![math::MAT4_IDENTITY],
            ..GuideData::default()
        };
        assert!(!data.is_active());
    }
}
