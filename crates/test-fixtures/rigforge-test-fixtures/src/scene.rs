//! In-memory [`Scene`] backend for tests.
//!
//! Good enough to stand in for a host scene graph: parent hierarchy with
//! world/local conversion, dynamic attributes, connections resolved on
//! read, and constraints evaluated lazily on `world_matrix` queries.
//! Orient blending uses successive shortest-arc slerp over normalized
//! weights, so a single non-zero weight reproduces its driver exactly.

use hashbrown::HashMap;
use indexmap::IndexMap;

use rigforge_api_core::math::{
    mat4_decompose, mat4_from_trs, mat4_invert_affine, mat4_mul, slerp, vec3_add, vec3_scale,
    MAT4_IDENTITY, QUAT_IDENTITY,
};
use rigforge_api_core::{
    AttrSpec, ConstraintKind, ConstraintOptions, NodeId, Scene, SceneError, Value,
};

#[derive(Debug, Clone)]
struct NodeData {
    kind: String,
    parent: Option<NodeId>,
    local: [f32; 16],
    attrs: HashMap<String, Value>,
    specs: HashMap<String, AttrSpec>,
}

impl NodeData {
    fn new(kind: &str) -> Self {
        NodeData {
            kind: kind.to_string(),
            parent: None,
            local: MAT4_IDENTITY,
            attrs: HashMap::new(),
            specs: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct ConstraintData {
    kind: ConstraintKind,
    drivers: Vec<NodeId>,
    driven: NodeId,
    options: ConstraintOptions,
    /// Per-driver rest offset; identity unless `maintain_offset`.
    offsets: Vec<[f32; 16]>,
}

/// The in-memory scene. Ids are the requested node name when free,
/// otherwise the name with a numeric suffix, so fixture joints keep
/// readable ids.
#[derive(Debug, Default)]
pub struct MemoryScene {
    nodes: IndexMap<NodeId, NodeData>,
    connections: HashMap<(NodeId, String), (NodeId, String)>,
    constraints: IndexMap<NodeId, ConstraintData>,
    driven_by: HashMap<NodeId, Vec<NodeId>>,
    counter: u64,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything; fresh scene for the next test phase.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    fn alloc_id(&mut self, name: &str) -> NodeId {
        let base = if name.is_empty() { "node" } else { name };
        if !self.nodes.contains_key(base) {
            return base.to_string();
        }
        loop {
            self.counter += 1;
            let candidate = format!("{base}{}", self.counter);
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn node(&self, id: &NodeId) -> Result<&NodeData, SceneError> {
        self.nodes
            .get(id)
            .ok_or_else(|| SceneError::NodeNotFound { id: id.clone() })
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut NodeData, SceneError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| SceneError::NodeNotFound { id: id.clone() })
    }

    fn parent_world(&self, parent: Option<&NodeId>) -> Result<[f32; 16], SceneError> {
        match parent {
            Some(p) => self.world_of(p),
            None => Ok(MAT4_IDENTITY),
        }
    }

    /// Hierarchy transform plus any constraints driving the node, applied
    /// in creation order.
    fn world_of(&self, id: &NodeId) -> Result<[f32; 16], SceneError> {
        let node = self.node(id)?;
        let base = match &node.parent {
            Some(p) => mat4_mul(&self.world_of(p)?, &node.local),
            None => node.local,
        };
        let Some(constraints) = self.driven_by.get(id) else {
            return Ok(base);
        };
        let (mut t, mut r, mut s) = mat4_decompose(&base);
        for cid in constraints {
            let Some(c) = self.constraints.get(cid) else {
                continue;
            };
            let Some((bt, br, bs)) = self.blend_drivers(cid, c)? else {
                continue;
            };
            match c.kind {
                ConstraintKind::Parent => {
                    t = bt;
                    r = br;
                }
                ConstraintKind::Point => t = bt,
                ConstraintKind::Orient => r = br,
                ConstraintKind::Scale => s = bs,
            }
        }
        Ok(mat4_from_trs(t, r, s))
    }

    /// Weighted blend of a constraint's driver transforms. Zero-weight
    /// drivers are skipped entirely, so boundary weights are exact.
    /// Returns `None` when every weight is zero (constraint inert).
    #[allow(clippy::type_complexity)]
    fn blend_drivers(
        &self,
        cid: &NodeId,
        c: &ConstraintData,
    ) -> Result<Option<([f32; 3], [f32; 4], [f32; 3])>, SceneError> {
        let mut active: Vec<([f32; 3], [f32; 4], [f32; 3], f32)> = Vec::new();
        for (i, driver) in c.drivers.iter().enumerate() {
            let w = self
                .resolve_attr(cid, &format!("w{i}"))?
                .as_f32()
                .unwrap_or(0.0);
            if w <= 0.0 {
                continue;
            }
            let world = mat4_mul(&self.world_of(driver)?, &c.offsets[i]);
            let (t, r, s) = mat4_decompose(&world);
            active.push((t, r, s, w));
        }
        if active.is_empty() {
            return Ok(None);
        }
        let total: f32 = active.iter().map(|a| a.3).sum();
        let mut t = [0.0f32; 3];
        let mut s = [0.0f32; 3];
        for (at, _, asc, w) in &active {
            t = vec3_add(t, vec3_scale(*at, w / total));
            s = vec3_add(s, vec3_scale(*asc, w / total));
        }
        let mut r = QUAT_IDENTITY;
        let mut acc = 0.0f32;
        for (_, ar, _, w) in &active {
            if acc <= 0.0 {
                r = *ar;
            } else {
                r = slerp(r, *ar, w / (acc + w));
            }
            acc += w;
        }
        let _ = c.options; // shortest arc is the only interpolation here
        Ok(Some((t, r, s)))
    }

    /// Attribute read that follows incoming connections and evaluates
    /// utility node outputs.
    fn resolve_attr(&self, id: &NodeId, name: &str) -> Result<Value, SceneError> {
        if let Some((src, src_attr)) = self.connections.get(&(id.clone(), name.to_string())) {
            return self.resolve_attr(src, src_attr);
        }
        let node = self.node(id)?;
        if node.kind == "reverse" && name == "output" {
            let input = self
                .resolve_attr(id, "input")
                .ok()
                .and_then(|v| v.as_f32())
                .unwrap_or(0.0);
            return Ok(Value::Float(1.0 - input));
        }
        node.attrs
            .get(name)
            .cloned()
            .ok_or_else(|| SceneError::AttrNotFound {
                id: id.clone(),
                attr: name.to_string(),
            })
    }

    fn would_cycle(&self, id: &NodeId, candidate: &NodeId) -> bool {
        let mut cursor = Some(candidate.clone());
        while let Some(current) = cursor {
            if &current == id {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent.clone());
        }
        false
    }
}

impl Scene for MemoryScene {
    fn create_node(&mut self, kind: &str, name: &str) -> Result<NodeId, SceneError> {
        let id = self.alloc_id(name);
        self.nodes.insert(id.clone(), NodeData::new(kind));
        Ok(id)
    }

    fn delete(&mut self, id: &NodeId) -> Result<(), SceneError> {
        let removed = self
            .nodes
            .shift_remove(id)
            .ok_or_else(|| SceneError::NodeNotFound { id: id.clone() })?;

        // Children survive, handed to the deleted node's parent with their
        // world transform intact.
        let children: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent.as_ref() == Some(id))
            .map(|(cid, _)| cid.clone())
            .collect();
        for child in children {
            let child_local = self
                .nodes
                .get(&child)
                .map(|n| n.local)
                .unwrap_or(MAT4_IDENTITY);
            let world = mat4_mul(&removed.local, &child_local);
            let world = match &removed.parent {
                Some(p) if self.nodes.contains_key(p) => mat4_mul(&self.world_of(p)?, &world),
                _ => world,
            };
            if let Some(n) = self.nodes.get_mut(&child) {
                n.parent = removed.parent.clone();
            }
            self.set_world_matrix(&child, world)?;
        }

        self.connections
            .retain(|(dst, _), (src, _)| dst != id && src != id);
        let dead: Vec<NodeId> = self
            .constraints
            .iter()
            .filter(|(cid, c)| *cid == id || &c.driven == id || c.drivers.iter().any(|d| d == id))
            .map(|(cid, _)| cid.clone())
            .collect();
        for cid in &dead {
            self.constraints.shift_remove(cid);
        }
        for list in self.driven_by.values_mut() {
            list.retain(|cid| !dead.contains(cid));
        }
        self.driven_by.remove(id);
        Ok(())
    }

    fn exists(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    fn node_kind(&self, id: &NodeId) -> Result<String, SceneError> {
        Ok(self.node(id)?.kind.clone())
    }

    fn set_parent(&mut self, id: &NodeId, parent: Option<&NodeId>) -> Result<(), SceneError> {
        self.node(id)?;
        if let Some(p) = parent {
            self.node(p)?;
            if self.would_cycle(id, p) {
                return Err(SceneError::invalid(format!(
                    "parenting {id} under {p} would cycle"
                )));
            }
        }
        // Reparenting keeps the node where it is in world space.
        let world = self.world_of(id)?;
        let parent_world = self.parent_world(parent)?;
        let node = self.node_mut(id)?;
        node.parent = parent.cloned();
        node.local = mat4_mul(&mat4_invert_affine(&parent_world), &world);
        Ok(())
    }

    fn parent(&self, id: &NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(id)?.parent.clone())
    }

    fn world_matrix(&self, id: &NodeId) -> Result<[f32; 16], SceneError> {
        self.world_of(id)
    }

    fn set_world_matrix(&mut self, id: &NodeId, m: [f32; 16]) -> Result<(), SceneError> {
        let parent = self.node(id)?.parent.clone();
        let parent_world = self.parent_world(parent.as_ref())?;
        self.node_mut(id)?.local = mat4_mul(&mat4_invert_affine(&parent_world), &m);
        Ok(())
    }

    fn local_matrix(&self, id: &NodeId) -> Result<[f32; 16], SceneError> {
        Ok(self.node(id)?.local)
    }

    fn set_local_matrix(&mut self, id: &NodeId, m: [f32; 16]) -> Result<(), SceneError> {
        self.node_mut(id)?.local = m;
        Ok(())
    }

    fn add_attribute(
        &mut self,
        id: &NodeId,
        name: &str,
        spec: AttrSpec,
    ) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        // Re-adding keeps the current value; rebuilds must not stomp user
        // edits to settings attributes.
        if !node.attrs.contains_key(name) {
            node.attrs.insert(name.to_string(), spec.default.clone());
        }
        node.specs.insert(name.to_string(), spec);
        Ok(())
    }

    fn get_attr(&self, id: &NodeId, name: &str) -> Result<Value, SceneError> {
        self.resolve_attr(id, name)
    }

    fn set_attr(&mut self, id: &NodeId, name: &str, value: Value) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        let value = match (&value, node.specs.get(name)) {
            (Value::Float(f), Some(spec)) => {
                let mut f = *f;
                if let Some(min) = spec.min {
                    f = f.max(min);
                }
                if let Some(max) = spec.max {
                    f = f.min(max);
                }
                Value::Float(f)
            }
            _ => value,
        };
        node.attrs.insert(name.to_string(), value);
        Ok(())
    }

    fn connect(
        &mut self,
        src: &NodeId,
        src_attr: &str,
        dst: &NodeId,
        dst_attr: &str,
    ) -> Result<(), SceneError> {
        let src_node = self.node(src)?;
        let src_ok = src_node.attrs.contains_key(src_attr)
            || (src_node.kind == "reverse" && src_attr == "output");
        if !src_ok {
            return Err(SceneError::AttrNotFound {
                id: src.clone(),
                attr: src_attr.to_string(),
            });
        }
        let dst_node = self.node_mut(dst)?;
        // Destination attrs spring into being on connect, like dynamic
        // attrs in a host scene.
        dst_node
            .attrs
            .entry(dst_attr.to_string())
            .or_insert(Value::Null);
        self.connections.insert(
            (dst.clone(), dst_attr.to_string()),
            (src.clone(), src_attr.to_string()),
        );
        Ok(())
    }

    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        drivers: &[NodeId],
        driven: &NodeId,
        options: ConstraintOptions,
    ) -> Result<NodeId, SceneError> {
        if drivers.is_empty() {
            return Err(SceneError::invalid("constraint needs at least one driver"));
        }
        self.node(driven)?;
        for d in drivers {
            self.node(d)?;
        }
        let kind_name = match kind {
            ConstraintKind::Parent => "parentConstraint",
            ConstraintKind::Point => "pointConstraint",
            ConstraintKind::Orient => "orientConstraint",
            ConstraintKind::Scale => "scaleConstraint",
        };
        let mut offsets = Vec::with_capacity(drivers.len());
        if options.maintain_offset {
            let driven_world = self.world_of(driven)?;
            for d in drivers {
                let inv = mat4_invert_affine(&self.world_of(d)?);
                offsets.push(mat4_mul(&inv, &driven_world));
            }
        } else {
            offsets.resize(drivers.len(), MAT4_IDENTITY);
        }

        let id = self.alloc_id(&format!("{driven}_{kind_name}"));
        let mut node = NodeData::new(kind_name);
        for i in 0..drivers.len() {
            node.attrs.insert(format!("w{i}"), Value::Float(1.0));
        }
        self.nodes.insert(id.clone(), node);
        self.constraints.insert(
            id.clone(),
            ConstraintData {
                kind,
                drivers: drivers.to_vec(),
                driven: driven.clone(),
                options,
                offsets,
            },
        );
        self.driven_by
            .entry(driven.clone())
            .or_default()
            .push(id.clone());
        Ok(id)
    }

    fn constraint_weight_attrs(&self, id: &NodeId) -> Result<Vec<String>, SceneError> {
        let c = self
            .constraints
            .get(id)
            .ok_or_else(|| SceneError::invalid(format!("{id} is not a constraint")))?;
        Ok((0..c.drivers.len()).map(|i| format!("w{i}")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigforge_api_core::math::{mat4_from_translation, mat4_translation, quat_from_axis_angle};

    fn translation(scene: &MemoryScene, id: &NodeId) -> [f32; 3] {
        mat4_translation(&scene.world_matrix(id).unwrap())
    }

    #[test]
    fn ids_keep_requested_names() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("joint", "upper").unwrap();
        let b = scene.create_node("joint", "upper").unwrap();
        assert_eq!(a, "upper");
        assert_ne!(a, b);
        assert!(b.starts_with("upper"));
    }

    #[test]
    fn hierarchy_composes_world() {
        let mut scene = MemoryScene::new();
        let root = scene.create_node("transform", "root").unwrap();
        let child = scene.create_node("transform", "child").unwrap();
        scene.set_parent(&child, Some(&root)).unwrap();
        scene
            .set_world_matrix(&root, mat4_from_translation([1.0, 0.0, 0.0]))
            .unwrap();
        scene
            .set_local_matrix(&child, mat4_from_translation([0.0, 2.0, 0.0]))
            .unwrap();
        assert_eq!(translation(&scene, &child), [1.0, 2.0, 0.0]);
    }

    #[test]
    fn reparent_preserves_world() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("transform", "a").unwrap();
        let b = scene.create_node("transform", "b").unwrap();
        scene
            .set_world_matrix(&a, mat4_from_translation([5.0, 0.0, 0.0]))
            .unwrap();
        scene
            .set_world_matrix(&b, mat4_from_translation([1.0, 1.0, 1.0]))
            .unwrap();
        scene.set_parent(&b, Some(&a)).unwrap();
        assert_eq!(translation(&scene, &b), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn parent_cycles_rejected() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("transform", "a").unwrap();
        let b = scene.create_node("transform", "b").unwrap();
        scene.set_parent(&b, Some(&a)).unwrap();
        let err = scene.set_parent(&a, Some(&b)).unwrap_err();
        assert!(matches!(err, SceneError::InvalidOp { .. }));
    }

    #[test]
    fn reverse_node_complements_input() {
        let mut scene = MemoryScene::new();
        let host = scene.create_node("transform", "settings").unwrap();
        scene
            .add_attribute(&host, "blend", AttrSpec::scalar(0.25, Some(0.0), Some(1.0)))
            .unwrap();
        let rev = scene.create_node("reverse", "rev").unwrap();
        scene.connect(&host, "blend", &rev, "input").unwrap();
        let out = scene.get_attr(&rev, "output").unwrap().as_f32().unwrap();
        assert!((out - 0.75).abs() < 1e-6);
    }

    #[test]
    fn attr_spec_clamps_float_sets() {
        let mut scene = MemoryScene::new();
        let host = scene.create_node("transform", "settings").unwrap();
        scene
            .add_attribute(&host, "blend", AttrSpec::scalar(0.0, Some(0.0), Some(1.0)))
            .unwrap();
        scene.set_attr(&host, "blend", Value::Float(7.0)).unwrap();
        assert_eq!(scene.get_attr(&host, "blend").unwrap(), Value::Float(1.0));
    }

    #[test]
    fn orient_constraint_exact_at_boundary_weights() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("joint", "a").unwrap();
        let b = scene.create_node("joint", "b").unwrap();
        let driven = scene.create_node("joint", "driven").unwrap();
        let qa = quat_from_axis_angle([0.0, 1.0, 0.0], 0.8);
        let qb = quat_from_axis_angle([1.0, 0.0, 0.0], -1.1);
        scene
            .set_world_matrix(&a, mat4_from_trs([0.0; 3], qa, [1.0; 3]))
            .unwrap();
        scene
            .set_world_matrix(&b, mat4_from_trs([0.0; 3], qb, [1.0; 3]))
            .unwrap();
        let con = scene
            .create_constraint(
                ConstraintKind::Orient,
                &[a.clone(), b.clone()],
                &driven,
                ConstraintOptions::shortest(),
            )
            .unwrap();
        scene.set_attr(&con, "w0", Value::Float(1.0)).unwrap();
        scene.set_attr(&con, "w1", Value::Float(0.0)).unwrap();
        let (_, r, _) = mat4_decompose(&scene.world_matrix(&driven).unwrap());
        assert!(rigforge_api_core::math::quat_dot(r, qa).abs() > 1.0 - 1e-4);

        scene.set_attr(&con, "w0", Value::Float(0.0)).unwrap();
        scene.set_attr(&con, "w1", Value::Float(1.0)).unwrap();
        let (_, r, _) = mat4_decompose(&scene.world_matrix(&driven).unwrap());
        assert!(rigforge_api_core::math::quat_dot(r, qb).abs() > 1.0 - 1e-4);
    }

    #[test]
    fn connected_weight_follows_source() {
        let mut scene = MemoryScene::new();
        let host = scene.create_node("transform", "settings").unwrap();
        scene
            .add_attribute(&host, "blend", AttrSpec::scalar(0.0, Some(0.0), Some(1.0)))
            .unwrap();
        let a = scene.create_node("joint", "a").unwrap();
        let driven = scene.create_node("joint", "driven").unwrap();
        scene
            .set_world_matrix(&a, mat4_from_translation([3.0, 0.0, 0.0]))
            .unwrap();
        let con = scene
            .create_constraint(
                ConstraintKind::Point,
                &[a.clone()],
                &driven,
                ConstraintOptions::default(),
            )
            .unwrap();
        scene.connect(&host, "blend", &con, "w0").unwrap();
        // weight 0: constraint inert, driven stays at origin
        assert_eq!(translation(&scene, &driven), [0.0, 0.0, 0.0]);
        scene.set_attr(&host, "blend", Value::Float(1.0)).unwrap();
        assert_eq!(translation(&scene, &driven), [3.0, 0.0, 0.0]);
    }

    #[test]
    fn delete_reparents_children_in_place() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("transform", "a").unwrap();
        let b = scene.create_node("transform", "b").unwrap();
        let c = scene.create_node("transform", "c").unwrap();
        scene.set_parent(&b, Some(&a)).unwrap();
        scene.set_parent(&c, Some(&b)).unwrap();
        scene
            .set_world_matrix(&c, mat4_from_translation([2.0, 3.0, 4.0]))
            .unwrap();
        scene.delete(&b).unwrap();
        assert!(!scene.exists(&b));
        assert_eq!(scene.parent(&c).unwrap(), Some(a));
        assert_eq!(translation(&scene, &c), [2.0, 3.0, 4.0]);
    }

    #[test]
    fn maintain_offset_keeps_rest_pose() {
        let mut scene = MemoryScene::new();
        let driver = scene.create_node("transform", "driver").unwrap();
        let driven = scene.create_node("transform", "driven").unwrap();
        scene
            .set_world_matrix(&driver, mat4_from_translation([1.0, 0.0, 0.0]))
            .unwrap();
        scene
            .set_world_matrix(&driven, mat4_from_translation([4.0, 0.0, 0.0]))
            .unwrap();
        let opts = ConstraintOptions {
            interp_shortest: false,
            maintain_offset: true,
        };
        scene
            .create_constraint(ConstraintKind::Parent, &[driver.clone()], &driven, opts)
            .unwrap();
        assert_eq!(translation(&scene, &driven), [4.0, 0.0, 0.0]);
        scene
            .set_world_matrix(&driver, mat4_from_translation([2.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(translation(&scene, &driven), [5.0, 0.0, 0.0]);
    }
}
