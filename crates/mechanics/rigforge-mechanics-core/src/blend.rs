//! The IK/FK/NK blend primitive.
//!
//! One skeletal chain becomes three: an IK chain solved toward a control,
//! an FK chain driven by a control hierarchy, and an NK ("neutral") chain
//! that blends between them and drives the original skeleton. The blend
//! weight lives on a caller-supplied settings node; a reverse split feeds
//! the complementary weight, so weight 0 is pure IK and weight 1 pure FK
//! with no normalization drift at the boundaries.

use rigforge_api_core::math::{
    mat4_translation, vec3_add, vec3_dot, vec3_length, vec3_normalize, vec3_scale, vec3_sub,
};
use rigforge_api_core::{AttrSpec, ConstraintKind, ConstraintOptions, NodeId, Scene, Value};

use crate::error::MechanicsError;
use crate::solve::{chain_facing, chained_two_bone, soft_clamp, two_bone_solve, CHAIN_EPSILON};

/// Soft-IK parameters; see [`soft_clamp`] for the curve.
#[derive(Clone, Copy, Debug)]
pub struct SoftIkSpec {
    pub softness: f32,
}

/// Everything `build_blend` needs. The chain is the original skeleton,
/// root to tip; it is never reparented, only driven.
#[derive(Clone, Debug)]
pub struct BlendSpec {
    pub chain: Vec<NodeId>,
    /// Host node for the blend and visibility attributes.
    pub settings: NodeId,
    pub blend_attr: String,
    /// Initial blend weight; 0 is pure IK, 1 pure FK.
    pub blend_default: f32,
    pub show_ik_attr: String,
    pub show_fk_attr: String,
    pub soft_ik: Option<SoftIkSpec>,
    pub ik_parent: Option<NodeId>,
    pub fk_parent: Option<NodeId>,
    pub nk_parent: Option<NodeId>,
    /// Prefix for every node this build creates.
    pub name: String,
}

impl BlendSpec {
    pub fn new(chain: Vec<NodeId>, settings: NodeId, name: impl Into<String>) -> Self {
        BlendSpec {
            chain,
            settings,
            blend_attr: "ik_fk".to_string(),
            blend_default: 0.0,
            show_ik_attr: "show_ik".to_string(),
            show_fk_attr: "show_fk".to_string(),
            soft_ik: None,
            ik_parent: None,
            fk_parent: None,
            nk_parent: None,
            name: name.into(),
        }
    }
}

/// Handles to what `build_blend` produced.
#[derive(Clone, Debug)]
pub struct BlendUnit {
    pub ik_chain: Vec<NodeId>,
    pub fk_chain: Vec<NodeId>,
    pub nk_chain: Vec<NodeId>,
    pub ik_control: NodeId,
    /// Absent on single-bone chains, which have no bend plane.
    pub pole_control: Option<NodeId>,
    pub fk_controls: Vec<NodeId>,
    pub ik_handle: Option<NodeId>,
    pub blend_attr: String,
    pub show_ik_attr: String,
    pub show_fk_attr: String,
    /// Every node spawned by the build, for idempotent rebuilds.
    pub created: Vec<NodeId>,
}

/// Build the three-chain blend setup over `spec.chain`.
pub fn build_blend(scene: &mut dyn Scene, spec: &BlendSpec) -> Result<BlendUnit, MechanicsError> {
    let n = spec.chain.len();
    if n < 2 {
        return Err(MechanicsError::ChainTooShort { need: 2, got: n });
    }

    let matrices: Vec<[f32; 16]> = spec
        .chain
        .iter()
        .map(|id| scene.world_matrix(id).map_err(MechanicsError::from))
        .collect::<Result<_, _>>()?;
    let positions: Vec<[f32; 3]> = matrices.iter().map(mat4_translation).collect();
    // Facing is computed up front so degenerate chains fail before any
    // scene mutation.
    chain_facing(&positions)?;

    let mut created = Vec::new();

    scene.add_attribute(
        &spec.settings,
        &spec.blend_attr,
        AttrSpec::scalar(spec.blend_default, Some(0.0), Some(1.0)),
    )?;
    scene.add_attribute(&spec.settings, &spec.show_ik_attr, AttrSpec::bool(true))?;
    scene.add_attribute(&spec.settings, &spec.show_fk_attr, AttrSpec::bool(true))?;

    let ik_chain = replicate_chain(scene, &spec.name, "ik", &matrices, spec.ik_parent.as_ref(), &mut created)?;
    let fk_chain = replicate_chain(scene, &spec.name, "fk", &matrices, spec.fk_parent.as_ref(), &mut created)?;
    let nk_chain = replicate_chain(scene, &spec.name, "nk", &matrices, spec.nk_parent.as_ref(), &mut created)?;

    // Complementary weight through a reverse split: one scalar drives both
    // sides, so the weights always sum to one.
    let reverse = scene.create_node("reverse", &format!("{}_rev", spec.name))?;
    created.push(reverse.clone());
    scene.connect(&spec.settings, &spec.blend_attr, &reverse, "input")?;

    for i in 0..n {
        let constraint = scene.create_constraint(
            ConstraintKind::Orient,
            &[ik_chain[i].clone(), fk_chain[i].clone()],
            &nk_chain[i],
            ConstraintOptions::shortest(),
        )?;
        let weights = scene.constraint_weight_attrs(&constraint)?;
        if weights.len() != 2 {
            return Err(MechanicsError::Scene(
                rigforge_api_core::SceneError::invalid(format!(
                    "orient constraint {constraint} exposes {} weights for 2 drivers",
                    weights.len()
                )),
            ));
        }
        scene.connect(&reverse, "output", &constraint, &weights[0])?;
        scene.connect(&spec.settings, &spec.blend_attr, &constraint, &weights[1])?;
        created.push(constraint);
    }

    // IK side: a target control at the tip, a pole control off the bend
    // plane, and an analytic solve seeded at the rest pose.
    let ik_control = scene.create_node("transform", &format!("{}_ik_ctl", spec.name))?;
    created.push(ik_control.clone());
    scene.set_parent(&ik_control, spec.ik_parent.as_ref())?;
    scene.set_world_matrix(&ik_control, matrices[n - 1])?;
    scene.add_attribute(&ik_control, "visibility", AttrSpec::bool(true))?;
    scene.connect(&spec.settings, &spec.show_ik_attr, &ik_control, "visibility")?;

    let mut pole_control = None;
    let mut ik_handle = None;
    if n >= 3 {
        let pole_pos = pole_position(&positions);
        let pole = scene.create_node("transform", &format!("{}_pole_ctl", spec.name))?;
        created.push(pole.clone());
        scene.set_parent(&pole, spec.ik_parent.as_ref())?;
        let mut pole_mat = matrices[1];
        pole_mat[12] = pole_pos[0];
        pole_mat[13] = pole_pos[1];
        pole_mat[14] = pole_pos[2];
        scene.set_world_matrix(&pole, pole_mat)?;
        scene.add_attribute(&pole, "visibility", AttrSpec::bool(true))?;
        scene.connect(&spec.settings, &spec.show_ik_attr, &pole, "visibility")?;

        let handle = scene.create_node("ikHandle", &format!("{}_ikh", spec.name))?;
        created.push(handle.clone());
        scene.set_attr(&handle, "root", Value::node(ik_chain[0].clone()))?;
        scene.set_attr(&handle, "tip", Value::node(ik_chain[n - 1].clone()))?;
        scene.set_attr(&handle, "target", Value::node(ik_control.clone()))?;
        scene.set_attr(&handle, "pole", Value::node(pole.clone()))?;
        if let Some(soft) = &spec.soft_ik {
            scene.set_attr(&handle, "softness", Value::Float(soft.softness))?;
        }

        apply_ik_pose(scene, &ik_chain, &positions, &ik_control, pole_pos, spec.soft_ik)?;

        pole_control = Some(pole);
        ik_handle = Some(handle);
    }

    // FK side: one control per joint, nested like the joints themselves.
    let mut fk_controls = Vec::with_capacity(n);
    for i in 0..n {
        let ctl = scene.create_node("transform", &format!("{}_fk{}_ctl", spec.name, i))?;
        let parent = if i == 0 {
            spec.fk_parent.clone()
        } else {
            fk_controls.last().cloned()
        };
        scene.set_parent(&ctl, parent.as_ref())?;
        scene.set_world_matrix(&ctl, matrices[i])?;
        scene.add_attribute(&ctl, "visibility", AttrSpec::bool(true))?;
        scene.connect(&spec.settings, &spec.show_fk_attr, &ctl, "visibility")?;
        let constraint = scene.create_constraint(
            ConstraintKind::Parent,
            &[ctl.clone()],
            &fk_chain[i],
            ConstraintOptions::default(),
        )?;
        created.push(ctl.clone());
        created.push(constraint);
        fk_controls.push(ctl);
    }

    // The original skeleton follows the NK chain.
    for i in 0..n {
        let parent_con = scene.create_constraint(
            ConstraintKind::Parent,
            &[nk_chain[i].clone()],
            &spec.chain[i],
            ConstraintOptions::default(),
        )?;
        let scale_con = scene.create_constraint(
            ConstraintKind::Scale,
            &[nk_chain[i].clone()],
            &spec.chain[i],
            ConstraintOptions::default(),
        )?;
        created.push(parent_con);
        created.push(scale_con);
    }

    Ok(BlendUnit {
        ik_chain,
        fk_chain,
        nk_chain,
        ik_control,
        pole_control,
        fk_controls,
        ik_handle,
        blend_attr: spec.blend_attr.clone(),
        show_ik_attr: spec.show_ik_attr.clone(),
        show_fk_attr: spec.show_fk_attr.clone(),
        created,
    })
}

fn replicate_chain(
    scene: &mut dyn Scene,
    name: &str,
    tag: &str,
    matrices: &[[f32; 16]],
    parent: Option<&NodeId>,
    created: &mut Vec<NodeId>,
) -> Result<Vec<NodeId>, MechanicsError> {
    let mut chain = Vec::with_capacity(matrices.len());
    for (i, m) in matrices.iter().enumerate() {
        let joint = scene.create_node("joint", &format!("{name}_{tag}{i}"))?;
        let joint_parent = if i == 0 {
            parent.cloned()
        } else {
            chain.last().cloned()
        };
        scene.set_parent(&joint, joint_parent.as_ref())?;
        scene.set_world_matrix(&joint, *m)?;
        created.push(joint.clone());
        chain.push(joint);
    }
    Ok(chain)
}

/// Place the pole off the mid joint, perpendicular to the root-to-tip line,
/// at a distance of the chain span. A straight chain has no bend to read,
/// so the offset falls back to whichever world axis is least aligned with
/// the chain.
pub fn pole_position(positions: &[[f32; 3]]) -> [f32; 3] {
    let root = positions[0];
    let tip = positions[positions.len() - 1];
    let mid = positions[positions.len() / 2];
    let span = vec3_sub(tip, root);
    let span_len = vec3_length(span);
    let distance = span_len.max(1.0);
    let axis = vec3_normalize(span);
    let offset = vec3_sub(mid, root);
    let side = vec3_sub(offset, vec3_scale(axis, vec3_dot(offset, axis)));
    let dir = if vec3_length(side) > CHAIN_EPSILON {
        vec3_normalize(side)
    } else {
        let mut fallback = [0.0, 0.0, 0.0];
        let mut least = 0;
        for i in 1..3 {
            if axis[i].abs() < axis[least].abs() {
                least = i;
            }
        }
        fallback[least] = 1.0;
        let rejected = vec3_sub(fallback, vec3_scale(axis, vec3_dot(fallback, axis)));
        vec3_normalize(rejected)
    };
    vec3_add(mid, vec3_scale(dir, distance))
}

fn apply_ik_pose(
    scene: &mut dyn Scene,
    ik_chain: &[NodeId],
    rest_positions: &[[f32; 3]],
    ik_control: &NodeId,
    pole: [f32; 3],
    soft_ik: Option<SoftIkSpec>,
) -> Result<(), MechanicsError> {
    let root = rest_positions[0];
    let mut target = mat4_translation(&scene.world_matrix(ik_control)?);

    if let Some(soft) = soft_ik {
        let rest_len: f32 = rest_positions
            .windows(2)
            .map(|pair| vec3_length(vec3_sub(pair[1], pair[0])))
            .sum();
        let aim = vec3_sub(target, root);
        let distance = vec3_length(aim);
        if distance > CHAIN_EPSILON {
            let clamped = soft_clamp(distance, rest_len, soft.softness);
            target = vec3_add(root, vec3_scale(vec3_normalize(aim), clamped));
        }
    }

    let solved = if rest_positions.len() == 3 {
        let s = two_bone_solve(root, rest_positions[1], rest_positions[2], target, pole)?;
        vec![s.mid, s.tip]
    } else {
        chained_two_bone(rest_positions, target, pole)?
    };

    for (joint, pos) in ik_chain.iter().skip(1).zip(&solved) {
        let mut m = scene.world_matrix(joint)?;
        m[12] = pos[0];
        m[13] = pos[1];
        m[14] = pos[2];
        scene.set_world_matrix(joint, m)?;
    }
    Ok(())
}
