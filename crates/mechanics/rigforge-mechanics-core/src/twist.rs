//! Twist distribution along a bone segment.
//!
//! Roll joints between a segment's root and tip each pick up a fraction of
//! the end rotation, proportional to how far along the segment they sit.
//! The pure half (`twist_params`, `distribute_twist`) is scene-free; the
//! wiring half (`build_twist`) emits weighted orient constraints.

use rigforge_api_core::math::{mat4_translation, slerp, vec3_dot, vec3_length, vec3_sub};
use rigforge_api_core::{ConstraintKind, ConstraintOptions, NodeId, Scene, Value};

use crate::error::MechanicsError;
use crate::solve::CHAIN_EPSILON;

/// Normalized position of each joint along the root-to-tip segment,
/// from projection onto the segment axis, clamped to `[0, 1]`.
pub fn twist_params(
    root: [f32; 3],
    tip: [f32; 3],
    joints: &[[f32; 3]],
) -> Result<Vec<f32>, MechanicsError> {
    let axis = vec3_sub(tip, root);
    let len_sq = vec3_dot(axis, axis);
    if vec3_length(axis) < CHAIN_EPSILON {
        return Err(MechanicsError::degenerate("twist segment has no length"));
    }
    Ok(joints
        .iter()
        .map(|&p| (vec3_dot(vec3_sub(p, root), axis) / len_sq).clamp(0.0, 1.0))
        .collect())
}

/// Interpolate from the root rotation toward the tip rotation by each
/// param. Shortest-arc slerp per joint, so a tip twisted past 180 degrees
/// never candy-wraps the intermediate joints the long way round.
pub fn distribute_twist(root_q: [f32; 4], tip_q: [f32; 4], params: &[f32]) -> Vec<[f32; 4]> {
    params
        .iter()
        .map(|&t| slerp(root_q, tip_q, t.clamp(0.0, 1.0)))
        .collect()
}

/// One twist segment: the two end drivers and the roll joints between them.
#[derive(Clone, Debug)]
pub struct TwistSpec {
    pub root: NodeId,
    pub tip: NodeId,
    pub joints: Vec<NodeId>,
}

/// What `build_twist` wired up.
#[derive(Clone, Debug)]
pub struct TwistUnit {
    /// Normalized param per roll joint, in `joints` order.
    pub params: Vec<f32>,
    /// Constraint nodes spawned, for rebuild bookkeeping.
    pub created: Vec<NodeId>,
}

/// Constrain each roll joint to both segment ends with weights `(1 - t, t)`
/// and shortest-arc interpolation.
pub fn build_twist(scene: &mut dyn Scene, spec: &TwistSpec) -> Result<TwistUnit, MechanicsError> {
    let root_pos = mat4_translation(&scene.world_matrix(&spec.root)?);
    let tip_pos = mat4_translation(&scene.world_matrix(&spec.tip)?);
    let joint_pos: Vec<[f32; 3]> = spec
        .joints
        .iter()
        .map(|id| Ok(mat4_translation(&scene.world_matrix(id)?)))
        .collect::<Result<_, MechanicsError>>()?;
    let params = twist_params(root_pos, tip_pos, &joint_pos)?;

    let drivers = [spec.root.clone(), spec.tip.clone()];
    let mut created = Vec::with_capacity(spec.joints.len());
    for (joint, &t) in spec.joints.iter().zip(&params) {
        let constraint = scene.create_constraint(
            ConstraintKind::Orient,
            &drivers,
            joint,
            ConstraintOptions::shortest(),
        )?;
        let weights = scene.constraint_weight_attrs(&constraint)?;
        if weights.len() != drivers.len() {
            return Err(MechanicsError::Scene(
                rigforge_api_core::SceneError::invalid(format!(
                    "constraint {constraint} exposes {} weights for {} drivers",
                    weights.len(),
                    drivers.len()
                )),
            ));
        }
        scene.set_attr(&constraint, &weights[0], Value::Float(1.0 - t))?;
        scene.set_attr(&constraint, &weights[1], Value::Float(t))?;
        created.push(constraint);
    }
    Ok(TwistUnit { params, created })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigforge_api_core::math::{quat_dot, quat_from_axis_angle, QUAT_IDENTITY};

    #[test]
    fn params_follow_projection() {
        let params = twist_params(
            [0.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
            &[[1.0, 0.0, 0.0], [2.0, 0.5, 0.0], [3.0, 0.0, 0.0]],
        )
        .unwrap();
        assert!((params[0] - 0.25).abs() < 1e-5);
        assert!((params[1] - 0.5).abs() < 1e-5);
        assert!((params[2] - 0.75).abs() < 1e-5);
    }

    #[test]
    fn params_clamp_outliers() {
        let params = twist_params(
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            &[[-1.0, 0.0, 0.0], [5.0, 0.0, 0.0]],
        )
        .unwrap();
        assert_eq!(params, vec![0.0, 1.0]);
    }

    #[test]
    fn params_reject_zero_segment() {
        let err = twist_params([1.0, 2.0, 3.0], [1.0, 2.0, 3.0], &[[0.0; 3]]).unwrap_err();
        assert!(matches!(err, MechanicsError::DegenerateChain { .. }));
    }

    #[test]
    fn distribute_hits_endpoints() {
        let tip = quat_from_axis_angle([1.0, 0.0, 0.0], 1.4);
        let out = distribute_twist(QUAT_IDENTITY, tip, &[0.0, 1.0]);
        assert!(quat_dot(out[0], QUAT_IDENTITY).abs() > 1.0 - 1e-4);
        assert!(quat_dot(out[1], tip).abs() > 1.0 - 1e-4);
    }

    #[test]
    fn distribute_takes_short_path_past_half_turn() {
        // 340 degrees of tip roll: halfway is -10 degrees, not +170.
        let tip = quat_from_axis_angle([1.0, 0.0, 0.0], 340.0_f32.to_radians());
        let out = distribute_twist(QUAT_IDENTITY, tip, &[0.5]);
        let expected = quat_from_axis_angle([1.0, 0.0, 0.0], -10.0_f32.to_radians());
        assert!(quat_dot(out[0], expected).abs() > 1.0 - 1e-4);
    }
}
