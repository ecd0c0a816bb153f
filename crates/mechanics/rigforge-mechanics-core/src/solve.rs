//! Pure kinematics math: chain facing detection, the two-bone analytic
//! solve, the chained variant for longer chains, and the soft-IK length
//! clamp. No scene access here, so everything is unit-testable headless.

use rigforge_api_core::math::{
    vec3_add, vec3_dot, vec3_length, vec3_normalize, vec3_scale, vec3_sub,
};

use crate::error::MechanicsError;

/// Direction queries on chains shorter than this span are ambiguous.
pub const CHAIN_EPSILON: f32 = 1e-5;

/// Which local axis a bone chain runs down, and whether it points negative.
/// FK control shapes and the soft-IK forward sign depend on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainFacing {
    /// Dominant axis index: 0 = X, 1 = Y, 2 = Z.
    pub axis: usize,
    pub negative: bool,
}

/// Detect chain facing from joint positions.
///
/// Computed, never assumed: the dominant component of the root-to-tip span
/// decides the axis, its sign decides the direction. Any near-zero segment
/// makes the answer ambiguous and the test fails closed.
pub fn chain_facing(positions: &[[f32; 3]]) -> Result<ChainFacing, MechanicsError> {
    if positions.len() < 2 {
        return Err(MechanicsError::ChainTooShort {
            need: 2,
            got: positions.len(),
        });
    }
    for pair in positions.windows(2) {
        if vec3_length(vec3_sub(pair[1], pair[0])) < CHAIN_EPSILON {
            return Err(MechanicsError::degenerate("near-zero length segment"));
        }
    }
    let span = vec3_sub(positions[positions.len() - 1], positions[0]);
    if vec3_length(span) < CHAIN_EPSILON {
        return Err(MechanicsError::degenerate("root and tip coincide"));
    }
    let mut axis = 0;
    for i in 1..3 {
        if span[i].abs() > span[axis].abs() {
            axis = i;
        }
    }
    Ok(ChainFacing {
        axis,
        negative: span[axis] < 0.0,
    })
}

/// Result of a two-bone analytic solve, expressed as joint positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TwoBoneSolution {
    pub mid: [f32; 3],
    pub tip: [f32; 3],
    /// False when the target is outside the chain's reach and the tip was
    /// clamped to full extension.
    pub reached: bool,
}

/// Two-bone analytic IK: place `mid` and `tip` so the chain reaches
/// `target`, bending in the plane defined by `pole`.
pub fn two_bone_solve(
    root: [f32; 3],
    mid: [f32; 3],
    tip: [f32; 3],
    target: [f32; 3],
    pole: [f32; 3],
) -> Result<TwoBoneSolution, MechanicsError> {
    let upper_len = vec3_length(vec3_sub(mid, root));
    let lower_len = vec3_length(vec3_sub(tip, mid));
    two_bone_from_lengths(root, upper_len, lower_len, target, pole)
}

/// The same solve from explicit bone lengths, for callers whose working
/// root has already moved off the rest pose (chained solving).
pub fn two_bone_from_lengths(
    root: [f32; 3],
    upper_len: f32,
    lower_len: f32,
    target: [f32; 3],
    pole: [f32; 3],
) -> Result<TwoBoneSolution, MechanicsError> {
    if upper_len < CHAIN_EPSILON || lower_len < CHAIN_EPSILON {
        return Err(MechanicsError::degenerate("zero-length bone"));
    }

    let aim = vec3_sub(target, root);
    let distance = vec3_length(aim);
    if distance < CHAIN_EPSILON {
        return Err(MechanicsError::degenerate("target coincides with root"));
    }
    let aim_dir = vec3_normalize(aim);

    // Bend plane from the pole vector, with the aim component removed.
    let pole_offset = vec3_sub(pole, root);
    let side = vec3_sub(
        pole_offset,
        vec3_scale(aim_dir, vec3_dot(pole_offset, aim_dir)),
    );
    if vec3_length(side) < CHAIN_EPSILON {
        return Err(MechanicsError::DegeneratePole);
    }
    let side_dir = vec3_normalize(side);

    let reach = upper_len + lower_len;
    if distance >= reach {
        // Fully extended: straight line toward the target.
        let mid_pos = vec3_add(root, vec3_scale(aim_dir, upper_len));
        let tip_pos = vec3_add(root, vec3_scale(aim_dir, reach));
        return Ok(TwoBoneSolution {
            mid: mid_pos,
            tip: tip_pos,
            reached: (distance - reach).abs() < CHAIN_EPSILON,
        });
    }

    // Law of cosines for the angle at the root; clamped so targets inside
    // the annulus |l1 - l2| still produce a pose instead of NaN.
    let cos_root = ((upper_len * upper_len + distance * distance - lower_len * lower_len)
        / (2.0 * upper_len * distance))
        .clamp(-1.0, 1.0);
    let sin_root = (1.0 - cos_root * cos_root).max(0.0).sqrt();

    let mid_pos = vec3_add(
        root,
        vec3_add(
            vec3_scale(aim_dir, upper_len * cos_root),
            vec3_scale(side_dir, upper_len * sin_root),
        ),
    );
    let to_target = vec3_sub(target, mid_pos);
    let tip_pos = if vec3_length(to_target) < CHAIN_EPSILON {
        target
    } else {
        vec3_add(mid_pos, vec3_scale(vec3_normalize(to_target), lower_len))
    };
    let reached = vec3_length(vec3_sub(tip_pos, target)) < 1e-3;
    Ok(TwoBoneSolution {
        mid: mid_pos,
        tip: tip_pos,
        reached,
    })
}

/// Chained two-bone solve for chains longer than three joints (tri-leg).
///
/// Each overlapping bone pair solves toward an intermediate target placed
/// along the root-to-target line at its cumulative rest-length fraction;
/// the final pair takes the real target. Returns the new position of every
/// joint after the root.
pub fn chained_two_bone(
    positions: &[[f32; 3]],
    target: [f32; 3],
    pole: [f32; 3],
) -> Result<Vec<[f32; 3]>, MechanicsError> {
    let n = positions.len();
    if n < 3 {
        return Err(MechanicsError::ChainTooShort { need: 3, got: n });
    }
    if n == 3 {
        let s = two_bone_solve(positions[0], positions[1], positions[2], target, pole)?;
        return Ok(vec![s.mid, s.tip]);
    }

    let lengths: Vec<f32> = positions
        .windows(2)
        .map(|pair| vec3_length(vec3_sub(pair[1], pair[0])))
        .collect();
    let total: f32 = lengths.iter().sum();
    if total < CHAIN_EPSILON {
        return Err(MechanicsError::degenerate("chain has no length"));
    }

    let root = positions[0];
    let to_target = vec3_sub(target, root);
    let mut solved = Vec::with_capacity(n - 1);
    let mut current_root = root;
    let mut cumulative = 0.0f32;
    let mut i = 0;
    while i + 2 < n {
        let pair_target = if i + 3 == n {
            target
        } else {
            cumulative += lengths[i] + lengths[i + 1];
            vec3_add(root, vec3_scale(to_target, (cumulative / total).min(1.0)))
        };
        // Rest-pose bone lengths, not distances from the moved root.
        let s = two_bone_from_lengths(current_root, lengths[i], lengths[i + 1], pair_target, pole)?;
        solved.push(s.mid);
        solved.push(s.tip);
        current_root = s.tip;
        i += 2;
    }
    // Odd remainder: aim the final bone straight at the target.
    if solved.len() < n - 1 {
        let dir = vec3_sub(target, current_root);
        let len = lengths[n - 2];
        let tip = if vec3_length(dir) < CHAIN_EPSILON {
            vec3_add(current_root, [len, 0.0, 0.0])
        } else {
            vec3_add(current_root, vec3_scale(vec3_normalize(dir), len))
        };
        solved.push(tip);
    }
    Ok(solved)
}

/// Soft-IK length clamp.
///
/// Identity below the knee at `rest - softness`; past it the effective
/// length approaches `rest` asymptotically instead of snapping straight:
///
/// ```text
/// f(d) = rest - softness * exp(-(d - (rest - softness)) / softness)
/// ```
pub fn soft_clamp(distance: f32, rest: f32, softness: f32) -> f32 {
    if softness <= CHAIN_EPSILON {
        return distance.min(rest);
    }
    let knee = rest - softness;
    if distance <= knee {
        return distance;
    }
    rest - softness * (-(distance - knee) / softness).exp()
}
