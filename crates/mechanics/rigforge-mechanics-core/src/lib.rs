//! rigforge-mechanics-core
//!
//! Reusable rig mechanics shared by the limb components: the IK/FK/NK
//! blend primitive, the two-bone analytic solve (plus the chained variant
//! for longer chains), the soft-IK length clamp, and twist distribution.
//! The math half is pure and unit-tested headless; the build half talks to
//! the scene only through the `Scene` trait.

pub mod blend;
pub mod error;
pub mod solve;
pub mod twist;

pub use blend::{build_blend, pole_position, BlendSpec, BlendUnit, SoftIkSpec};
pub use error::MechanicsError;
pub use solve::{
    chain_facing, chained_two_bone, soft_clamp, two_bone_from_lengths, two_bone_solve,
    ChainFacing, TwoBoneSolution, CHAIN_EPSILON,
};
pub use twist::{build_twist, distribute_twist, twist_params, TwistSpec, TwistUnit};
