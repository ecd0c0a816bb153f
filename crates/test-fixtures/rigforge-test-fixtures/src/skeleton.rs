//! Skeleton builders shared by the integration tests.

use anyhow::{ensure, Result};
use rigforge_api_core::math::mat4_from_translation;
use rigforge_api_core::{NodeId, Scene};

use crate::MemoryScene;

/// Create joints parented root to tip at the given world positions.
pub fn joint_chain(
    scene: &mut MemoryScene,
    names: &[&str],
    positions: &[[f32; 3]],
) -> Result<Vec<NodeId>> {
    ensure!(
        names.len() == positions.len(),
        "need one position per joint name"
    );
    let mut chain: Vec<NodeId> = Vec::with_capacity(names.len());
    for (name, pos) in names.iter().zip(positions) {
        let joint = scene.create_node("joint", name)?;
        scene.set_parent(&joint, chain.last())?;
        scene.set_world_matrix(&joint, mat4_from_translation(*pos))?;
        chain.push(joint);
    }
    Ok(chain)
}

/// The canonical upper/lower/tip arm used across tests: two bones of
/// length ~1.5 with a slight bend so the pole plane is well defined.
pub fn three_joint_chain(scene: &mut MemoryScene) -> Result<Vec<NodeId>> {
    joint_chain(
        scene,
        &["upper", "lower", "tip"],
        &[[0.0, 0.0, 0.0], [1.5, 0.0, 0.3], [3.0, 0.0, 0.0]],
    )
}
