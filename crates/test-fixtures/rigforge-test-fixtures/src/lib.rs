//! Test fixtures for the rigforge workspace: an in-memory scene backend
//! and skeleton builders. Dev-dependency only, never published.

mod scene;
mod skeleton;

pub use scene::MemoryScene;
pub use skeleton::{joint_chain, three_joint_chain};
