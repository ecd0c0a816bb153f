//! rigforge-api-core: unified Value & scene-capability API (core, host-agnostic)

pub mod address;
pub mod math;
pub mod scene;
pub mod value;

pub use address::{Address, ComponentRef};
pub use scene::{
    AttrSpec, ConstraintKind, ConstraintOptions, NodeId, Scene, SceneError,
};
pub use value::{Value, ValueKind};
