//! rigforge-components
//!
//! The built-in component set. Everything here is plain [`Component`]
//! implementations over the stack engine and the mechanics primitives;
//! hosts call [`register_builtins`] once and instantiate through the
//! registry from then on.

pub mod limb;
pub mod root;
mod support;
pub mod twister;
pub mod two_bone_ik;

pub use limb::Limb;
pub use root::Root;
pub use twister::Twister;
pub use two_bone_ik::TwoBoneIk;

use rigforge_stack_core::{Component, Registry};

/// Register every built-in component under its stable identifier.
pub fn register_builtins(registry: &mut Registry) {
    registry.register(root::IDENTIFIER, || {
        Ok(Box::new(Root::new()?) as Box<dyn Component>)
    });
    registry.register(two_bone_ik::IDENTIFIER, || {
        Ok(Box::new(TwoBoneIk::new()?) as Box<dyn Component>)
    });
    registry.register(limb::ARM, || {
        Ok(Box::new(Limb::arm()?) as Box<dyn Component>)
    });
    registry.register(limb::LEG, || {
        Ok(Box::new(Limb::leg()?) as Box<dyn Component>)
    });
    registry.register(twister::IDENTIFIER, || {
        Ok(Box::new(Twister::new()?) as Box<dyn Component>)
    });
}
