//! "Standard : Root" — the rig's top-level control.

use log::debug;
use rigforge_api_core::Value;
use rigforge_stack_core::{
    BuildContext, Component, ComponentCore, DeclareOpts, StackError,
};

use crate::support::{location_side, text_input};

pub const IDENTIFIER: &str = "Standard : Root";

/// Builds a single root control and exposes it for everything downstream
/// to parent under or address. Its "Location" option is the usual source
/// of inherited side tokens.
pub struct Root {
    core: ComponentCore,
}

impl Root {
    pub fn new() -> Result<Self, StackError> {
        let mut core = ComponentCore::new(IDENTIFIER);
        core.declare_input("Name", DeclareOpts::default())?;
        core.declare_option("Location", {
            let mut opts = DeclareOpts::inherited(Some(Value::text("Middle")));
            opts.pre_expose = true;
            opts
        })?;
        core.declare_output("Root", DeclareOpts::optional())?;
        Ok(Root { core })
    }
}

impl Component for Root {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn run(&mut self, ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
        let name = self.core.display_name();
        self.core.reset_previous_build(ctx.scene)?;

        let label = text_input(&self.core, "Name")
            .ok_or_else(|| StackError::validation(&name, "'Name' must be text"))?;
        let side = location_side(ctx.config, &self.core);

        let ctl = ctx
            .scene
            .create_node("transform", &ctx.config.format_name(side, &label, "root_ctl"))?;
        self.core.record_build_nodes(std::slice::from_ref(&ctl));
        self.core.set_output("Root", Value::node(ctl))?;
        debug!("built {name}");
        Ok(())
    }
}
