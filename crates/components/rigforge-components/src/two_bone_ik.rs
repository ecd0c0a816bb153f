//! "Standard : Two Bone IK" — the plain three-joint blend limb.
//!
//! Walks the joint chain between "Root Joint" and "Tip Joint", builds an
//! IK/FK/NK blend over it and exposes the blended joints as outputs. The
//! blend weight attribute defaults to 0, so a freshly built limb follows
//! the IK control.

use log::debug;
use rigforge_api_core::{NodeId, Value};
use rigforge_mechanics_core::{build_blend, BlendSpec, SoftIkSpec};
use rigforge_stack_core::{
    create_guide_for_targets, remove_guide_for_targets, BuildContext, Component, ComponentCore,
    DeclareOpts, StackError, UserFunction,
};

use crate::support::{
    apply_captured_pose, bool_option, float_option, location_side, mechanics_failure, node_input,
    text_input, walk_chain,
};

pub const IDENTIFIER: &str = "Standard : Two Bone IK";

pub struct TwoBoneIk {
    core: ComponentCore,
}

impl TwoBoneIk {
    pub fn new() -> Result<Self, StackError> {
        let mut core = ComponentCore::new(IDENTIFIER);
        core.declare_input("Root Joint", DeclareOpts::default())?;
        core.declare_input("Tip Joint", DeclareOpts::default())?;
        core.declare_input("Name", DeclareOpts::default())?;
        core.declare_option("Location", {
            let mut opts = DeclareOpts::inherited(None);
            opts.pre_expose = true;
            opts
        })?;
        core.declare_option("Soft Ik", {
            let mut opts = DeclareOpts::with_value(Value::Bool(false));
            opts.validate = false;
            opts
        })?;
        core.declare_option("Softness", {
            let mut opts = DeclareOpts::with_value(Value::f(0.4));
            opts.validate = false;
            opts
        })?;
        core.declare_guide_option()?;
        core.declare_output("Blended Upper", DeclareOpts::optional())?;
        core.declare_output("Blended Lower", DeclareOpts::optional())?;
        core.declare_output("Blended Tip", DeclareOpts::optional())?;
        Ok(TwoBoneIk { core })
    }

    fn chain(&self, scene: &dyn rigforge_api_core::Scene) -> Result<Vec<NodeId>, StackError> {
        let name = self.core.display_name();
        let root = node_input(&self.core, "Root Joint").ok_or_else(|| {
            StackError::validation(&name, "'Root Joint' does not reference a scene node")
        })?;
        let tip = node_input(&self.core, "Tip Joint").ok_or_else(|| {
            StackError::validation(&name, "'Tip Joint' does not reference a scene node")
        })?;
        walk_chain(scene, &name, &root, &tip)
    }
}

impl Component for TwoBoneIk {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn run(&mut self, ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
        let name = self.core.display_name();
        self.core.reset_previous_build(ctx.scene)?;

        let chain = self.chain(ctx.scene)?;
        if chain.len() != 3 {
            return Err(StackError::validation(
                &name,
                format!("expected a three joint chain, found {} joints", chain.len()),
            ));
        }
        apply_captured_pose(&self.core, ctx.scene)?;

        let label = text_input(&self.core, "Name").unwrap_or_else(|| "twoBone".to_string());
        let side = location_side(ctx.config, &self.core);

        let settings = ctx
            .scene
            .create_node("transform", &ctx.config.format_name(side, &label, "settings"))?;

        let mut spec = BlendSpec::new(
            chain,
            settings.clone(),
            ctx.config.format_name(side, &label, "blend"),
        );
        if bool_option(&self.core, "Soft Ik") {
            spec.soft_ik = Some(SoftIkSpec {
                softness: float_option(&self.core, "Softness").unwrap_or(0.4),
            });
        }
        let unit = build_blend(ctx.scene, &spec).map_err(|e| mechanics_failure(&name, e))?;

        let mut created = vec![settings];
        created.extend(unit.created.iter().cloned());
        self.core.record_build_nodes(&created);

        self.core
            .set_output("Blended Upper", Value::node(unit.nk_chain[0].clone()))?;
        self.core
            .set_output("Blended Lower", Value::node(unit.nk_chain[1].clone()))?;
        self.core
            .set_output("Blended Tip", Value::node(unit.nk_chain[2].clone()))?;
        debug!("built {name}");
        Ok(())
    }

    fn user_functions(&self) -> Vec<UserFunction> {
        vec![
            UserFunction::new("build_skeleton", "Build Skeleton"),
            UserFunction::new("create_guide", "Create Guide"),
            UserFunction::new("remove_guide", "Remove Guide"),
        ]
    }

    fn call_user_function(
        &mut self,
        id: &str,
        ctx: &mut BuildContext<'_>,
        selection: &[NodeId],
    ) -> Result<(), StackError> {
        match id {
            "build_skeleton" => {
                // Seed the joint inputs from the host selection.
                let name = self.core.display_name();
                let (first, last) = match (selection.first(), selection.last()) {
                    (Some(first), Some(last)) if selection.len() >= 2 => (first, last),
                    _ => {
                        return Err(StackError::validation(
                            &name,
                            "select the chain's root and tip joints first",
                        ))
                    }
                };
                if let Some(attr) = self.core.input_mut("Root Joint") {
                    attr.set(Value::node(first.clone()));
                }
                if let Some(attr) = self.core.input_mut("Tip Joint") {
                    attr.set(Value::node(last.clone()));
                }
                Ok(())
            }
            "create_guide" => self.create_guide(ctx),
            "remove_guide" => self.remove_guide(ctx),
            _ => Err(StackError::validation(
                self.core.display_name(),
                format!("unknown user function '{id}'"),
            )),
        }
    }

    fn create_guide(&mut self, ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
        let chain = self.chain(ctx.scene)?;
        let label = text_input(&self.core, "Name").unwrap_or_else(|| "twoBone".to_string());
        let side = location_side(ctx.config, &self.core);
        let prefix = crate::support::qualified_label(ctx.config, side, &label);
        create_guide_for_targets(&mut self.core, ctx.scene, &chain, &prefix)
    }

    fn remove_guide(&mut self, ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
        remove_guide_for_targets(&mut self.core, ctx.scene)
    }
}
