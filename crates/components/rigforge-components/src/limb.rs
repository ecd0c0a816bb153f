//! "Standard : Arm" and "Standard : Leg" — full limbs over the shared
//! blend primitive.
//!
//! Both are the same component with a different profile: naming role,
//! soft-IK default and twist density. The twist segments are not built
//! inline; the limb spawns "Augment : Twister" sub-components through the
//! registry and folds their nodes into its own build record.

use log::debug;
use rigforge_api_core::{NodeId, Value};
use rigforge_mechanics_core::{build_blend, BlendSpec, SoftIkSpec};
use rigforge_stack_core::{
    create_guide_for_targets, remove_guide_for_targets, BuildContext, Component, ComponentCore,
    DeclareOpts, StackError, UserFunction,
};

use crate::support::{
    apply_captured_pose, bool_option, float_option, location_side, mechanics_failure, node_input,
    qualified_label, text_input, walk_chain,
};
use crate::twister;

pub const ARM: &str = "Standard : Arm";
pub const LEG: &str = "Standard : Leg";

struct Profile {
    identifier: &'static str,
    role: &'static str,
    soft_ik: bool,
    twist_joints: f32,
}

const ARM_PROFILE: Profile = Profile {
    identifier: ARM,
    role: "Arm",
    soft_ik: true,
    twist_joints: 2.0,
};

// Legs carry denser twist for skinning around the knee; the pole plane
// itself comes from the rest-pose bend, not from a per-profile axis.
const LEG_PROFILE: Profile = Profile {
    identifier: LEG,
    role: "Leg",
    soft_ik: true,
    twist_joints: 3.0,
};

pub struct Limb {
    core: ComponentCore,
    role: &'static str,
}

impl Limb {
    pub fn arm() -> Result<Self, StackError> {
        Limb::with_profile(&ARM_PROFILE)
    }

    pub fn leg() -> Result<Self, StackError> {
        Limb::with_profile(&LEG_PROFILE)
    }

    fn with_profile(profile: &Profile) -> Result<Self, StackError> {
        let mut core = ComponentCore::new(profile.identifier);
        core.declare_input("Root Joint", DeclareOpts::default())?;
        core.declare_input("Tip Joint", DeclareOpts::default())?;
        core.declare_input("Name", DeclareOpts::default())?;
        core.declare_input("Parent", DeclareOpts::optional())?;
        core.declare_option("Location", {
            let mut opts = DeclareOpts::inherited(None);
            opts.pre_expose = true;
            opts
        })?;
        core.declare_option("Soft Ik", {
            let mut opts = DeclareOpts::with_value(Value::Bool(profile.soft_ik));
            opts.validate = false;
            opts
        })?;
        core.declare_option("Softness", {
            let mut opts = DeclareOpts::with_value(Value::f(0.4));
            opts.validate = false;
            opts
        })?;
        core.declare_option("Twist Joints", {
            let mut opts = DeclareOpts::with_value(Value::f(profile.twist_joints));
            opts.validate = false;
            opts
        })?;
        core.declare_guide_option()?;
        core.declare_output("Blended Upper", DeclareOpts::optional())?;
        core.declare_output("Blended Lower", DeclareOpts::optional())?;
        core.declare_output("Blended Tip", DeclareOpts::optional())?;
        core.declare_output("Ik Control", DeclareOpts::optional())?;
        core.declare_output("Settings", DeclareOpts::optional())?;
        Ok(Limb {
            core,
            role: profile.role,
        })
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

    fn spawn_twister(
        &self,
        ctx: &mut BuildContext<'_>,
        seg_root: &NodeId,
        seg_tip: &NodeId,
        count: f32,
        created: &mut Vec<NodeId>,
    ) -> Result<(), StackError> {
        let mut segment = ctx.spawn(twister::IDENTIFIER)?;
        {
            let core = segment.core_mut();
            if let Some(attr) = core.input_mut("Root") {
                attr.set(Value::node(seg_root.clone()));
            }
            if let Some(attr) = core.input_mut("Tip") {
                attr.set(Value::node(seg_tip.clone()));
            }
            if let Some(attr) = core.option_mut("Count") {
                attr.set(Value::f(count));
            }
        }
        segment.sync();
        segment.run(ctx)?;
        created.extend(segment.core().previous_build_nodes());
        Ok(())
    }
}

impl Component for Limb {
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

        let label = text_input(&self.core, "Name").unwrap_or_else(|| self.role.to_string());
        let side = location_side(ctx.config, &self.core);
        let parent = node_input(&self.core, "Parent");

        let settings = ctx
            .scene
            .create_node("transform", &ctx.config.format_name(side, &label, "settings"))?;
        ctx.scene.set_parent(&settings, parent.as_ref())?;

        let mut spec = BlendSpec::new(
            chain,
            settings.clone(),
            ctx.config.format_name(side, &label, "blend"),
        );
        spec.ik_parent = parent.clone();
        spec.fk_parent = parent.clone();
        spec.nk_parent = parent;
        if bool_option(&self.core, "Soft Ik") {
            spec.soft_ik = Some(SoftIkSpec {
                softness: float_option(&self.core, "Softness").unwrap_or(0.4),
            });
        }
        let unit = build_blend(ctx.scene, &spec).map_err(|e| mechanics_failure(&name, e))?;

        let mut created = vec![settings.clone()];
        created.extend(unit.created.iter().cloned());

        // Twist rides on the blended chain, one twister per bone.
        let twist_count = float_option(&self.core, "Twist Joints")
            .unwrap_or(0.0)
            .max(0.0)
            .round();
        if twist_count >= 1.0 {
            for window in unit.nk_chain.windows(2) {
                self.spawn_twister(ctx, &window[0], &window[1], twist_count, &mut created)?;
            }
        }

        self.core.record_build_nodes(&created);

        self.core
            .set_output("Blended Upper", Value::node(unit.nk_chain[0].clone()))?;
        self.core
            .set_output("Blended Lower", Value::node(unit.nk_chain[1].clone()))?;
        self.core
            .set_output("Blended Tip", Value::node(unit.nk_chain[2].clone()))?;
        self.core
            .set_output("Ik Control", Value::node(unit.ik_control.clone()))?;
        self.core.set_output("Settings", Value::node(settings))?;
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
        let label = text_input(&self.core, "Name").unwrap_or_else(|| self.role.to_string());
        let side = location_side(ctx.config, &self.core);
        let prefix = qualified_label(ctx.config, side, &label);
        create_guide_for_targets(&mut self.core, ctx.scene, &chain, &prefix)
    }

    fn remove_guide(&mut self, ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
        remove_guide_for_targets(&mut self.core, ctx.scene)
    }
}
