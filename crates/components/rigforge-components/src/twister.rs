//! "Augment : Twister" — roll joints distributed along one bone.
//!
//! The variable-cardinality example: its `Twist N` outputs follow the
//! "Count" option (or an explicit "Joints" list), re-declared in `sync()`
//! whenever attributes move.

use log::debug;
use rigforge_api_core::math::{lerp3, mat4_from_translation, mat4_translation};
use rigforge_api_core::{NodeId, Value};
use rigforge_mechanics_core::{build_twist, TwistSpec};
use rigforge_stack_core::{
    BuildContext, Component, ComponentCore, DeclareOpts, StackError,
};

use crate::support::{mechanics_failure, node_input};

pub const IDENTIFIER: &str = "Augment : Twister";

pub struct Twister {
    core: ComponentCore,
}

impl Twister {
    pub fn new() -> Result<Self, StackError> {
        let mut core = ComponentCore::new(IDENTIFIER);
        core.declare_input("Root", DeclareOpts::default())?;
        core.declare_input("Tip", DeclareOpts::default())?;
        core.declare_input("Joints", DeclareOpts::optional())?;
        core.declare_option("Count", {
            let mut opts = DeclareOpts::with_value(Value::f(2.0));
            opts.validate = false;
            opts
        })?;
        core.redeclare_outputs("Twist", 2)?;
        Ok(Twister { core })
    }

    /// Provided joint list, when the rigger supplies their own roll joints.
    fn joint_list(&self) -> Vec<NodeId> {
        self.core
            .input("Joints")
            .map(|a| a.value())
            .and_then(|v| {
                v.as_list().map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_node().map(str::to_string))
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    fn desired_count(&self) -> usize {
        let provided = self.joint_list();
        if !provided.is_empty() {
            return provided.len();
        }
        self.core
            .option("Count")
            .map(|a| a.value())
            .and_then(|v| v.as_f32())
            .unwrap_or(0.0)
            .max(0.0)
            .round() as usize
    }
}

impl Component for Twister {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn sync(&mut self) {
        let count = self.desired_count();
        let redeclared = self.core.redeclare_outputs("Twist", count);
        debug_assert!(redeclared.is_ok(), "{redeclared:?}");
    }

    fn run(&mut self, ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
        let name = self.core.display_name();
        self.core.reset_previous_build(ctx.scene)?;

        let root = node_input(&self.core, "Root").ok_or_else(|| {
            StackError::validation(&name, "'Root' does not reference a scene node")
        })?;
        let tip = node_input(&self.core, "Tip").ok_or_else(|| {
            StackError::validation(&name, "'Tip' does not reference a scene node")
        })?;

        let mut created = Vec::new();
        let mut joints = self.joint_list();
        if joints.is_empty() {
            // No joints supplied: spread roll joints evenly between the
            // segment ends, parented under the root driver.
            let count = self.desired_count();
            let root_pos = mat4_translation(&ctx.scene.world_matrix(&root)?);
            let tip_pos = mat4_translation(&ctx.scene.world_matrix(&tip)?);
            for i in 0..count {
                let t = (i + 1) as f32 / (count + 1) as f32;
                let joint = ctx
                    .scene
                    .create_node("joint", &format!("{root}_twist{i}"))?;
                ctx.scene.set_parent(&joint, Some(&root))?;
                ctx.scene
                    .set_world_matrix(&joint, mat4_from_translation(lerp3(root_pos, tip_pos, t)))?;
                created.push(joint.clone());
                joints.push(joint);
            }
        }

        self.core.redeclare_outputs("Twist", joints.len())?;

        let spec = TwistSpec {
            root,
            tip,
            joints: joints.clone(),
        };
        let unit = build_twist(ctx.scene, &spec).map_err(|e| mechanics_failure(&name, e))?;
        created.extend(unit.created.iter().cloned());
        self.core.record_build_nodes(&created);

        for (i, joint) in joints.iter().enumerate() {
            self.core
                .set_output(&format!("Twist {i}"), Value::node(joint.clone()))?;
        }
        debug!("built {name} with {} roll joints", joints.len());
        Ok(())
    }
}
