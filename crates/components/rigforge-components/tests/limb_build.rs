//! End-to-end component builds over the in-memory scene.

use rigforge_api_core::math::{
    mat4_decompose, mat4_from_trs, mat4_translation, quat_dot, quat_from_axis_angle, QUAT_IDENTITY,
};
use rigforge_api_core::{Scene, Value};
use rigforge_components::register_builtins;
use rigforge_stack_core::{BuildStatus, Config, Registry, Stack};
use rigforge_test_fixtures::{three_joint_chain, MemoryScene};

fn registry() -> Registry {
    let mut reg = Registry::new();
    register_builtins(&mut reg);
    reg
}

fn assert_quat_close(a: [f32; 4], b: [f32; 4]) {
    let dot = quat_dot(a, b).abs();
    assert!(dot > 1.0 - 1e-3, "{a:?} != {b:?} (|dot| = {dot})");
}

fn assert_vec3_close(a: [f32; 3], b: [f32; 3]) {
    for i in 0..3 {
        assert!((a[i] - b[i]).abs() < 1e-3, "{a:?} != {b:?}");
    }
}

/// Stack with one "Standard : Two Bone IK" over the canonical arm chain.
fn two_bone_stack(scene: &mut MemoryScene, reg: &Registry) -> (Stack, usize) {
    three_joint_chain(scene).unwrap();
    let mut stack = Stack::new(Config::default());
    let at = stack
        .add(reg, "Standard : Two Bone IK", Some("arm".to_string()), None)
        .unwrap();
    let core = stack.component_mut(at).unwrap().core_mut();
    core.input_mut("Root Joint").unwrap().set(Value::node("upper"));
    core.input_mut("Tip Joint").unwrap().set(Value::node("tip"));
    core.input_mut("Name").unwrap().set(Value::text("Arm"));
    core.option_mut("Location").unwrap().set(Value::text("Left"));
    (stack, at)
}

#[test]
fn two_bone_ik_builds_blended_outputs() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    let (mut stack, at) = two_bone_stack(&mut scene, &reg);

    let report = stack.build(&reg, &mut scene);
    assert!(report.all_ok(), "{report:?}");

    let core = stack.component(at).unwrap().core();
    let outputs: Vec<String> = ["Blended Upper", "Blended Lower", "Blended Tip"]
        .iter()
        .map(|name| {
            core.output(name)
                .unwrap()
                .value()
                .as_node()
                .unwrap()
                .to_string()
        })
        .collect();
    // three distinct live nodes, none of them the source joints
    assert_eq!(outputs.len(), 3);
    for (i, id) in outputs.iter().enumerate() {
        assert!(scene.exists(id), "missing {id}");
        assert!(!["upper", "lower", "tip"].contains(&id.as_str()));
        for other in &outputs[i + 1..] {
            assert_ne!(id, other);
        }
    }

    // the blend attribute defaults to pure IK
    let settings = "L_Arm_settings".to_string();
    assert_eq!(
        scene.get_attr(&settings, "ik_fk").unwrap(),
        Value::Float(0.0)
    );
}

#[test]
fn blend_is_exact_at_both_boundaries() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    let (mut stack, _) = two_bone_stack(&mut scene, &reg);
    assert!(stack.build(&reg, &mut scene).all_ok());

    let settings = "L_Arm_settings".to_string();
    let fk_ctl = "L_Arm_blend_fk0_ctl".to_string();
    let ik_root = "L_Arm_blend_ik0".to_string();
    let upper = "upper".to_string();

    // pose the FK side away from rest
    let q = quat_from_axis_angle([0.0, 0.0, 1.0], 0.9);
    let pos = mat4_translation(&scene.world_matrix(&fk_ctl).unwrap());
    scene
        .set_world_matrix(&fk_ctl, mat4_from_trs(pos, q, [1.0; 3]))
        .unwrap();

    // weight 0: the skeleton tracks the IK chain exactly
    scene.set_attr(&settings, "ik_fk", Value::Float(0.0)).unwrap();
    let (_, rot, _) = mat4_decompose(&scene.world_matrix(&upper).unwrap());
    let (_, ik_rot, _) = mat4_decompose(&scene.world_matrix(&ik_root).unwrap());
    assert_quat_close(rot, ik_rot);
    assert_quat_close(rot, QUAT_IDENTITY);

    // weight 1: the skeleton tracks the FK pose exactly
    scene.set_attr(&settings, "ik_fk", Value::Float(1.0)).unwrap();
    let (_, rot, _) = mat4_decompose(&scene.world_matrix(&upper).unwrap());
    assert_quat_close(rot, q);
}

#[test]
fn guide_round_trip_restores_transforms() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    let (mut stack, at) = two_bone_stack(&mut scene, &reg);

    let rest_locals: Vec<[f32; 16]> = ["upper", "lower", "tip"]
        .iter()
        .map(|id| scene.local_matrix(&id.to_string()).unwrap())
        .collect();

    stack.create_guide(at, &reg, &mut scene).unwrap();
    assert!(scene.exists(&"L_Arm_guide0".to_string()));

    // creating a second guide while one is live is illegal
    let err = stack.create_guide(at, &reg, &mut scene).unwrap_err();
    assert!(err.to_string().contains("guide"), "{err}");

    // building while the guide is live fails that component
    let report = stack.build(&reg, &mut scene);
    match report.status(at).unwrap() {
        BuildStatus::Failed { error } => assert!(error.contains("remove the guide"), "{error}"),
        other => panic!("expected guide failure, got {other:?}"),
    }

    stack.remove_guide(at, &reg, &mut scene).unwrap();
    assert!(!scene.exists(&"L_Arm_guide0".to_string()));
    for (id, rest) in ["upper", "lower", "tip"].iter().zip(&rest_locals) {
        assert_eq!(&scene.local_matrix(&id.to_string()).unwrap(), rest);
    }

    // removing again is illegal until a new guide exists
    assert!(stack.remove_guide(at, &reg, &mut scene).is_err());
    stack.create_guide(at, &reg, &mut scene).unwrap();
    stack.remove_guide(at, &reg, &mut scene).unwrap();
}

#[test]
fn guide_pose_drives_the_next_build() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    let (mut stack, at) = two_bone_stack(&mut scene, &reg);

    stack.create_guide(at, &reg, &mut scene).unwrap();
    let tip_guide = "L_Arm_guide2".to_string();
    let posed = [2.5, 0.5, 0.0];
    scene
        .set_world_matrix(&tip_guide, mat4_from_trs(posed, QUAT_IDENTITY, [1.0; 3]))
        .unwrap();
    stack.remove_guide(at, &reg, &mut scene).unwrap();

    let report = stack.build(&reg, &mut scene);
    assert!(report.all_ok(), "{report:?}");
    assert_vec3_close(
        mat4_translation(&scene.world_matrix(&"tip".to_string()).unwrap()),
        posed,
    );
}

#[test]
fn soft_ik_option_reaches_the_handle() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    let (mut stack, at) = two_bone_stack(&mut scene, &reg);
    let core = stack.component_mut(at).unwrap().core_mut();
    core.option_mut("Soft Ik").unwrap().set(Value::Bool(true));
    core.option_mut("Softness").unwrap().set(Value::f(0.25));

    assert!(stack.build(&reg, &mut scene).all_ok());
    let handle = "L_Arm_blend_ikh".to_string();
    assert_eq!(
        scene.get_attr(&handle, "softness").unwrap(),
        Value::Float(0.25)
    );
}

#[test]
fn rebuilding_a_limb_does_not_accumulate_nodes() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    let (mut stack, _) = two_bone_stack(&mut scene, &reg);

    assert!(stack.build(&reg, &mut scene).all_ok());
    let count = scene.node_count();
    assert!(stack.build(&reg, &mut scene).all_ok());
    assert_eq!(scene.node_count(), count);
}

#[test]
fn twister_redeclares_outputs_from_count() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    rigforge_test_fixtures::joint_chain(
        &mut scene,
        &["seg_root", "seg_tip"],
        &[[0.0, 0.0, 0.0], [4.0, 0.0, 0.0]],
    )
    .unwrap();

    let mut stack = Stack::new(Config::default());
    let at = stack
        .add(&reg, "Augment : Twister", Some("roll".to_string()), None)
        .unwrap();
    let core = stack.component_mut(at).unwrap().core_mut();
    core.input_mut("Root").unwrap().set(Value::node("seg_root"));
    core.input_mut("Tip").unwrap().set(Value::node("seg_tip"));
    core.option_mut("Count").unwrap().set(Value::f(3.0));

    let report = stack.build(&reg, &mut scene);
    assert!(report.all_ok(), "{report:?}");

    let core = stack.component(at).unwrap().core();
    for i in 0..3 {
        let joint = core
            .output(&format!("Twist {i}"))
            .unwrap()
            .value()
            .as_node()
            .unwrap()
            .to_string();
        assert!(scene.exists(&joint));
        // roll weight grows along the segment
        let pos = mat4_translation(&scene.world_matrix(&joint).unwrap());
        assert!((pos[0] - (i + 1) as f32).abs() < 1e-3);
    }
    assert!(core.output("Twist 3").is_none());

    // shrinking the count drops the stale outputs on the next build
    let core = stack.component_mut(at).unwrap().core_mut();
    core.option_mut("Count").unwrap().set(Value::f(1.0));
    assert!(stack.build(&reg, &mut scene).all_ok());
    let core = stack.component(at).unwrap().core();
    assert!(core.output("Twist 0").is_some());
    assert!(core.output("Twist 1").is_none());
}

#[test]
fn arm_parents_under_the_root_component() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    three_joint_chain(&mut scene).unwrap();

    let mut stack = Stack::new(Config::default());
    let root_at = stack
        .add(&reg, "Standard : Root", Some("main".to_string()), None)
        .unwrap();
    stack
        .component_mut(root_at)
        .unwrap()
        .core_mut()
        .input_mut("Name")
        .unwrap()
        .set(Value::text("Main"));

    let arm_at = stack
        .add(&reg, "Standard : Arm", Some("left arm".to_string()), None)
        .unwrap();
    let core = stack.component_mut(arm_at).unwrap().core_mut();
    core.input_mut("Root Joint").unwrap().set(Value::node("upper"));
    core.input_mut("Tip Joint").unwrap().set(Value::node("tip"));
    core.input_mut("Name").unwrap().set(Value::text("Arm"));
    core.option_mut("Location").unwrap().set(Value::text("Left"));
    core.input_mut("Parent")
        .unwrap()
        .set_address("0.Root".parse().unwrap());

    let report = stack.build(&reg, &mut scene);
    assert!(report.all_ok(), "{report:?}");

    let root_ctl = "M_Main_root_ctl".to_string();
    assert!(scene.exists(&root_ctl));
    assert_eq!(
        scene.parent(&"L_Arm_settings".to_string()).unwrap(),
        Some(root_ctl.clone())
    );
    assert_eq!(
        scene.parent(&"L_Arm_blend_ik0".to_string()).unwrap(),
        Some(root_ctl)
    );

    // twist joints ride the blended chain
    assert!(scene.exists(&"L_Arm_blend_nk0_twist0".to_string()));
    assert!(scene.exists(&"L_Arm_blend_nk1_twist1".to_string()));

    // outputs expose the IK control and settings host
    let core = stack.component(arm_at).unwrap().core();
    assert_eq!(
        core.output("Ik Control").unwrap().value(),
        Value::node("L_Arm_blend_ik_ctl")
    );
    assert_eq!(
        core.output("Settings").unwrap().value(),
        Value::node("L_Arm_settings")
    );
}

#[test]
fn build_skeleton_seeds_inputs_from_selection() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    three_joint_chain(&mut scene).unwrap();

    let mut stack = Stack::new(Config::default());
    let at = stack
        .add(&reg, "Standard : Two Bone IK", None, None)
        .unwrap();

    // empty selection is rejected
    assert!(stack
        .call_user_function(at, "build_skeleton", &reg, &mut scene, &[])
        .is_err());

    let selection = vec!["upper".to_string(), "lower".to_string(), "tip".to_string()];
    stack
        .call_user_function(at, "build_skeleton", &reg, &mut scene, &selection)
        .unwrap();
    let core = stack.component(at).unwrap().core();
    assert_eq!(
        core.input("Root Joint").unwrap().value(),
        Value::node("upper")
    );
    assert_eq!(core.input("Tip Joint").unwrap().value(), Value::node("tip"));
}

#[test]
fn wrong_chain_length_fails_cleanly() {
    let reg = registry();
    let mut scene = MemoryScene::new();
    rigforge_test_fixtures::joint_chain(
        &mut scene,
        &["a", "b"],
        &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
    )
    .unwrap();

    let mut stack = Stack::new(Config::default());
    let at = stack
        .add(&reg, "Standard : Two Bone IK", None, None)
        .unwrap();
    let core = stack.component_mut(at).unwrap().core_mut();
    core.input_mut("Root Joint").unwrap().set(Value::node("a"));
    core.input_mut("Tip Joint").unwrap().set(Value::node("b"));
    core.input_mut("Name").unwrap().set(Value::text("Stub"));

    let report = stack.build(&reg, &mut scene);
    match report.status(at).unwrap() {
        BuildStatus::Failed { error } => {
            assert!(error.contains("three joint chain"), "{error}")
        }
        other => panic!("expected failure, got {other:?}"),
    }
}
