//! The blend and twist builders against the in-memory scene.

use rigforge_api_core::math::{mat4_decompose, mat4_from_trs, mat4_translation, quat_dot};
use rigforge_api_core::{Scene, Value};
use rigforge_mechanics_core::{build_blend, build_twist, BlendSpec, TwistSpec};
use rigforge_test_fixtures::{joint_chain, three_joint_chain, MemoryScene};

#[test]
fn blend_replicates_the_chain_three_times() {
    let mut scene = MemoryScene::new();
    let chain = three_joint_chain(&mut scene).unwrap();
    let settings = scene.create_node("transform", "settings").unwrap();

    let spec = BlendSpec::new(chain.clone(), settings.clone(), "arm");
    let unit = build_blend(&mut scene, &spec).unwrap();

    assert_eq!(unit.ik_chain.len(), 3);
    assert_eq!(unit.fk_chain.len(), 3);
    assert_eq!(unit.nk_chain.len(), 3);
    assert!(unit.ik_handle.is_some());
    assert!(unit.pole_control.is_some());
    assert_eq!(unit.fk_controls.len(), 3);

    // replicas start on the source joints
    for (src, rep) in chain.iter().zip(&unit.nk_chain) {
        let a = mat4_translation(&scene.world_matrix(src).unwrap());
        let b = mat4_translation(&scene.world_matrix(rep).unwrap());
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < 1e-3);
        }
    }

    // blend attr lands on the settings node with the caller's default
    assert_eq!(
        scene.get_attr(&settings, "ik_fk").unwrap(),
        Value::Float(0.0)
    );
    assert_eq!(
        scene.get_attr(&settings, "show_ik").unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn nk_follows_fk_when_blend_is_one() {
    let mut scene = MemoryScene::new();
    let chain = three_joint_chain(&mut scene).unwrap();
    let settings = scene.create_node("transform", "settings").unwrap();
    let unit = build_blend(&mut scene, &BlendSpec::new(chain, settings.clone(), "arm")).unwrap();

    let q = rigforge_api_core::math::quat_from_axis_angle([0.0, 1.0, 0.0], 1.2);
    let ctl = &unit.fk_controls[0];
    let pos = mat4_translation(&scene.world_matrix(ctl).unwrap());
    scene
        .set_world_matrix(ctl, mat4_from_trs(pos, q, [1.0; 3]))
        .unwrap();

    scene
        .set_attr(&settings, "ik_fk", Value::Float(1.0))
        .unwrap();
    let (_, rot, _) = mat4_decompose(&scene.world_matrix(&unit.nk_chain[0]).unwrap());
    assert!(quat_dot(rot, q).abs() > 1.0 - 1e-3);
}

#[test]
fn short_chains_are_rejected() {
    let mut scene = MemoryScene::new();
    let only = scene.create_node("joint", "only").unwrap();
    let settings = scene.create_node("transform", "settings").unwrap();
    let err = build_blend(&mut scene, &BlendSpec::new(vec![only], settings, "stub")).unwrap_err();
    assert!(err.to_string().contains("chain too short"), "{err}");
}

#[test]
fn twist_constraints_carry_param_weights() {
    let mut scene = MemoryScene::new();
    let ends = joint_chain(
        &mut scene,
        &["seg_root", "seg_tip"],
        &[[0.0, 0.0, 0.0], [4.0, 0.0, 0.0]],
    )
    .unwrap();
    let roll = joint_chain(&mut scene, &["roll"], &[[1.0, 0.0, 0.0]]).unwrap();

    let unit = build_twist(
        &mut scene,
        &TwistSpec {
            root: ends[0].clone(),
            tip: ends[1].clone(),
            joints: roll.clone(),
        },
    )
    .unwrap();

    assert_eq!(unit.params, vec![0.25]);
    let constraint = &unit.created[0];
    assert_eq!(
        scene.get_attr(constraint, "w0").unwrap(),
        Value::Float(0.75)
    );
    assert_eq!(
        scene.get_attr(constraint, "w1").unwrap(),
        Value::Float(0.25)
    );
}
