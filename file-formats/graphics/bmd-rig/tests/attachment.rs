//! Composite avatars: mirrored equipment and socketed parts

use std::sync::Arc;

use bmd_rig::{
    Action, AttachmentLink, Composite, InstanceArena, KeyframeTrack, MeshDesc, MeshFlags,
    ModelInstance, RiggedModel,
};
use glam::{Quat, Vec3};
use pretty_assertions::assert_eq;

/// Three-bone body: root, spine swinging around Z, back bone 2 units up
fn body() -> Arc<RiggedModel> {
    let frames = 5;
    Arc::new(
        RiggedModel::builder("body")
            .bone("root", None)
            .bone("spine", Some(0))
            .bone("back", Some(1))
            .action(
                Action::new(frames, 10.0).named("walk"),
                vec![
                    KeyframeTrack::constant(Quat::IDENTITY, Vec3::ZERO, frames),
                    KeyframeTrack::new(
                        (0..frames).map(|k| Quat::from_rotation_z(k as f32 * 0.25)).collect(),
                        vec![Vec3::new(0.0, 0.0, 1.0); frames],
                    ),
                    KeyframeTrack::constant(Quat::IDENTITY, Vec3::new(0.0, 0.0, 2.0), frames),
                ],
            )
            .action(
                Action::new(1, 1.0).named("stand"),
                vec![KeyframeTrack::constant(Quat::IDENTITY, Vec3::ZERO, 1); 3],
            )
            .mesh(MeshDesc::new("torso", MeshFlags::empty()))
            .build(),
    )
}

fn helm() -> Arc<RiggedModel> {
    Arc::new(
        RiggedModel::builder("helm")
            .bone("root", None)
            .action(Action::new(1, 1.0), vec![KeyframeTrack::constant(Quat::IDENTITY, Vec3::ZERO, 1)])
            .mesh(MeshDesc::new("helm", MeshFlags::empty()))
            .build(),
    )
}

fn wings() -> Arc<RiggedModel> {
    let frames = 3;
    Arc::new(
        RiggedModel::builder("wings")
            .bone("root", None)
            .bone("left", Some(0))
            .action(
                Action::new(frames, 5.0).named("flap"),
                vec![
                    KeyframeTrack::constant(Quat::IDENTITY, Vec3::ZERO, frames),
                    KeyframeTrack::new(
                        vec![Quat::IDENTITY, Quat::from_rotation_y(0.8), Quat::IDENTITY],
                        vec![Vec3::X; frames],
                    ),
                ],
            )
            .mesh(MeshDesc::new("feathers", MeshFlags::BLEND))
            .build(),
    )
}

fn avatar(arena: &mut InstanceArena) -> Composite {
    let body = ModelInstance::from_model("body", body()).unwrap();
    let mut avatar = Composite::spawn(arena, body);
    avatar
        .set_part(
            arena,
            "helm",
            ModelInstance::from_model("helm", helm()).unwrap(),
            AttachmentLink::Mirror,
        )
        .unwrap();
    avatar
        .set_part(
            arena,
            "wings",
            ModelInstance::from_model("wings", wings()).unwrap(),
            AttachmentLink::Socket(2),
        )
        .unwrap();
    avatar
}

#[test]
fn test_mirrored_skin_is_byte_identical() {
    let mut arena = InstanceArena::new();
    let avatar = avatar(&mut arena);
    let helm = avatar.part("helm").unwrap();

    for _ in 0..12 {
        arena.update_all(1.0 / 30.0);

        let body_buffer = arena.get(avatar.root()).unwrap().skin(0).unwrap().buffer();
        let helm_buffer = arena.get(helm).unwrap().skin(0).unwrap().buffer();
        let body_bytes: Vec<u32> = body_buffer.iter().map(|f| f.to_bits()).collect();
        let helm_bytes: Vec<u32> = helm_buffer.iter().map(|f| f.to_bits()).collect();
        assert_eq!(body_bytes, helm_bytes);
    }

    assert_eq!(
        arena.bone_matrices(helm),
        arena.bone_matrices(avatar.root())
    );
}

#[test]
fn test_mirror_follows_action_switch() {
    let mut arena = InstanceArena::new();
    let avatar = avatar(&mut arena);
    let helm = avatar.part("helm").unwrap();

    arena.update_all(0.15);
    arena.get_mut(avatar.root()).unwrap().set_action(1);
    let ticks = arena.update_all(0.1);

    let helm_tick = ticks.iter().find(|(h, _)| *h == helm).unwrap().1;
    assert!(helm_tick.dirty);
    let body = arena.get(avatar.root()).unwrap();
    let helm = arena.get(helm).unwrap();
    assert_eq!(helm.skin(0).unwrap().buffer(), body.skin(0).unwrap().buffer());
}

#[test]
fn test_socketed_wings_follow_back_bone() {
    let mut arena = InstanceArena::new();
    let avatar = avatar(&mut arena);
    let wings = avatar.part("wings").unwrap();

    arena
        .get_mut(avatar.root())
        .unwrap()
        .update_location(Vec3::new(10.0, 0.0, 0.0), 1.0, Vec3::ZERO);

    for _ in 0..7 {
        arena.update_all(0.04);

        let body = arena.get(avatar.root()).unwrap();
        let back = body.root_matrix() * body.bone_matrices()[2];
        let placement = arena.get(wings).unwrap().placement();

        assert!((placement.position - back.w_axis.truncate()).length() < 1e-4);
        assert!((placement.position.x - 10.0).abs() < 1e-4);
    }

    // Wings keep their own playback
    let wings = arena.get(wings).unwrap();
    assert!(!wings.is_mirrored());
    assert!(wings.player().now() > 0.25);
    assert_eq!(wings.skin_bindings()[0].flags, MeshFlags::BLEND);
}

#[test]
fn test_socket_on_mirrored_part_uses_body_placement() {
    let mut arena = InstanceArena::new();
    let avatar = avatar(&mut arena);
    let helm = avatar.part("helm").unwrap();
    let plume = arena.spawn(ModelInstance::from_model("plume", crate::helm()).unwrap());
    arena.attach(helm, plume, AttachmentLink::Socket(0)).unwrap();

    arena
        .get_mut(avatar.root())
        .unwrap()
        .update_location(Vec3::new(10.0, 0.0, 0.0), 1.0, Vec3::ZERO);
    arena.update_all(0.04);

    let body = arena.get(avatar.root()).unwrap();
    let root_bone = body.root_matrix() * body.bone_matrices()[0];
    let placement = arena.get(plume).unwrap().placement();
    assert!((placement.position - root_bone.w_axis.truncate()).length() < 1e-4);
    assert!((placement.position.x - 10.0).abs() < 1e-4);
}

#[test]
fn test_update_order_is_parents_first() {
    let mut arena = InstanceArena::new();
    let avatar = avatar(&mut arena);

    let order = arena.update_order().to_vec();
    assert_eq!(order[0], avatar.root());
    assert_eq!(order.len(), 3);
}

#[test]
fn test_despawn_avatar_removes_parts() {
    let mut arena = InstanceArena::new();
    let avatar = avatar(&mut arena);
    let helm = avatar.part("helm").unwrap();

    assert_eq!(avatar.despawn(&mut arena).unwrap(), 3);
    assert!(!arena.contains(helm));
    assert!(arena.update_all(0.1).is_empty());
}
