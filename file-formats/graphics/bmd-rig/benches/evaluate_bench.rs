use std::sync::Arc;

use bmd_rig::{
    Action, AttachmentLink, Composite, InstanceArena, KeyframeTrack, ModelInstance, RiggedModel,
};
use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Quat, Vec3};

/// Chain of `bones` bones swinging through `frames` keys
fn create_test_model(bones: usize, frames: usize) -> Arc<RiggedModel> {
    let mut builder = RiggedModel::builder("bench").bone("root", None);
    for i in 1..bones {
        builder = builder.bone(format!("bone{i}"), Some(i - 1));
    }
    let tracks = (0..bones)
        .map(|b| {
            KeyframeTrack::new(
                (0..frames)
                    .map(|k| Quat::from_rotation_z((k + b) as f32 * 0.1))
                    .collect(),
                (0..frames).map(|k| Vec3::new(0.0, 0.1 * k as f32, 1.0)).collect(),
            )
        })
        .collect();
    Arc::new(builder.action(Action::new(frames, 25.0), tracks).build())
}

fn bench_instance_update(c: &mut Criterion) {
    let model = create_test_model(48, 30);
    let mut instance = ModelInstance::from_model("bench", model).unwrap();

    c.bench_function("instance_update_48_bones", |b| {
        b.iter(|| instance.update(1.0 / 60.0))
    });
}

fn bench_arena_update(c: &mut Criterion) {
    let body = create_test_model(48, 30);
    let part = create_test_model(4, 10);

    let mut arena = InstanceArena::new();
    for _ in 0..16 {
        let mut avatar =
            Composite::spawn(&mut arena, ModelInstance::from_model("body", Arc::clone(&body)).unwrap());
        for (name, link) in [
            ("helm", AttachmentLink::Mirror),
            ("armor", AttachmentLink::Mirror),
            ("wings", AttachmentLink::Socket(20)),
        ] {
            let instance = ModelInstance::from_model(name, Arc::clone(&part)).unwrap();
            avatar.set_part(&mut arena, name, instance, link).unwrap();
        }
    }

    c.bench_function("arena_update_16_avatars", |b| {
        b.iter(|| arena.update_all(1.0 / 60.0))
    });
}

criterion_group!(benches, bench_instance_update, bench_arena_update);
criterion_main!(benches);
