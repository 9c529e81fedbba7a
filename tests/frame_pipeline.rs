use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use ossature::{
    animation::{
        import::{build_skeleton, BoneInfo, BoneInfoMap, SourceAnimation, SourceChannel, SourceNode},
        ClipLibrary, Keyframe,
    },
    config::EngineConfig,
    job_system::WorkerPool,
    renderer::{HeadlessContext, InstanceBatch, MaterialId, MeshVertex, Primitive, VertexKind},
    sim::{AnimatedMesh, AnimationSystem},
};
use pretty_assertions::assert_eq;

fn arm() -> (SourceNode, BoneInfoMap) {
    let root = SourceNode {
        name: "Armature".to_string(),
        transform: Mat4::IDENTITY,
        children: vec![SourceNode {
            name: "upper".to_string(),
            transform: Mat4::IDENTITY,
            children: vec![SourceNode {
                name: "lower".to_string(),
                transform: Mat4::from_translation(Vec3::Y),
                children: vec![],
            }],
        }],
    };
    let bones = BoneInfoMap::from([
        ("upper".to_string(), BoneInfo { index: 0, offset: Mat4::IDENTITY }),
        (
            "lower".to_string(),
            BoneInfo {
                index: 1,
                offset: Mat4::from_translation(-Vec3::Y),
            },
        ),
    ]);
    (root, bones)
}

fn bend() -> SourceAnimation {
    SourceAnimation {
        name: "bend".to_string(),
        duration: 2.0,
        ticks_per_second: 1.0,
        channels: vec![SourceChannel {
            bone: "upper".to_string(),
            positions: vec![],
            rotations: vec![
                Keyframe::new(0.0, Quat::IDENTITY),
                Keyframe::new(2.0, Quat::from_rotation_z(std::f32::consts::PI)),
            ],
        }],
    }
}

fn quad() -> ([MeshVertex; 4], [u32; 6]) {
    (
        [
            MeshVertex::new(Vec3::ZERO, Vec3::Z, [0.0, 0.0]),
            MeshVertex::new(Vec3::X, Vec3::Z, [1.0, 0.0]),
            MeshVertex::new(Vec3::new(1.0, 1.0, 0.0), Vec3::Z, [1.0, 1.0]),
            MeshVertex::new(Vec3::Y, Vec3::Z, [0.0, 1.0]),
        ],
        [0, 1, 2, 0, 2, 3],
    )
}

#[test]
fn poses_are_joined_before_skinning_submission() {
    let config = EngineConfig::default();
    let (root, bones) = arm();
    let skeleton = Arc::new(build_skeleton(&root, &bones).unwrap());
    let clips = Arc::new(ClipLibrary::from_sources(&[bend()], config.animation.default_ticks_per_second).unwrap());

    let pool = WorkerPool::new(config.animation.worker_threads).unwrap();
    let mut system = AnimationSystem::new();
    let id = system.spawn(AnimatedMesh::new(skeleton, clips, "bend"));
    let mut ctx = HeadlessContext::new();

    // one second into a two tick clip at one tick per second: a quarter turn
    for _ in 0..4 {
        ctx.begin_frame();
        system.update(0.25, &pool).unwrap().join().unwrap();
        system.submit_skinning(&mut ctx);
    }

    assert_eq!(ctx.palette().len(), 2);
    assert_eq!(system.get(id).unwrap().palette_offset(), Some(0));
    // the bound tip of the lower bone at (0, 2, 0) swings to (-2, 0, 0)
    let tip = ctx.palette()[1].transform_point3(Vec3::new(0.0, 2.0, 0.0));
    assert!(tip.abs_diff_eq(Vec3::new(-2.0, 0.0, 0.0), 1e-4), "tip at {tip}");
}

#[test]
fn seventeenth_instance_grows_batch_and_gpu_buffers() {
    let (vertices, indices) = quad();
    let config = EngineConfig::default();
    let mut batch = InstanceBatch::<MeshVertex>::for_mesh("tiles", 4, 6, &config.batching).with_clear_post_draw(false);
    let mut ctx = HeadlessContext::new();

    for i in 0..16 {
        batch.queue_draw(&vertices, &indices, &Mat4::from_translation(Vec3::X * i as f32), &0);
    }
    batch.draw_triangles(&mut ctx, &Mat4::IDENTITY, MaterialId(2));
    assert_eq!(ctx.buffers_created(), 2);

    batch.queue_draw(&vertices, &indices, &Mat4::from_translation(Vec3::Y), &0);
    assert_eq!(batch.expansion_count(), 1);
    assert_eq!(batch.vertex_count(), 17 * 4);
    assert!(batch.vertex_capacity() >= 17 * 4);

    ctx.begin_frame();
    batch.draw_triangles(&mut ctx, &Mat4::IDENTITY, MaterialId(2));
    assert_eq!(ctx.buffers_created(), 4);
    assert_eq!(ctx.live_buffers(), 2);

    let call = ctx.draws()[0];
    assert_eq!(call.index_count, 17 * 6);
    assert_eq!(call.primitive, Primitive::Triangles);
    assert_eq!(call.vertex_kind, VertexKind::Mesh);
    assert_eq!(call.material, MaterialId(2));
    let indices_on_gpu: Vec<u32> = ctx.read_buffer(call.index_buffer);
    assert_eq!(&indices_on_gpu[16 * 6..17 * 6], &[64, 65, 66, 64, 66, 67]);
}

#[test]
fn removed_instance_uploads_as_degenerate() {
    let (vertices, indices) = quad();
    let mut batch = InstanceBatch::<MeshVertex>::new("tiles", 8, 12).with_clear_post_draw(false);
    let mut ctx = HeadlessContext::new();
    let kept = batch.queue_draw(&vertices, &indices, &Mat4::from_translation(Vec3::Z), &1);
    let removed = batch.queue_draw(&vertices, &indices, &Mat4::from_translation(Vec3::X), &1);
    batch.draw_triangles(&mut ctx, &Mat4::IDENTITY, MaterialId(0));

    batch.remove_instance(&removed);
    ctx.begin_frame();
    batch.draw_triangles(&mut ctx, &Mat4::IDENTITY, MaterialId(0));

    let on_gpu: Vec<MeshVertex> = ctx.read_buffer(ctx.draws()[0].vertex_buffer);
    assert!(on_gpu[removed.vertex_range()].iter().all(|v| *v == MeshVertex::default()));
    assert_eq!(on_gpu[kept.start_vertex as usize].position, [0.0, 0.0, 1.0]);
}
