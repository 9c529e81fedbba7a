use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use log::info;

use ossature::{
    animation::{
        import::{build_skeleton, BoneInfo, BoneInfoMap, SourceAnimation, SourceChannel, SourceNode},
        ClipLibrary, Keyframe,
    },
    config::EngineConfig,
    job_system::WorkerPool,
    math::{Aabb, Transform},
    renderer::{DebugDraw, HeadlessContext, InstanceBatch, MaterialId, MeshVertex},
    sim::{AnimatedMesh, AnimationSystem},
};

const BONES: usize = 4;
const MESHES: usize = 8;

/// A vertical chain of bones one unit apart under a helper root node.
fn bone_chain() -> (SourceNode, BoneInfoMap) {
    let mut bones = BoneInfoMap::new();
    let mut node: Option<SourceNode> = None;
    for i in (0..BONES).rev() {
        let name = format!("bone_{i}");
        bones.insert(
            name.clone(),
            BoneInfo {
                index: i as u32,
                offset: Mat4::from_translation(Vec3::new(0.0, -(i as f32), 0.0)),
            },
        );
        node = Some(SourceNode {
            name,
            transform: if i == 0 { Mat4::IDENTITY } else { Mat4::from_translation(Vec3::Y) },
            children: node.into_iter().collect(),
        });
    }
    let root = SourceNode {
        name: "Armature".to_string(),
        transform: Mat4::IDENTITY,
        children: node.into_iter().collect(),
    };
    (root, bones)
}

fn sway() -> SourceAnimation {
    let channels = (0..BONES)
        .map(|i| {
            let rest = if i == 0 { Vec3::ZERO } else { Vec3::Y };
            SourceChannel {
                bone: format!("bone_{i}"),
                positions: vec![Keyframe::new(0.0, rest)],
                rotations: vec![
                    Keyframe::new(0.0, Quat::from_rotation_z(-0.3)),
                    Keyframe::new(30.0, Quat::from_rotation_z(0.3)),
                    Keyframe::new(60.0, Quat::from_rotation_z(-0.3)),
                ],
            }
        })
        .collect();
    SourceAnimation {
        name: "sway".to_string(),
        duration: 60.0,
        // falls back to the configured rate
        ticks_per_second: 0.0,
        channels,
    }
}

fn quad() -> ([MeshVertex; 4], [u32; 6]) {
    (
        [
            MeshVertex::new(Vec3::new(-0.5, 0.0, -0.5), Vec3::Y, [0.0, 0.0]),
            MeshVertex::new(Vec3::new(0.5, 0.0, -0.5), Vec3::Y, [1.0, 0.0]),
            MeshVertex::new(Vec3::new(0.5, 0.0, 0.5), Vec3::Y, [1.0, 1.0]),
            MeshVertex::new(Vec3::new(-0.5, 0.0, 0.5), Vec3::Y, [0.0, 1.0]),
        ],
        [0, 2, 1, 0, 3, 2],
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let frames: u32 = args.next().map(|s| s.parse::<u32>()).transpose()?.unwrap_or(120);

    let (root, bones) = bone_chain();
    let skeleton = Arc::new(build_skeleton(&root, &bones)?);
    let clips = Arc::new(ClipLibrary::from_sources(
        &[sway()],
        config.animation.default_ticks_per_second,
    )?);

    let pool = WorkerPool::new(config.animation.worker_threads)?;
    let mut animation = AnimationSystem::new();
    let mut placements = Vec::with_capacity(MESHES);
    for i in 0..MESHES {
        let mut mesh = AnimatedMesh::new(skeleton.clone(), clips.clone(), "sway");
        mesh.animator.speed = 1.0 + i as f32 * 0.25;
        let id = animation.spawn(mesh);
        placements.push((id, Transform::from_translation(Vec3::new(i as f32 * 3.0, 0.0, 0.0)).to_matrix()));
    }

    let (quad_vertices, quad_indices) = quad();
    let mut floor = InstanceBatch::<MeshVertex>::for_mesh("floor", 4, 6, &config.batching).with_clear_post_draw(false);
    for x in 0..MESHES {
        for z in 0..3 {
            let tile = Transform {
                t: Vec3::new(x as f32 * 3.0, 0.0, z as f32 - 1.0),
                s: Vec3::splat(3.0),
                ..Transform::IDENTITY
            };
            floor.queue_draw(&quad_vertices, &quad_indices, &tile.to_matrix(), &0);
        }
    }
    let mut markers = InstanceBatch::<MeshVertex>::for_mesh("markers", 4, 6, &config.batching);
    let mut debug = DebugDraw::new(&config.debug_draw);
    let mut ctx = HeadlessContext::new();

    let view_projection = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0)
        * Mat4::look_at_rh(Vec3::new(10.0, 8.0, 20.0), Vec3::new(10.0, 2.0, 0.0), Vec3::Y);
    let dt = 1.0 / 60.0;
    let mut draws = 0;
    let mut bounds = Aabb::EMPTY;

    for frame in 0..frames {
        ctx.begin_frame();

        let pending = animation.update(dt, &pool)?;
        pending.join()?;
        animation.submit_skinning(&mut ctx);

        for (id, placement) in &placements {
            let Some(mesh) = animation.get(*id) else { continue };
            let joints: Vec<Vec3> = mesh
                .pose()
                .matrices()
                .iter()
                .enumerate()
                .map(|(i, m)| m.transform_point3(Vec3::Y * i as f32))
                .collect();
            for pair in joints.windows(2) {
                debug.line(
                    placement.transform_point3(pair[0]),
                    placement.transform_point3(pair[1]),
                    [1.0, 1.0, 0.0, 1.0],
                );
            }
            let local = Aabb::from_points(&joints);
            debug.aabb(&local, placement, [0.0, 1.0, 0.0, 1.0]);
            bounds = bounds.union(&local.transformed(placement));
            if let Some(tip) = joints.last() {
                let marker = *placement * Mat4::from_translation(*tip) * Mat4::from_scale(Vec3::splat(0.25));
                markers.queue_draw(&quad_vertices, &quad_indices, &marker, &1);
            }
        }

        floor.draw_triangles(&mut ctx, &view_projection, MaterialId(0));
        markers.draw_triangles(&mut ctx, &view_projection, MaterialId(1));
        debug.flush(&mut ctx, &view_projection);
        draws += ctx.draws().len();

        if frame % 30 == 0 {
            info!(
                "frame {frame}: {} draws, {} palette matrices",
                ctx.draws().len(),
                ctx.palette().len()
            );
        }
    }

    info!(
        "{frames} frames, {draws} draws, {} buffers created, {} bytes uploaded, floor expanded {} times",
        ctx.buffers_created(),
        ctx.bytes_written(),
        floor.expansion_count()
    );
    if !bounds.is_empty() {
        info!(
            "skeletons swept a box centred at {} spanning {}",
            bounds.center(),
            bounds.extents()
        );
    }
    Ok(())
}
