//! 链模拟演示
//!
//! 在内存场景图中搭一条下垂的链，让根节点左右摆动，输出末端位置。
//!
//! 运行: cargo run --features demo --bin chain_demo

use glam::{Quat, Vec2, Vec3};
use jiggle_engine::animation::shared;
use jiggle_engine::{
    BatchScheduler, BezierCurve, Bound, ChainConfig, ColliderHandle, JiggleBone, KeyframeCurve, NodeSet,
    NodeTransform, SceneGraph, SphereCollider,
};

const FRAME_COUNT: usize = 240;
const DELTA_TIME: f32 = 1.0 / 60.0;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut scene = NodeSet::new();
    let root = scene.add_node("hair_root", None, NodeTransform::from_translation(Vec3::new(0.0, 2.0, 0.0)));
    let mut tip = root;
    for i in 1..8 {
        tip = scene.add_node(
            format!("hair_{}", i),
            Some(tip),
            NodeTransform::from_translation(Vec3::new(0.0, -0.15, 0.0)),
        );
    }
    let head = scene.add_node("head", None, NodeTransform::from_translation(Vec3::new(0.0, 1.4, 0.15)));

    let collider = ColliderHandle::new(SphereCollider::new(Vec3::ZERO, 0.2, Bound::Outside), Some(head));

    let mut config = ChainConfig {
        gravity: Vec3::new(0.0, -0.002, 0.0),
        force: Vec3::new(0.0005, 0.0, 0.0),
        damping: 0.15,
        elasticity: 0.05,
        stiffness: 0.2,
        radius: 0.03,
        colliders: vec![collider],
        ..ChainConfig::with_root(root)
    };
    // 越靠近末端越柔软
    config.curves.stiffness = Some(shared(KeyframeCurve::linear(1.0, 0.2)));
    // 末端阻尼缓入
    config.curves.damping = Some(shared(BezierCurve::new(Vec2::new(0.42, 0.0), Vec2::new(0.58, 1.0), 32)));

    let bone = JiggleBone::build(&scene, &config);
    let mut scheduler = BatchScheduler::new();
    scheduler.add_bone(&bone);

    for frame in 0..FRAME_COUNT {
        scheduler.restore_rest_pose(&mut scene);

        // 动画：根节点左右摆动
        let t = frame as f32 * DELTA_TIME;
        let sway = Vec3::new((t * 3.0).sin() * 0.3, 2.0, 0.0);
        scene.set_local_pose(root, sway, Quat::from_rotation_z((t * 3.0).cos() * 0.2));

        scheduler.tick(&mut scene, DELTA_TIME);

        if frame % 20 == 0 {
            let (position, _) = scene.world_pose(tip).unwrap_or_default();
            log::info!(
                "帧 {:>3}: 末端 ({:+.3}, {:+.3}, {:+.3})",
                frame,
                position.x,
                position.y,
                position.z
            );
        }
    }

    log::info!(
        "完成: {} 条链, {} 个质点, {} 帧",
        scheduler.chain_count(),
        scheduler.particle_count(),
        scheduler.frame()
    );
}
