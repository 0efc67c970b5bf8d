//! 场景同步
//!
//! 帧开始从场景图读取头部运动学与动画本地姿态，帧末把质点位置/旋转写回。
//! 读取可在 rayon 任务中并发执行；写回只在单线程阶段调用。

use glam::{Quat, Vec3};

use crate::skeleton::SceneGraph;

use super::chain::HeadState;
use super::particle::Particle;

/// 读取根节点世界姿态与物体缩放
///
/// 根节点本地姿态仍是上一次写回的结果时，按静止本地姿态推导世界姿态；
/// 根节点已从场景中消失时保留上一帧的值。
pub fn read_head<S: SceneGraph + ?Sized>(scene: &S, head: &mut HeadState, root: &Particle) {
    let pose = match scene.local_pose(head.root) {
        Some((position, rotation)) if root.holds_written_pose(position, rotation) => {
            rest_world_pose(scene, root)
        }
        _ => scene.world_pose(head.root),
    };
    if let Some((position, rotation)) = pose {
        head.position = position;
        head.rotation = rotation;
    }
    head.object_scale = scene.world_scale(head.root).x.abs();
}

/// 静止本地姿态在当前父节点下的世界姿态
fn rest_world_pose<S: SceneGraph + ?Sized>(scene: &S, p: &Particle) -> Option<(Vec3, Quat)> {
    match scene.parent_of(p.node) {
        Some(parent) => {
            let parent_matrix = scene.local_to_world(parent)?;
            let (_, parent_rotation) = scene.world_pose(parent)?;
            Some((
                parent_matrix.transform_point3(p.init_local_position),
                parent_rotation * p.init_local_rotation,
            ))
        }
        None => Some((p.init_local_position, p.init_local_rotation)),
    }
}

/// 读取动画驱动的本地姿态（根质点由头部姿态代替，不读取）
///
/// 没有被动画覆盖的节点仍保存着上一帧的模拟结果，此时使用静止本地姿态。
pub fn read_local_poses<S: SceneGraph + ?Sized>(scene: &S, particles: &mut [Particle]) {
    for p in particles.iter_mut().filter(|p| !p.is_root()) {
        if let Some((position, rotation)) = scene.local_pose(p.node) {
            if p.holds_written_pose(position, rotation) {
                p.local_position = p.init_local_position;
                p.local_rotation = p.init_local_rotation;
            } else {
                p.local_position = position;
                p.local_rotation = rotation;
            }
        }
    }
}

/// 写回模拟结果，按索引顺序（父先于子）
///
/// 根节点只写旋转，位置保持理想位置。写回后记录节点的本地姿态。
pub fn write_back<S: SceneGraph + ?Sized>(scene: &mut S, particles: &mut [Particle]) {
    for p in particles.iter_mut() {
        let position = if p.is_root() { p.ideal_position } else { p.position };
        scene.set_world_pose(p.node, position, p.resolved_rotation);

        match scene.local_pose(p.node) {
            Some((local_position, local_rotation)) => {
                p.written_local_position = local_position;
                p.written_local_rotation = local_rotation;
                p.local_written = true;
            }
            None => p.local_written = false,
        }
    }
}

/// 把链上所有节点恢复到构建时的本地姿态
pub fn restore_rest_pose<S: SceneGraph + ?Sized>(scene: &mut S, particles: &mut [Particle]) {
    for p in particles.iter_mut() {
        p.reset_local_pose();
        scene.set_local_pose(p.node, p.local_position, p.local_rotation);
    }
}
