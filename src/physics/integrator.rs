//! 积分器 - 每帧流水线的纯计算核
//!
//! 流水线阶段（由调度器按顺序调用，每阶段之间是屏障）：
//! 1. 读取头部运动学（scene_sync）
//! 2. prepare_head: 头部位移、时间系数与最终受力
//! 3. compute_ideal_pose: 沿父子关系合成动画驱动的理想姿态（链内顺序）
//! 4. advance_particle: Verlet 位置推进（每质点独立）
//! 5. project_constraints: 弹性 / 刚性 / 碰撞 / 长度约束（链内顺序）
//! 6. resolve_rotations + 写回（scene_sync）

use glam::{Quat, Vec3};

use super::chain::HeadState;
use super::collider::ColliderHandle;
use super::config::clamp01;
use super::particle::Particle;

/// 阶段 2：计算头部位移与本帧受力
pub fn prepare_head(head: &mut HeadState, delta_time: f32) {
    head.displacement = head.position - head.prev_position;
    head.prev_position = head.position;

    head.time_var = if head.update_rate > 0.0 {
        delta_time * head.update_rate
    } else {
        1.0
    };

    // 去掉静止姿态已经包含的重力分量
    head.rest_gravity = head.rotation * head.local_gravity;
    let fdir = head.gravity.normalize_or_zero();
    let pf = fdir * head.rest_gravity.dot(fdir).max(0.0);
    let gravity = head.gravity - pf;

    let scale = head.object_scale * head.time_var;
    head.final_gravity = gravity * scale;
    head.final_force = head.force * scale;
}

/// 阶段 3：合成理想（纯动画）世界姿态
///
/// 父索引总小于自身索引，按索引顺序遍历即可保证父先于子。
pub fn compute_ideal_pose(head: &HeadState, particles: &mut [Particle]) {
    for i in 0..particles.len() {
        let (position, rotation) = match particles[i].parent_id() {
            None => (head.position, head.rotation),
            Some(parent_idx) => {
                let parent = &particles[parent_idx];
                let p = &particles[i];
                (
                    parent.ideal_local_to_world.transform_point3(p.local_position),
                    parent.ideal_rotation * p.local_rotation,
                )
            }
        };

        let p = &mut particles[i];
        p.ideal_position = position;
        p.ideal_rotation = rotation;
        p.ideal_local_to_world = p.compute_ideal_matrix();
    }
}

/// 阶段 4：Verlet 位置推进
///
/// 根质点由动画驱动，只对齐理想位置。
pub fn advance_particle(head: &HeadState, p: &mut Particle) {
    if p.is_root() {
        p.prev_position = p.position;
        p.position = p.ideal_position;
        return;
    }

    let v = p.position - p.prev_position;
    let rmove = head.displacement * p.inertia;
    p.prev_position = p.position + rmove;

    let mut damping = p.damping;
    if p.is_colliding {
        damping = clamp01(damping + p.friction);
        p.is_colliding = false;
    }

    // x(t+Δt) = x(t) + v·(1-阻尼) + 合力 + 惯性位移，质量视为 1
    let force = head.final_gravity + head.final_force * p.force_scale;
    p.position += v * (1.0 - damping) + force + rmove;
}

/// 阶段 5：约束投影
///
/// 顺序：弹性拉回 → 刚性限制 → 碰撞 → 长度修正。
/// 长度修正最后执行并覆盖前面的误差，保证骨骼不拉伸。
pub fn project_constraints(head: &HeadState, particles: &mut [Particle], colliders: &[ColliderHandle]) {
    let stiffness_weight = head.weight;
    let object_scale = head.object_scale;

    for i in 0..particles.len() {
        let parent_idx = match particles[i].parent_id() {
            Some(idx) => idx,
            None => continue,
        };
        let parent_position = particles[parent_idx].position;
        let parent_ideal_position = particles[parent_idx].ideal_position;
        let mut parent_matrix = particles[parent_idx].ideal_local_to_world;

        let p = &mut particles[i];
        let rest_len = parent_ideal_position.distance(p.ideal_position);

        let stiffness = 1.0 + (p.stiffness - 1.0) * stiffness_weight;
        if stiffness > 0.0 || p.elasticity > 0.0 {
            // 静止位置：父节点理想矩阵，平移替换为父质点模拟位置
            parent_matrix.w_axis = parent_position.extend(1.0);
            let rest_pos = parent_matrix.transform_point3(p.local_position);

            let d = rest_pos - p.position;
            p.position += d * (p.elasticity * head.time_var);

            if stiffness > 0.0 {
                let d = rest_pos - p.position;
                let len = d.length();
                let max_len = rest_len * (1.0 - stiffness) * 2.0;
                if len > max_len {
                    p.position += d * ((len - max_len) / len);
                }
            }
        }

        if !colliders.is_empty() {
            let radius = p.radius * object_scale;
            for collider in colliders.iter().filter(|c| c.is_enabled()) {
                p.is_colliding |= collider.collide(&mut p.position, radius);
            }
        }

        // 长度约束
        let dd = parent_position - p.position;
        let leng = dd.length();
        if leng > 0.0 {
            p.position += dd * ((leng - rest_len) / leng);
        }
    }
}

/// 阶段 6 前：计算写回旋转
///
/// 只有一个子质点的父节点跟随子质点方向旋转，其余保持理想旋转。
pub fn resolve_rotations(particles: &mut [Particle]) {
    for p in particles.iter_mut() {
        p.resolved_rotation = p.ideal_rotation;
    }

    for i in 0..particles.len() {
        let parent_idx = match particles[i].parent_id() {
            Some(idx) => idx,
            None => continue,
        };
        let parent = &particles[parent_idx];
        if parent.child_count != 1 {
            continue;
        }

        let p = &particles[i];
        let v0 = parent
            .ideal_local_to_world
            .transform_vector3(p.local_position)
            .normalize_or_zero();
        let v1 = (p.position - parent.position).normalize_or_zero();
        if v0 == Vec3::ZERO || v1 == Vec3::ZERO {
            continue;
        }

        let rotation = (Quat::from_rotation_arc(v0, v1) * parent.ideal_rotation).normalize();
        particles[parent_idx].resolved_rotation = rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::chain::{Chain, ChainBuilder};
    use crate::physics::collider::{Bound, SphereCollider};
    use crate::physics::config::ChainConfig;
    use crate::skeleton::{NodeSet, NodeTransform};

    const DT: f32 = 1.0 / 60.0;

    fn hanging_chain(len: usize, config: ChainConfig) -> Chain {
        let mut scene = NodeSet::new();
        let root = scene.add_node("b0", None, NodeTransform::from_translation(Vec3::new(0.0, 5.0, 0.0)));
        let mut parent = root;
        for i in 1..len {
            parent = scene.add_node(
                format!("b{}", i),
                Some(parent),
                NodeTransform::from_translation(Vec3::new(0.5, 0.0, 0.0)),
            );
        }
        let mut chain = ChainBuilder::new(&scene, &[]).build(root).unwrap();
        chain.apply_config(&ChainConfig {
            roots: vec![root],
            ..config
        });
        chain
    }

    fn step(chain: &mut Chain) {
        prepare_head(&mut chain.head, DT);
        compute_ideal_pose(&chain.head, &mut chain.particles);
        for p in chain.particles.iter_mut() {
            advance_particle(&chain.head, p);
        }
        project_constraints(&chain.head, &mut chain.particles, &chain.colliders);
    }

    fn assert_rigid(chain: &Chain) {
        for p in chain.particles.iter().skip(1) {
            let parent = &chain.particles[p.parent_index as usize];
            let rest = parent.ideal_position.distance(p.ideal_position);
            let dist = parent.position.distance(p.position);
            assert!((dist - rest).abs() < 1e-5, "dist {} rest {}", dist, rest);
        }
    }

    #[test]
    fn test_prepare_head_time_var() {
        let mut chain = hanging_chain(2, ChainConfig::default());
        prepare_head(&mut chain.head, 0.5);
        assert!((chain.head.time_var - 30.0).abs() < 1e-5);

        chain.head.update_rate = 0.0;
        prepare_head(&mut chain.head, 0.5);
        assert_eq!(chain.head.time_var, 1.0);
    }

    #[test]
    fn test_rest_gravity_removed() {
        let mut chain = hanging_chain(3, ChainConfig {
            gravity: Vec3::new(0.0, -0.01, 0.0),
            ..Default::default()
        });
        prepare_head(&mut chain.head, DT);
        // 根未旋转：静止姿态已包含全部重力
        assert!(chain.head.final_gravity.length() < 1e-7);

        // 根翻转后重力重新生效
        chain.head.rotation = Quat::from_rotation_z(std::f32::consts::PI);
        prepare_head(&mut chain.head, DT);
        assert!((chain.head.final_gravity - Vec3::new(0.0, -0.01, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_root_follows_ideal() {
        let mut chain = hanging_chain(3, ChainConfig::default());
        chain.head.position = Vec3::new(1.0, 5.0, 0.0);
        step(&mut chain);
        assert!((chain.particles[0].position - Vec3::new(1.0, 5.0, 0.0)).length() < 1e-6);
        assert!((chain.particles[0].prev_position - Vec3::new(0.0, 5.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_rigidity_under_forces() {
        let mut chain = hanging_chain(6, ChainConfig {
            force: Vec3::new(0.0, -0.05, 0.02),
            damping: 0.05,
            elasticity: 0.02,
            stiffness: 0.0,
            ..Default::default()
        });
        for frame in 0..120 {
            let t = frame as f32 * 0.1;
            chain.head.position = Vec3::new(t.sin(), 5.0 + 0.3 * t.cos(), 0.0);
            chain.head.rotation = Quat::from_rotation_y(t * 0.2);
            step(&mut chain);
            assert_rigid(&chain);
        }
        // 外力使链下垂
        let tip = chain.particles.last().unwrap();
        assert!(tip.position.y < tip.ideal_position.y);
    }

    #[test]
    fn test_zero_force_no_drift() {
        let mut chain = hanging_chain(5, ChainConfig {
            damping: 1.0,
            ..Default::default()
        });
        for _ in 0..200 {
            step(&mut chain);
        }
        for p in &chain.particles {
            assert!((p.position - p.ideal_position).length() < 1e-5);
        }
    }

    #[test]
    fn test_zero_force_converges_to_rest() {
        let mut chain = hanging_chain(4, ChainConfig {
            damping: 1.0,
            elasticity: 0.2,
            stiffness: 0.0,
            ..Default::default()
        });
        // 扰动末端
        let last = chain.particles.len() - 1;
        chain.particles[last].position += Vec3::new(0.0, -0.3, 0.2);
        chain.particles[last].prev_position = chain.particles[last].position;

        for _ in 0..400 {
            step(&mut chain);
        }
        for p in &chain.particles {
            assert!((p.position - p.ideal_position).length() < 1e-3);
        }
    }

    #[test]
    fn test_full_stiffness_holds_pose() {
        let mut chain = hanging_chain(4, ChainConfig {
            force: Vec3::new(0.0, -0.2, 0.0),
            damping: 0.0,
            elasticity: 0.0,
            stiffness: 1.0,
            ..Default::default()
        });
        for _ in 0..30 {
            step(&mut chain);
        }
        for p in &chain.particles {
            assert!((p.position - p.ideal_position).length() < 1e-4);
        }
    }

    #[test]
    fn test_inertia_drags_particles() {
        let mut chain = hanging_chain(3, ChainConfig {
            inertia: 0.0,
            damping: 0.0,
            elasticity: 0.0,
            stiffness: 0.0,
            ..Default::default()
        });
        step(&mut chain);
        chain.head.position += Vec3::new(0.0, 0.0, 1.0);
        step(&mut chain);
        // 惯性为 0 时末端滞后于理想位置
        let tip = chain.particles.last().unwrap();
        assert!(tip.position.z < tip.ideal_position.z - 0.1);

        let mut follow = hanging_chain(3, ChainConfig {
            inertia: 1.0,
            damping: 0.0,
            elasticity: 0.0,
            stiffness: 0.0,
            ..Default::default()
        });
        step(&mut follow);
        follow.head.position += Vec3::new(0.0, 0.0, 1.0);
        step(&mut follow);
        let tip = follow.particles.last().unwrap();
        assert!((tip.position - tip.ideal_position).length() < 1e-4);
    }

    #[test]
    fn test_collision_sets_flag_and_friction_consumed() {
        let collider = ColliderHandle::new(
            SphereCollider::new(Vec3::new(1.0, 5.0, 0.0), 0.2, Bound::Outside),
            None,
        );
        collider.prepare(&crate::physics::FrameContext::new(1), &NodeSet::new());
        let mut chain = hanging_chain(3, ChainConfig {
            colliders: vec![collider],
            friction: 0.5,
            ..Default::default()
        });
        // 末端 (1,5,0) 恰好在球心：给一点偏移让其被推出
        chain.particles[2].position += Vec3::new(0.0, 0.05, 0.0);
        chain.particles[2].prev_position = chain.particles[2].position;
        step(&mut chain);
        assert!(chain.particles[2].is_colliding);

        // 下一帧推进时消耗碰撞标志
        compute_ideal_pose(&chain.head, &mut chain.particles);
        let head = chain.head;
        advance_particle(&head, &mut chain.particles[2]);
        assert!(!chain.particles[2].is_colliding);
    }

    #[test]
    fn test_resolve_rotation_follows_child() {
        let mut chain = hanging_chain(2, ChainConfig::default());
        compute_ideal_pose(&chain.head, &mut chain.particles);
        // 子质点从 +X 方向摆到 -Y 方向
        chain.particles[1].position = chain.particles[0].position + Vec3::new(0.0, -0.5, 0.0);
        resolve_rotations(&mut chain.particles);

        let r = chain.particles[0].resolved_rotation;
        let dir = r * Vec3::X;
        assert!((dir - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-5);
        assert_eq!(chain.particles[1].resolved_rotation, chain.particles[1].ideal_rotation);
    }

    #[test]
    fn test_force_scale_gates_external_force() {
        let mut chain = hanging_chain(3, ChainConfig {
            force: Vec3::new(0.0, -0.01, 0.0),
            damping: 1.0,
            inertia: 0.0,
            ..Default::default()
        });
        chain.particles[1].force_scale = 1.0;
        chain.particles[2].force_scale = 0.0;
        let before: Vec<Vec3> = chain.particles.iter().map(|p| p.position).collect();

        prepare_head(&mut chain.head, DT);
        compute_ideal_pose(&chain.head, &mut chain.particles);
        for p in chain.particles.iter_mut() {
            advance_particle(&chain.head, p);
        }

        assert!(chain.head.final_force.length() > 1e-3);
        let moved = chain.particles[1].position - before[1];
        assert!((moved - chain.head.final_force).length() < 1e-6);
        assert!((chain.particles[2].position - before[2]).length() < 1e-7);
    }
}
