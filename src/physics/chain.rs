//! 质点链与链构建器
//!
//! 链 = 从根节点深度优先展开的质点森林，扁平存储，父索引总小于自身索引。

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3};

use crate::skeleton::{NodeId, SceneGraph};
use crate::{JiggleError, Result};

use super::collider::ColliderHandle;
use super::config::{clamp01, ChainConfig};
use super::params;
use super::particle::{Particle, MAX_PARTICLE_COUNT};

// ============================================================================
// 链标识与状态标志
// ============================================================================

static NEXT_CHAIN_ID: AtomicU64 = AtomicU64::new(1);

/// 链唯一标识（进程内唯一）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(pub u64);

impl ChainId {
    fn next() -> Self {
        ChainId(NEXT_CHAIN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

bitflags! {
    /// 链状态标志
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ChainFlags: u32 {
        /// 等待帧末移除
        const REMOVE_PENDING = 1 << 0;
        /// 权重从 0 恢复：质点对齐到动画姿态
        const RESET_PENDING = 1 << 1;
        /// 权重变为 0：把静止本地姿态写回场景
        const RESTORE_PENDING = 1 << 2;
    }
}

// ============================================================================
// 头部状态
// ============================================================================

/// 链头部状态（头部缓冲区中每条链一项）
#[derive(Clone, Copy, Debug)]
pub struct HeadState {
    pub chain_id: ChainId,
    /// 根节点
    pub root: NodeId,
    /// 在粒子缓冲区中的起始偏移
    pub offset: usize,
    pub particle_count: usize,
    pub flags: ChainFlags,

    // ========== 运动学 ==========
    /// 当前世界位置
    pub position: Vec3,
    /// 上一帧世界位置
    pub prev_position: Vec3,
    /// 当前世界旋转
    pub rotation: Quat,
    /// 本帧位移
    pub displacement: Vec3,
    /// 物体缩放（世界缩放 x 分量的绝对值）
    pub object_scale: f32,
    /// 构建时根节点的世界到本地矩阵
    pub root_world_to_local: Mat4,
    /// 最大累积骨骼长度
    pub total_length: f32,

    // ========== 参数 ==========
    pub gravity: Vec3,
    /// 根节点本地空间重力（构建时）
    pub local_gravity: Vec3,
    /// 外力
    pub force: Vec3,
    pub update_rate: f32,
    /// 混合权重 [0, 1]
    pub weight: f32,

    // ========== 每帧推导 ==========
    /// 静止姿态重力方向（local_gravity 随根旋转）
    pub rest_gravity: Vec3,
    /// 投影后的重力，已乘缩放与时间系数
    pub final_gravity: Vec3,
    /// 外力，已乘缩放与时间系数（每质点再乘 force_scale）
    pub final_force: Vec3,
    /// 时间系数 deltaTime * updateRate
    pub time_var: f32,
}

impl HeadState {
    fn new(chain_id: ChainId, root: NodeId) -> Self {
        Self {
            chain_id,
            root,
            offset: 0,
            particle_count: 0,
            flags: ChainFlags::empty(),
            position: Vec3::ZERO,
            prev_position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            displacement: Vec3::ZERO,
            object_scale: 1.0,
            root_world_to_local: Mat4::IDENTITY,
            total_length: 0.0,
            gravity: Vec3::ZERO,
            local_gravity: Vec3::ZERO,
            force: Vec3::ZERO,
            update_rate: 60.0,
            weight: 1.0,
            rest_gravity: Vec3::ZERO,
            final_gravity: Vec3::ZERO,
            final_force: Vec3::ZERO,
            time_var: 1.0,
        }
    }

    /// 是否参与本帧模拟
    #[inline]
    pub fn is_active(&self) -> bool {
        self.weight > 0.0 && !self.flags.contains(ChainFlags::REMOVE_PENDING)
    }

    /// 重力转换到根节点本地空间，保持长度
    pub fn update_local_gravity(&mut self) {
        let length = self.gravity.length();
        self.local_gravity = self
            .root_world_to_local
            .transform_vector3(self.gravity)
            .normalize_or_zero()
            * length;
    }
}

// ============================================================================
// 链
// ============================================================================

/// 质点链
#[derive(Clone, Debug)]
pub struct Chain {
    pub head: HeadState,
    /// 长度 == head.particle_count，索引 0 为根
    pub particles: Vec<Particle>,
    /// 影响本链的碰撞体
    pub colliders: Vec<ColliderHandle>,
}

impl Chain {
    #[inline]
    pub fn id(&self) -> ChainId {
        self.head.chain_id
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.head.root
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn total_length(&self) -> f32 {
        self.head.total_length
    }

    /// 应用组件配置：头部参数、碰撞体与质点参数映射
    pub fn apply_config(&mut self, config: &ChainConfig) {
        self.head.gravity = config.gravity;
        self.head.force = config.force;
        self.head.update_rate = config.update_rate;
        self.head.weight = clamp01(config.blend_weight);
        self.head.update_local_gravity();
        self.colliders = config.colliders.clone();
        params::apply(self, config);
    }
}

// ============================================================================
// 链构建器
// ============================================================================

/// 链构建器
///
/// 从根节点深度优先遍历，遇到结束节点或叶节点停止。
pub struct ChainBuilder<'a, S: SceneGraph + ?Sized> {
    scene: &'a S,
    end_nodes: &'a [NodeId],
}

impl<'a, S: SceneGraph + ?Sized> ChainBuilder<'a, S> {
    pub fn new(scene: &'a S, end_nodes: &'a [NodeId]) -> Self {
        Self { scene, end_nodes }
    }

    /// 构建链（参数尚未映射，需要再调用 Chain::apply_config）
    pub fn build(&self, root: NodeId) -> Result<Chain> {
        let (root_position, root_rotation) = self
            .scene
            .world_pose(root)
            .ok_or(JiggleError::InvalidRoot(root))?;

        let count = self.count_nodes(root);
        if count > MAX_PARTICLE_COUNT {
            return Err(JiggleError::CapacityExceeded {
                root,
                count,
                capacity: MAX_PARTICLE_COUNT,
            });
        }

        let mut head = HeadState::new(ChainId::next(), root);
        head.position = root_position;
        head.prev_position = root_position;
        head.rotation = root_rotation;
        head.object_scale = self.scene.world_scale(root).x.abs();
        head.root_world_to_local = self
            .scene
            .local_to_world(root)
            .map(|m| m.inverse())
            .unwrap_or(Mat4::IDENTITY);

        let mut particles = Vec::with_capacity(count);
        self.append_particles(&mut particles, &mut head.total_length, root, -1, 0.0);
        head.particle_count = particles.len();

        Ok(Chain {
            head,
            particles,
            colliders: Vec::new(),
        })
    }

    fn is_end_node(&self, node: NodeId) -> bool {
        self.end_nodes.contains(&node)
    }

    /// 统计遍历会访问的节点数（防环）
    fn count_nodes(&self, root: NodeId) -> usize {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            if !self.is_end_node(node) {
                stack.extend(self.scene.children_of(node));
            }
        }
        visited.len()
    }

    fn append_particles(
        &self,
        particles: &mut Vec<Particle>,
        total_length: &mut f32,
        node: NodeId,
        parent_index: i32,
        mut bone_length: f32,
    ) {
        let index = particles.len();
        let (world_position, world_rotation) = self
            .scene
            .world_pose(node)
            .unwrap_or((Vec3::ZERO, Quat::IDENTITY));
        let (local_position, local_rotation) = self
            .scene
            .local_pose(node)
            .unwrap_or((Vec3::ZERO, Quat::IDENTITY));

        let mut p = Particle {
            index: index as i32,
            parent_index,
            node,
            scale: self.scene.world_scale(node),
            init_local_position: local_position,
            init_local_rotation: local_rotation,
            local_position,
            local_rotation,
            position: world_position,
            prev_position: world_position,
            ideal_position: world_position,
            ideal_rotation: world_rotation,
            resolved_rotation: world_rotation,
            ..Default::default()
        };
        p.ideal_local_to_world = p.compute_ideal_matrix();

        if parent_index >= 0 {
            let parent = &mut particles[parent_index as usize];
            bone_length += parent.ideal_position.distance(world_position);
            parent.child_count += 1;
            p.bone_length = bone_length;
            *total_length = total_length.max(bone_length);
        }
        particles.push(p);

        if self.is_end_node(node) {
            return;
        }
        for child in self.scene.children_of(node) {
            // 防环：已在链内的节点不再展开
            if particles.iter().any(|q| q.node == child) {
                continue;
            }
            self.append_particles(particles, total_length, child, index as i32, bone_length);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{NodeSet, NodeTransform};

    /// root -> a -> b，root -> c
    fn build_tree() -> (NodeSet, [NodeId; 4]) {
        let mut scene = NodeSet::new();
        let root = scene.add_node("root", None, NodeTransform::from_translation(Vec3::new(0.0, 2.0, 0.0)));
        let a = scene.add_node("a", Some(root), NodeTransform::from_translation(Vec3::new(0.0, -1.0, 0.0)));
        let b = scene.add_node("b", Some(a), NodeTransform::from_translation(Vec3::new(0.0, -1.0, 0.0)));
        let c = scene.add_node("c", Some(root), NodeTransform::from_translation(Vec3::new(0.5, 0.0, 0.0)));
        (scene, [root, a, b, c])
    }

    #[test]
    fn test_build_depth_first() {
        let (scene, [root, a, b, c]) = build_tree();
        let chain = ChainBuilder::new(&scene, &[]).build(root).unwrap();

        let nodes: Vec<NodeId> = chain.particles.iter().map(|p| p.node).collect();
        assert_eq!(nodes, vec![root, a, b, c]);
        assert_eq!(chain.particles[0].parent_index, -1);
        for (i, p) in chain.particles.iter().enumerate().skip(1) {
            assert!((p.parent_index as usize) < i);
        }
        assert_eq!(chain.particles[0].child_count, 2);
        assert_eq!(chain.head.particle_count, 4);
    }

    #[test]
    fn test_bone_lengths() {
        let (scene, [root, ..]) = build_tree();
        let chain = ChainBuilder::new(&scene, &[]).build(root).unwrap();

        assert!((chain.particles[1].bone_length - 1.0).abs() < 1e-6);
        assert!((chain.particles[2].bone_length - 2.0).abs() < 1e-6);
        assert!((chain.particles[3].bone_length - 0.5).abs() < 1e-6);
        assert!((chain.total_length() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_end_nodes_truncate() {
        let (scene, [root, a, _, c]) = build_tree();
        let end = [a];
        let chain = ChainBuilder::new(&scene, &end).build(root).unwrap();
        let nodes: Vec<NodeId> = chain.particles.iter().map(|p| p.node).collect();
        assert_eq!(nodes, vec![root, a, c]);
    }

    #[test]
    fn test_single_node_chain() {
        let mut scene = NodeSet::new();
        let root = scene.add_node("solo", None, NodeTransform::default());
        let chain = ChainBuilder::new(&scene, &[]).build(root).unwrap();
        assert_eq!(chain.particle_count(), 1);
        assert_eq!(chain.total_length(), 0.0);
    }

    #[test]
    fn test_invalid_root() {
        let scene = NodeSet::new();
        let err = ChainBuilder::new(&scene, &[]).build(NodeId(42)).unwrap_err();
        assert!(matches!(err, JiggleError::InvalidRoot(NodeId(42))));
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut scene = NodeSet::new();
        let root = scene.add_node("n0", None, NodeTransform::default());
        let mut parent = root;
        for i in 1..(MAX_PARTICLE_COUNT + 5) {
            parent = scene.add_node(
                format!("n{}", i),
                Some(parent),
                NodeTransform::from_translation(Vec3::new(0.0, -0.1, 0.0)),
            );
        }
        match ChainBuilder::new(&scene, &[]).build(root) {
            Err(JiggleError::CapacityExceeded { count, capacity, .. }) => {
                assert_eq!(count, MAX_PARTICLE_COUNT + 5);
                assert_eq!(capacity, MAX_PARTICLE_COUNT);
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.particle_count())),
        }
    }

    #[test]
    fn test_local_gravity_follows_root_frame() {
        let mut scene = NodeSet::new();
        let root = scene.add_node(
            "root",
            None,
            NodeTransform {
                rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
                ..Default::default()
            },
        );
        let mut chain = ChainBuilder::new(&scene, &[]).build(root).unwrap();
        chain.apply_config(&ChainConfig {
            gravity: Vec3::new(0.0, -2.0, 0.0),
            ..ChainConfig::with_root(root)
        });
        // 本地重力随根旋转回世界空间后仍为 -Y
        assert!((chain.head.local_gravity.length() - 2.0).abs() < 1e-5);
        let world = chain.head.rotation * chain.head.local_gravity;
        assert!((world - Vec3::new(0.0, -2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_chain_ids_unique() {
        let (scene, [root, ..]) = build_tree();
        let builder = ChainBuilder::new(&scene, &[]);
        let a = builder.build(root).unwrap();
        let b = builder.build(root).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
