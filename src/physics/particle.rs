//! 质点
//!
//! 每个质点对应链上的一个节点。静止姿态字段在构建后不再改变，
//! 模拟位置每帧更新。

use glam::{Mat4, Quat, Vec3};

use crate::skeleton::NodeId;

/// 单链最大质点数，决定共享缓冲区中每条链的固定切片长度
pub const MAX_PARTICLE_COUNT: usize = 20;

/// 质点
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    // ========================================
    // 结构数据（构建后不变）
    // ========================================

    /// 链内索引
    pub index: i32,
    /// 父质点链内索引 (-1 表示链根)
    pub parent_index: i32,
    /// 子质点数量
    pub child_count: u32,
    /// 对应的场景节点
    pub node: NodeId,
    /// 从链根累积的骨骼长度
    pub bone_length: f32,
    /// 节点自身的世界缩放（构建时捕获）
    pub scale: Vec3,
    /// 初始本地位置
    pub init_local_position: Vec3,
    /// 初始本地旋转
    pub init_local_rotation: Quat,

    // ========================================
    // 参数（曲线映射后，已钳制）
    // ========================================

    pub damping: f32,
    pub elasticity: f32,
    pub stiffness: f32,
    pub inertia: f32,
    pub friction: f32,
    pub radius: f32,
    /// 外力乘子
    pub force_scale: f32,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 模拟位置
    pub position: Vec3,
    /// 上一帧位置（隐式速度）
    pub prev_position: Vec3,
    /// 上一帧是否发生碰撞
    pub is_colliding: bool,

    /// 动画驱动的本地位置（帧开始时从场景读取）
    pub local_position: Vec3,
    /// 动画驱动的本地旋转
    pub local_rotation: Quat,

    /// 理想世界位置（仅动画，不含物理）
    pub ideal_position: Vec3,
    /// 理想世界旋转
    pub ideal_rotation: Quat,
    /// 理想本地到世界矩阵
    pub ideal_local_to_world: Mat4,

    /// 写回场景的世界旋转
    pub resolved_rotation: Quat,

    /// 上一次写回后节点的本地姿态，用于识别未被动画覆盖的节点
    pub written_local_position: Vec3,
    pub written_local_rotation: Quat,
    pub local_written: bool,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            index: 0,
            parent_index: -1,
            child_count: 0,
            node: NodeId::default(),
            bone_length: 0.0,
            scale: Vec3::ONE,
            init_local_position: Vec3::ZERO,
            init_local_rotation: Quat::IDENTITY,
            damping: 0.0,
            elasticity: 0.0,
            stiffness: 0.0,
            inertia: 0.0,
            friction: 0.0,
            radius: 0.0,
            force_scale: 1.0,
            position: Vec3::ZERO,
            prev_position: Vec3::ZERO,
            is_colliding: false,
            local_position: Vec3::ZERO,
            local_rotation: Quat::IDENTITY,
            ideal_position: Vec3::ZERO,
            ideal_rotation: Quat::IDENTITY,
            ideal_local_to_world: Mat4::IDENTITY,
            resolved_rotation: Quat::IDENTITY,
            written_local_position: Vec3::ZERO,
            written_local_rotation: Quat::IDENTITY,
            local_written: false,
        }
    }
}

impl Particle {
    /// 父质点索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// 恢复到初始本地姿态
    #[inline]
    pub fn reset_local_pose(&mut self) {
        self.local_position = self.init_local_position;
        self.local_rotation = self.init_local_rotation;
        self.local_written = false;
    }

    /// 场景中的本地姿态是否仍是上一次写回的结果
    #[inline]
    pub fn holds_written_pose(&self, position: Vec3, rotation: Quat) -> bool {
        self.local_written
            && self.written_local_position == position
            && self.written_local_rotation == rotation
    }

    /// 把模拟状态对齐到理想位置（清除速度与碰撞状态）
    #[inline]
    pub fn snap_to_ideal(&mut self) {
        self.position = self.ideal_position;
        self.prev_position = self.ideal_position;
        self.is_colliding = false;
    }

    /// 理想姿态下的本地到世界矩阵
    #[inline]
    pub fn compute_ideal_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.ideal_rotation, self.ideal_position)
    }
}
