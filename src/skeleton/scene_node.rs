//! 场景节点
//!
//! SceneNode 是内存场景图的基本单元，每个节点保存本地变换
//! 以及由父节点推导出的世界变换缓存。

use glam::{Mat4, Quat, Vec3};

/// 场景节点
///
/// 设计原则：
/// - 静态数据：名称、父子关系
/// - 动态数据：本地平移/旋转/缩放
/// - 变换计算：local_to_world = parent.local_to_world * local_to_parent
#[derive(Clone, Debug)]
pub struct SceneNode {
    // ========================================
    // 静态数据（创建后不变）
    // ========================================

    /// 节点名称
    pub name: String,

    /// 节点内部索引
    pub(crate) internal_id: usize,

    /// 父节点索引 (-1 表示根节点)
    pub parent_index: i32,

    // ========================================
    // 动态数据
    // ========================================

    /// 本地平移
    pub local_translation: Vec3,

    /// 本地旋转
    pub local_rotation: Quat,

    /// 本地缩放
    pub local_scale: Vec3,

    /// 本地变换矩阵 (local_to_parent)
    pub local_to_parent: Mat4,

    /// 全局变换矩阵 (local_to_world)
    pub local_to_world: Mat4,
}

impl SceneNode {
    /// 创建新节点
    pub fn new(name: String) -> Self {
        Self {
            name,
            internal_id: 0,
            parent_index: -1,
            local_translation: Vec3::ZERO,
            local_rotation: Quat::IDENTITY,
            local_scale: Vec3::ONE,
            local_to_parent: Mat4::IDENTITY,
            local_to_world: Mat4::IDENTITY,
        }
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn node_id(&self) -> usize {
        self.internal_id
    }

    /// 父节点索引
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

    /// 获取世界位置
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.local_to_world.w_axis.truncate()
    }

    /// 获取世界旋转（去除缩放）
    #[inline]
    pub fn rotation(&self) -> Quat {
        let (_, rotation, _) = self.local_to_world.to_scale_rotation_translation();
        rotation
    }

    /// 获取世界缩放
    #[inline]
    pub fn world_scale(&self) -> Vec3 {
        let (scale, _, _) = self.local_to_world.to_scale_rotation_translation();
        scale
    }

    // ========================================
    // 变换计算
    // ========================================

    /// 计算本地变换 (local_to_parent)
    pub fn compute_local_transform(&mut self) {
        self.local_to_parent = Mat4::from_scale_rotation_translation(
            self.local_scale,
            self.local_rotation,
            self.local_translation,
        );
    }

    /// 设置本地位置与旋转并刷新 local_to_parent
    #[inline]
    pub fn set_local_pose(&mut self, translation: Vec3, rotation: Quat) {
        self.local_translation = translation;
        self.local_rotation = rotation;
        self.compute_local_transform();
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new(String::new())
    }
}
