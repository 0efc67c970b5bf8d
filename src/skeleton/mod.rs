//! 场景图系统 - 宿主节点层级的适配层
//!
//! 核心设计思想：
//! - SceneGraph: 宿主场景图接口，求解器只通过它读写节点变换
//! - SceneNode: 单个节点（本地变换 + 世界变换缓存）
//! - NodeSet: 内存场景图实现，管理节点层次结构

mod node_set;
mod scene_graph;
mod scene_node;

pub use node_set::NodeSet;
pub use scene_graph::SceneGraph;
pub use scene_node::SceneNode;

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 场景节点句柄
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// 节点变换数据
#[derive(Clone, Copy, Debug)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl NodeTransform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_matrix_roundtrip() {
        let t = NodeTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::splat(2.0),
        };
        let back = NodeTransform::from_matrix(t.to_matrix());
        assert!((back.translation - t.translation).length() < 1e-5);
        assert!(back.rotation.dot(t.rotation).abs() > 1.0 - 1e-6);
        assert!((back.scale - t.scale).length() < 1e-5);
    }
}
