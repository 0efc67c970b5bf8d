//! 宿主场景图接口
//!
//! 求解器不拥有节点，只在帧开始时读取、帧结束时写回。

use glam::{Mat4, Quat, Vec3};

use super::NodeId;

/// 宿主场景图适配接口
///
/// 读取方法需要可以跨线程并发调用（调度器在 rayon 任务里读取），
/// 写入方法只在单线程阶段调用。
pub trait SceneGraph {
    /// 世界位置与旋转，节点不存在时返回 None
    fn world_pose(&self, node: NodeId) -> Option<(Vec3, Quat)>;

    /// 设置世界位置与旋转（保持本地缩放）
    fn set_world_pose(&mut self, node: NodeId, position: Vec3, rotation: Quat);

    /// 相对父节点的本地位置与旋转
    fn local_pose(&self, node: NodeId) -> Option<(Vec3, Quat)>;

    /// 设置本地位置与旋转
    fn set_local_pose(&mut self, node: NodeId, position: Vec3, rotation: Quat);

    /// 有序子节点列表
    fn children_of(&self, node: NodeId) -> Vec<NodeId>;

    fn parent_of(&self, node: NodeId) -> Option<NodeId>;

    /// 世界缩放（lossy scale），默认无缩放
    fn world_scale(&self, _node: NodeId) -> Vec3 {
        Vec3::ONE
    }

    /// 本地到世界矩阵
    fn local_to_world(&self, node: NodeId) -> Option<Mat4> {
        let (position, rotation) = self.world_pose(node)?;
        Some(Mat4::from_scale_rotation_translation(
            self.world_scale(node),
            rotation,
            position,
        ))
    }
}
