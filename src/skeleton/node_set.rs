//! 内存场景图 - 节点层次结构管理
//!
//! 供测试与 demo 使用，也可以作为宿主没有自有场景图时的默认实现。

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use super::scene_node::SceneNode;
use super::{NodeId, NodeTransform, SceneGraph};

/// 内存场景图
#[derive(Clone, Debug, Default)]
pub struct NodeSet {
    nodes: Vec<SceneNode>,
    /// 子节点缓存（按添加顺序）
    children_cache: Vec<Vec<usize>>,
    name_to_index: HashMap<String, usize>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加节点，父节点必须已存在
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
        local: NodeTransform,
    ) -> NodeId {
        let index = self.nodes.len();
        let mut node = SceneNode::new(name.into());
        node.internal_id = index;
        node.parent_index = match parent {
            Some(p) if p.0 < index => p.0 as i32,
            _ => -1,
        };
        node.local_translation = local.translation;
        node.local_rotation = local.rotation;
        node.local_scale = local.scale;
        node.compute_local_transform();

        self.name_to_index.insert(node.name.clone(), index);
        self.nodes.push(node);
        self.children_cache.push(Vec::new());
        if let Some(parent_idx) = self.nodes[index].parent_id() {
            self.children_cache[parent_idx].push(index);
        }

        self.update_global_transform_recursive(index);
        NodeId(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get_node(&self, node: NodeId) -> Option<&SceneNode> {
        self.nodes.get(node.0)
    }

    /// 通过名称查找节点
    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.name_to_index.get(name).copied().map(NodeId)
    }

    /// 修改本地缩放（会刷新子树）
    pub fn set_local_scale(&mut self, node: NodeId, scale: Vec3) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.local_scale = scale;
            n.compute_local_transform();
            self.update_global_transform_recursive(node.0);
        }
    }

    /// 世界位置（便捷方法，节点不存在时返回零向量）
    pub fn position(&self, node: NodeId) -> Vec3 {
        self.nodes.get(node.0).map(|n| n.position()).unwrap_or(Vec3::ZERO)
    }

    fn parent_to_world(&self, idx: usize) -> Mat4 {
        match self.nodes[idx].parent_id() {
            Some(parent_idx) => self.nodes[parent_idx].local_to_world,
            None => Mat4::IDENTITY,
        }
    }

    /// 递归更新全局变换
    pub(crate) fn update_global_transform_recursive(&mut self, idx: usize) {
        if idx >= self.nodes.len() {
            return;
        }

        let parent_global = self.parent_to_world(idx);
        self.nodes[idx].local_to_world = parent_global * self.nodes[idx].local_to_parent;

        // 子节点 id 总是大于父节点，按索引递归不会形成环
        for i in 0..self.children_cache[idx].len() {
            let child_idx = self.children_cache[idx][i];
            self.update_global_transform_recursive(child_idx);
        }
    }
}

impl SceneGraph for NodeSet {
    fn world_pose(&self, node: NodeId) -> Option<(Vec3, Quat)> {
        self.nodes.get(node.0).map(|n| (n.position(), n.rotation()))
    }

    fn set_world_pose(&mut self, node: NodeId, position: Vec3, rotation: Quat) {
        let idx = node.0;
        if idx >= self.nodes.len() {
            return;
        }

        let parent_global = self.parent_to_world(idx);
        let (_, parent_rotation, _) = parent_global.to_scale_rotation_translation();
        let local_translation = parent_global.inverse().transform_point3(position);
        let local_rotation = (parent_rotation.inverse() * rotation).normalize();

        self.nodes[idx].set_local_pose(local_translation, local_rotation);
        self.update_global_transform_recursive(idx);
    }

    fn local_pose(&self, node: NodeId) -> Option<(Vec3, Quat)> {
        self.nodes
            .get(node.0)
            .map(|n| (n.local_translation, n.local_rotation))
    }

    fn set_local_pose(&mut self, node: NodeId, position: Vec3, rotation: Quat) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.set_local_pose(position, rotation);
            self.update_global_transform_recursive(node.0);
        }
    }

    fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.children_cache
            .get(node.0)
            .map(|c| c.iter().copied().map(NodeId).collect())
            .unwrap_or_default()
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent_id().map(NodeId)
    }

    fn world_scale(&self, node: NodeId) -> Vec3 {
        self.nodes
            .get(node.0)
            .map(|n| n.world_scale())
            .unwrap_or(Vec3::ONE)
    }

    fn local_to_world(&self, node: NodeId) -> Option<Mat4> {
        self.nodes.get(node.0).map(|n| n.local_to_world)
    }
}
