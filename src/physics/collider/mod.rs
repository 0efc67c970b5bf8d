//! 碰撞体
//!
//! - Collider: 几何体接口（prepare 刷新世界空间缓存，collide 推出/拉回质点）
//! - ColliderShape: 球体 / 胶囊体
//! - ColliderHandle: 多条链共享的句柄，帧戳保证每帧最多 prepare 一次

mod capsule;
mod sphere;

pub use capsule::{CapsuleCollider, CapsuleDirection};
pub use sphere::SphereCollider;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use glam::{Mat4, Vec3};

use crate::skeleton::{NodeId, SceneGraph};

/// 约束方向
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Bound {
    /// 质点被推出体外
    #[default]
    Outside,
    /// 质点被拉回体内
    Inside,
}

/// 帧上下文，取代全局帧计数
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameContext {
    /// 当前帧号，从 1 开始
    pub frame: u64,
}

impl FrameContext {
    pub fn new(frame: u64) -> Self {
        Self { frame }
    }
}

/// 碰撞体接口
pub trait Collider {
    /// 根据挂载节点的本地到世界矩阵刷新世界空间几何
    fn prepare(&mut self, local_to_world: Mat4);

    /// 碰撞测试，发生碰撞时修改 position 并返回 true
    fn collide(&self, position: &mut Vec3, radius: f32) -> bool;

    fn bound(&self) -> Bound;
}

/// 碰撞体形状
#[derive(Clone, Debug)]
pub enum ColliderShape {
    Sphere(SphereCollider),
    Capsule(CapsuleCollider),
}

impl Collider for ColliderShape {
    fn prepare(&mut self, local_to_world: Mat4) {
        match self {
            ColliderShape::Sphere(s) => s.prepare(local_to_world),
            ColliderShape::Capsule(c) => c.prepare(local_to_world),
        }
    }

    fn collide(&self, position: &mut Vec3, radius: f32) -> bool {
        match self {
            ColliderShape::Sphere(s) => s.collide(position, radius),
            ColliderShape::Capsule(c) => c.collide(position, radius),
        }
    }

    fn bound(&self) -> Bound {
        match self {
            ColliderShape::Sphere(s) => s.bound(),
            ColliderShape::Capsule(c) => c.bound(),
        }
    }
}

impl From<SphereCollider> for ColliderShape {
    fn from(s: SphereCollider) -> Self {
        ColliderShape::Sphere(s)
    }
}

impl From<CapsuleCollider> for ColliderShape {
    fn from(c: CapsuleCollider) -> Self {
        ColliderShape::Capsule(c)
    }
}

// ============================================================================
// 共享句柄
// ============================================================================

struct ColliderCell {
    shape: RwLock<ColliderShape>,
    /// 挂载节点，None 表示几何已在世界空间
    node: Option<NodeId>,
    /// 最近一次 prepare 的帧号（0 = 从未）
    prepared_frame: AtomicU64,
    enabled: AtomicBool,
}

/// 碰撞体句柄
///
/// 多条链可以引用同一个碰撞体。prepare 在同一帧内只会真正计算一次：
/// 先无锁比较帧戳，未命中再取写锁并二次检查。
#[derive(Clone)]
pub struct ColliderHandle {
    inner: Arc<ColliderCell>,
}

impl ColliderHandle {
    pub fn new(shape: impl Into<ColliderShape>, node: Option<NodeId>) -> Self {
        Self {
            inner: Arc::new(ColliderCell {
                shape: RwLock::new(shape.into()),
                node,
                prepared_frame: AtomicU64::new(0),
                enabled: AtomicBool::new(true),
            }),
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        self.inner.node
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn prepared_frame(&self) -> u64 {
        self.inner.prepared_frame.load(Ordering::Acquire)
    }

    /// 替换几何参数，下一次 prepare 会重新计算
    pub fn set_shape(&self, shape: impl Into<ColliderShape>) {
        let mut guard = self.inner.shape.write().unwrap_or_else(|e| e.into_inner());
        *guard = shape.into();
        self.inner.prepared_frame.store(0, Ordering::Release);
    }

    /// 当前几何（含缓存）的拷贝
    pub fn shape(&self) -> ColliderShape {
        self.inner.shape.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 刷新世界空间缓存，本帧已刷新过时直接返回 false
    pub fn prepare<S>(&self, ctx: &FrameContext, scene: &S) -> bool
    where
        S: SceneGraph + ?Sized,
    {
        if self.inner.prepared_frame.load(Ordering::Acquire) == ctx.frame {
            return false;
        }

        let mut shape = self.inner.shape.write().unwrap_or_else(|e| e.into_inner());
        if self.inner.prepared_frame.load(Ordering::Acquire) == ctx.frame {
            return false;
        }

        let local_to_world = match self.inner.node {
            Some(node) => scene.local_to_world(node).unwrap_or(Mat4::IDENTITY),
            None => Mat4::IDENTITY,
        };
        shape.prepare(local_to_world);
        self.inner.prepared_frame.store(ctx.frame, Ordering::Release);
        true
    }

    /// 碰撞测试（读锁，可并发）
    #[inline]
    pub fn collide(&self, position: &mut Vec3, radius: f32) -> bool {
        let shape = self.inner.shape.read().unwrap_or_else(|e| e.into_inner());
        shape.collide(position, radius)
    }

    pub fn ptr_eq(&self, other: &ColliderHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ColliderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColliderHandle")
            .field("node", &self.inner.node)
            .field("enabled", &self.is_enabled())
            .field("prepared_frame", &self.prepared_frame())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{NodeSet, NodeTransform};

    #[test]
    fn test_prepare_once_per_frame() {
        let mut scene = NodeSet::new();
        let node = scene.add_node("col", None, NodeTransform::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        let handle = ColliderHandle::new(SphereCollider::new(Vec3::ZERO, 1.0, Bound::Outside), Some(node));

        let ctx = FrameContext::new(1);
        assert!(handle.prepare(&ctx, &scene));
        let first = handle.shape();

        // 同帧内节点移动也不会重新计算
        scene.set_local_pose(node, Vec3::new(5.0, 0.0, 0.0), glam::Quat::IDENTITY);
        assert!(!handle.prepare(&ctx, &scene));
        let second = handle.shape();

        match (first, second) {
            (ColliderShape::Sphere(a), ColliderShape::Sphere(b)) => {
                assert_eq!(a.world_center(), b.world_center());
                assert!((a.world_center() - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
            }
            _ => panic!("unexpected shape"),
        }

        // 新的一帧重新计算
        assert!(handle.prepare(&FrameContext::new(2), &scene));
        if let ColliderShape::Sphere(s) = handle.shape() {
            assert!((s.world_center() - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-6);
        }
    }

    #[test]
    fn test_shared_handle_prepared_by_threads() {
        let scene = NodeSet::new();
        let handle = ColliderHandle::new(SphereCollider::new(Vec3::ZERO, 1.0, Bound::Outside), None);
        let ctx = FrameContext::new(7);

        let recomputed: usize = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let h = handle.clone();
                    let scene = &scene;
                    s.spawn(move || h.prepare(&ctx, scene) as usize)
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap_or(0)).sum()
        });

        assert_eq!(recomputed, 1);
        assert_eq!(handle.prepared_frame(), 7);
    }

    #[test]
    fn test_set_shape_invalidates_cache() {
        let scene = NodeSet::new();
        let handle = ColliderHandle::new(SphereCollider::new(Vec3::ZERO, 1.0, Bound::Outside), None);
        let ctx = FrameContext::new(3);
        handle.prepare(&ctx, &scene);
        handle.set_shape(SphereCollider::new(Vec3::ONE, 2.0, Bound::Outside));
        assert!(handle.prepare(&ctx, &scene));
    }

    #[test]
    fn test_enabled_flag() {
        let handle = ColliderHandle::new(SphereCollider::new(Vec3::ZERO, 1.0, Bound::Outside), None);
        assert!(handle.is_enabled());
        handle.set_enabled(false);
        assert!(!handle.is_enabled());
        assert!(handle.clone().ptr_eq(&handle));
    }
}
