//! Jiggle Engine - 骨骼链二次运动（Dynamic Bone）求解器
//!
//! 模块划分：
//! - skeleton: 场景图适配接口与内存实现
//! - animation: 参数曲线（贝塞尔 / 关键帧）
//! - physics: 质点链构建、积分、碰撞与批量调度

pub mod animation;
pub mod physics;
pub mod skeleton;

use thiserror::Error;

use physics::ChainId;
use skeleton::NodeId;

pub use animation::{BezierCurve, Curve, FnCurve, KeyframeCurve, SharedCurve};
pub use physics::{
    BatchScheduler, Bound, CapsuleCollider, Chain, ChainBuilder, ChainConfig, ColliderHandle,
    ColliderShape, FrameContext, JiggleBone, Particle, SphereCollider, MAX_PARTICLE_COUNT,
};
pub use skeleton::{NodeSet, NodeTransform, SceneGraph};

/// 引擎错误类型
#[derive(Debug, Error)]
pub enum JiggleError {
    /// 根节点为空或不在场景图中
    #[error("invalid chain root: {0:?}")]
    InvalidRoot(NodeId),

    /// 质点数量超出单链固定容量
    #[error("chain rooted at {root:?} needs {count} particles, capacity is {capacity}")]
    CapacityExceeded {
        root: NodeId,
        count: usize,
        capacity: usize,
    },

    /// 链未注册
    #[error("unknown chain: {0:?}")]
    UnknownChain(ChainId),

    /// 链已注册
    #[error("chain already registered: {0:?}")]
    DuplicateChain(ChainId),
}

pub type Result<T> = std::result::Result<T, JiggleError>;
