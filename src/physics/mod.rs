//! 物理系统 - 骨骼链二次运动（Dynamic Bone）
//!
//! 核心设计思想：
//! - Chain / ChainBuilder: 从根节点深度优先展开的扁平质点链（父索引 < 子索引）
//! - params: 参数曲线映射，按骨骼长度比例采样
//! - integrator: Verlet 推进与约束投影的纯计算核
//! - collider: 球体 / 胶囊体，共享句柄按帧戳每帧只准备一次
//! - BatchScheduler: 所有链打包进共享缓冲区，按阶段并行执行
//! - JiggleBone: 一个配置对应多个根节点的组件

mod bone;
mod chain;
mod collider;
mod config;
pub mod integrator;
pub mod params;
mod particle;
pub mod scene_sync;
mod scheduler;

pub use bone::JiggleBone;
pub use chain::{Chain, ChainBuilder, ChainFlags, ChainId, HeadState};
pub use collider::{
    Bound, CapsuleCollider, CapsuleDirection, Collider, ColliderHandle, ColliderShape,
    FrameContext, SphereCollider,
};
pub use config::{get_config, reset_config, set_config, ChainConfig, ParameterCurves, SolverConfig};
pub use particle::{Particle, MAX_PARTICLE_COUNT};
pub use scheduler::BatchScheduler;

