//! 动态骨骼配置
//!
//! - ChainConfig: 单个动态骨骼组件的参数（扁平化，带默认值）
//! - SolverConfig: 全局求解器设置，直接在代码中修改默认值即可

use once_cell::sync::Lazy;
use std::sync::RwLock;

use glam::Vec3;

use crate::animation::SharedCurve;
use crate::skeleton::NodeId;

use super::collider::ColliderHandle;

/// 每个参数可选的分布曲线
///
/// 采样位置 t = 质点骨骼长度 / 链总长度，结果乘到基础值上。
#[derive(Clone, Default)]
pub struct ParameterCurves {
    pub damping: Option<SharedCurve>,
    pub elasticity: Option<SharedCurve>,
    pub stiffness: Option<SharedCurve>,
    pub inertia: Option<SharedCurve>,
    pub friction: Option<SharedCurve>,
    pub radius: Option<SharedCurve>,
    /// 外力受力曲线
    pub force: Option<SharedCurve>,
}

impl std::fmt::Debug for ParameterCurves {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterCurves")
            .field("damping", &self.damping.is_some())
            .field("elasticity", &self.elasticity.is_some())
            .field("stiffness", &self.stiffness.is_some())
            .field("inertia", &self.inertia.is_some())
            .field("friction", &self.friction.is_some())
            .field("radius", &self.radius.is_some())
            .field("force", &self.force.is_some())
            .finish()
    }
}

/// 动态骨骼配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct ChainConfig {
    // ========== 全局设置 ==========
    /// 参考帧率 (Hz)，<= 0 时不做时间缩放
    pub update_rate: f32,
    /// 重力
    pub gravity: Vec3,
    /// 外力（风等）
    pub force: Vec3,
    /// 混合权重 [0, 1]
    pub blend_weight: f32,

    // ========== 质点参数 ==========
    /// 阻尼 [0, 1]
    pub damping: f32,
    /// 弹性 [0, 1]
    pub elasticity: f32,
    /// 刚性 [0, 1]
    pub stiffness: f32,
    /// 摩擦力 [0, 1]，碰撞后的下一帧叠加到阻尼上
    pub friction: f32,
    /// 惯性 [0, 1]，头部位移传递给质点的比例
    pub inertia: f32,
    /// 质点半径 (>= 0)
    pub radius: f32,
    /// 参数曲线
    pub curves: ParameterCurves,

    // ========== 节点 ==========
    /// 根节点（每个根生成一条链）
    pub roots: Vec<NodeId>,
    /// 结束节点，遍历到此停止（节点本身仍包含在链内）
    pub end_nodes: Vec<NodeId>,
    /// 碰撞体
    pub colliders: Vec<ColliderHandle>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            update_rate: 60.0,
            gravity: Vec3::ZERO,
            force: Vec3::ZERO,
            blend_weight: 1.0,

            damping: 0.1,
            elasticity: 0.1,
            stiffness: 0.1,
            friction: 0.1,
            inertia: 0.5,
            radius: 0.0,
            curves: ParameterCurves::default(),

            roots: Vec::new(),
            end_nodes: Vec::new(),
            colliders: Vec::new(),
        }
    }
}

impl ChainConfig {
    pub fn with_root(root: NodeId) -> Self {
        Self {
            roots: vec![root],
            ..Default::default()
        }
    }

    /// 钳制所有标量到合法范围
    pub fn sanitized(&self) -> Self {
        let mut config = self.clone();
        config.blend_weight = clamp01(config.blend_weight);
        config.damping = clamp01(config.damping);
        config.elasticity = clamp01(config.elasticity);
        config.stiffness = clamp01(config.stiffness);
        config.friction = clamp01(config.friction);
        config.inertia = clamp01(config.inertia);
        config.radius = sanitize_radius(config.radius);
        config
    }
}

/// NaN 视为 0
#[inline]
pub(crate) fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[inline]
pub(crate) fn sanitize_radius(v: f32) -> f32 {
    if v.is_finite() {
        v.abs()
    } else {
        0.0
    }
}

/// 全局求解器配置
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// 头部缓冲区初始容量（链数）
    pub initial_chain_capacity: usize,
    /// 权重变化阈值，小于此值视为未变化
    pub weight_epsilon: f32,
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            initial_chain_capacity: 200,
            weight_epsilon: 0.001,
            debug_log: false,
        }
    }
}

/// 全局配置实例
static SOLVER_CONFIG: Lazy<RwLock<SolverConfig>> = Lazy::new(|| {
    RwLock::new(SolverConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> SolverConfig {
    SOLVER_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: SolverConfig) {
    *SOLVER_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *SOLVER_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SolverConfig::default();
}
