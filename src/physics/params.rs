//! 参数曲线映射
//!
//! 每个质点按 t = bone_length / total_length 采样曲线，乘到基础值上后钳制。
//! 链总长度为 0（单节点链）时跳过采样。

use crate::animation::SharedCurve;

use super::chain::Chain;
use super::config::{clamp01, sanitize_radius, ChainConfig};

#[inline]
fn sample(curve: &Option<SharedCurve>, t: f32) -> f32 {
    match curve {
        Some(c) => c.value(t),
        None => 1.0,
    }
}

/// 把基础参数与曲线映射到链上每个质点
pub fn apply(chain: &mut Chain, config: &ChainConfig) {
    let total_length = chain.head.total_length;
    let curves = &config.curves;

    for p in chain.particles.iter_mut() {
        p.damping = clamp01(config.damping);
        p.elasticity = clamp01(config.elasticity);
        p.stiffness = clamp01(config.stiffness);
        p.inertia = clamp01(config.inertia);
        p.friction = clamp01(config.friction);
        p.radius = sanitize_radius(config.radius);
        p.force_scale = 1.0;

        if total_length > 0.0 {
            let t = p.bone_length / total_length;
            p.damping *= sample(&curves.damping, t);
            p.elasticity *= sample(&curves.elasticity, t);
            p.stiffness *= sample(&curves.stiffness, t);
            p.inertia *= sample(&curves.inertia, t);
            p.friction *= sample(&curves.friction, t);
            p.radius *= sample(&curves.radius, t);
            p.force_scale *= sample(&curves.force, t);
        }

        // 曲线输出可能越界
        p.damping = clamp01(p.damping);
        p.elasticity = clamp01(p.elasticity);
        p.stiffness = clamp01(p.stiffness);
        p.inertia = clamp01(p.inertia);
        p.friction = clamp01(p.friction);
        p.radius = sanitize_radius(p.radius);
        p.force_scale = clamp01(p.force_scale);
    }
}
