//! 参数曲线
//!
//! 求解器只需要点采样：`value(t) -> f32`，t 为质点在链上的归一化位置。

mod bezier_curve;
mod keyframe_curve;

pub use bezier_curve::BezierCurve;
pub use keyframe_curve::{Keyframe, KeyframeCurve};

use std::sync::Arc;

/// 曲线 trait
pub trait Curve {
    fn value(&self, v: f32) -> f32;
}

/// 可跨线程共享的曲线
pub type SharedCurve = Arc<dyn Curve + Send + Sync>;

/// 闭包曲线适配器
#[derive(Clone, Copy)]
pub struct FnCurve<F>(pub F);

impl<F> Curve for FnCurve<F>
where
    F: Fn(f32) -> f32,
{
    #[inline]
    fn value(&self, v: f32) -> f32 {
        (self.0)(v)
    }
}

impl<F> std::fmt::Debug for FnCurve<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnCurve")
    }
}

/// 把任意曲线包装成 SharedCurve
pub fn shared<C>(curve: C) -> SharedCurve
where
    C: Curve + Send + Sync + 'static,
{
    Arc::new(curve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_curve() {
        let curve = FnCurve(|t: f32| 1.0 - t);
        assert!((curve.value(0.25) - 0.75).abs() < 1e-6);

        let shared_curve = shared(curve);
        assert!((shared_curve.value(1.0)).abs() < 1e-6);
    }
}
