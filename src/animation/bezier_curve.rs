//! 贝塞尔曲线
//!
//! 固定端点 (0,0) 与 (1,1) 的三次贝塞尔，预采样后线性插值查找。

use glam::Vec2;

use super::Curve;

/// 三次贝塞尔曲线
#[derive(Debug, Clone, PartialEq)]
pub struct BezierCurve {
    /// 预计算的曲线采样点
    points: Vec<Vec2>,
    /// 控制点1
    c0: Vec2,
    /// 控制点2
    c1: Vec2,
    /// 采样间隔数
    interval: u32,
}

impl BezierCurve {
    const P0: Vec2 = Vec2::ZERO;
    const P1: Vec2 = Vec2::ONE;

    /// 创建新的贝塞尔曲线
    ///
    /// # 参数
    /// - `c0`: 控制点1 (归一化到 0-1 范围)
    /// - `c1`: 控制点2 (归一化到 0-1 范围)
    /// - `interval`: 采样间隔数
    pub fn new(c0: Vec2, c1: Vec2, interval: u32) -> Self {
        let interval = interval.max(1);
        let mut points = Vec::with_capacity((interval + 1) as usize);
        let interval_f = interval as f32;

        for i in 0..=interval {
            let t = i as f32 / interval_f;
            let it = 1.0 - t;
            // B(t) = (1-t)³P₀ + 3(1-t)²tP₁ + 3(1-t)t²P₂ + t³P₃
            let point = Self::P0 * it.powi(3)
                + c0 * 3.0 * it.powi(2) * t
                + c1 * 3.0 * it * t.powi(2)
                + Self::P1 * t.powi(3);
            points.push(point);
        }

        // 按 X 排序以便查找
        points.sort_unstable_by(|a, b| a.x.total_cmp(&b.x));

        Self {
            points,
            c0,
            c1,
            interval,
        }
    }

    /// 线性曲线 y = x
    pub fn linear() -> Self {
        Self::new(Vec2::splat(1.0 / 3.0), Vec2::splat(2.0 / 3.0), 16)
    }

    pub fn control_points(&self) -> (Vec2, Vec2) {
        (self.c0, self.c1)
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }
}

impl Curve for BezierCurve {
    /// 使用预计算的采样点进行线性插值查找
    fn value(&self, v: f32) -> f32 {
        let mut n = (self.points[0], self.points[1]);
        for point in &self.points[2..] {
            if n.1.x > v {
                break;
            }
            n = (n.1, *point);
        }
        if n.0.x == n.1.x {
            n.0.y
        } else {
            n.0.y + (v - n.0.x) * (n.1.y - n.0.y) / (n.1.x - n.0.x)
        }
    }
}
