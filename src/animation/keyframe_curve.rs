//! 关键帧曲线 - 分段线性
//!
//! 关键帧按时间排序，区间外取端点值。没有关键帧时视为恒等乘子 1.0。

use super::Curve;

/// 曲线关键帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
}

impl Keyframe {
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// 分段线性关键帧曲线
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeCurve {
    keys: Vec<Keyframe>,
}

impl KeyframeCurve {
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// 两点直线
    pub fn linear(start: f32, end: f32) -> Self {
        Self::new(vec![Keyframe::new(0.0, start), Keyframe::new(1.0, end)])
    }

    /// 插入关键帧，保持有序
    pub fn insert(&mut self, key: Keyframe) {
        let pos = self.keys.partition_point(|k| k.time <= key.time);
        self.keys.insert(pos, key);
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Curve for KeyframeCurve {
    fn value(&self, v: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 1.0,
        };
        if v <= first.time {
            return first.value;
        }
        if v >= last.time {
            return last.value;
        }

        // 第一个 time > v 的关键帧
        let next = self.keys.partition_point(|k| k.time <= v);
        let a = self.keys[next - 1];
        let b = self.keys[next];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        a.value + (b.value - a.value) * ((v - a.time) / span)
    }
}
