//! 球体碰撞体

use glam::{Mat4, Vec3};

use super::{Bound, Collider};

/// 球体碰撞体
#[derive(Clone, Debug, PartialEq)]
pub struct SphereCollider {
    /// 节点本地空间中心
    pub center: Vec3,
    pub radius: f32,
    pub bound: Bound,

    // prepare 缓存
    world_center: Vec3,
    scaled_radius: f32,
}

impl SphereCollider {
    pub fn new(center: Vec3, radius: f32, bound: Bound) -> Self {
        let radius = radius.abs();
        Self {
            center,
            radius,
            bound,
            world_center: center,
            scaled_radius: radius,
        }
    }

    pub fn world_center(&self) -> Vec3 {
        self.world_center
    }

    pub fn scaled_radius(&self) -> f32 {
        self.scaled_radius
    }
}

impl Collider for SphereCollider {
    fn prepare(&mut self, local_to_world: Mat4) {
        let scale = local_to_world.x_axis.truncate().length();
        self.world_center = local_to_world.transform_point3(self.center);
        self.scaled_radius = scale * self.radius;
    }

    fn collide(&self, position: &mut Vec3, radius: f32) -> bool {
        match self.bound {
            Bound::Outside => push_outside(position, radius, self.world_center, self.scaled_radius),
            Bound::Inside => push_inside(position, radius, self.world_center, self.scaled_radius),
        }
    }

    fn bound(&self) -> Bound {
        self.bound
    }
}

/// 把质点推到球外，质点恰好在球心时不处理
pub(crate) fn push_outside(position: &mut Vec3, particle_radius: f32, center: Vec3, radius: f32) -> bool {
    let r = particle_radius + radius;
    let dir = *position - center;
    let dist2 = dir.length_squared();
    if dist2 > 0.0 && dist2 < r * r {
        *position = center + dir.normalize_or_zero() * r;
        return true;
    }
    false
}

/// 把质点拉回球内，方向退化时拉到球心
pub(crate) fn push_inside(position: &mut Vec3, particle_radius: f32, center: Vec3, radius: f32) -> bool {
    let r = radius - particle_radius;
    let dir = *position - center;
    let dist2 = dir.length_squared();
    if dist2 > 0.0 && dist2 > r * r {
        *position = center + dir.normalize_or_zero() * r;
        return true;
    }
    false
}
