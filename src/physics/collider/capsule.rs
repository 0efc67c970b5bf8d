//! 胶囊体碰撞体
//!
//! 胶囊 = 沿某轴偏移 `height / 2 - radius` 的两个球心扫掠出的体积。
//! Inside 模式未实现，始终返回无碰撞。

use glam::{Mat4, Vec3};

use super::sphere::push_outside;
use super::{Bound, Collider};

/// 胶囊轴向
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CapsuleDirection {
    X,
    #[default]
    Y,
    Z,
}

impl CapsuleDirection {
    #[inline]
    pub fn axis(self) -> Vec3 {
        match self {
            CapsuleDirection::X => Vec3::X,
            CapsuleDirection::Y => Vec3::Y,
            CapsuleDirection::Z => Vec3::Z,
        }
    }
}

/// 胶囊体碰撞体
#[derive(Clone, Debug, PartialEq)]
pub struct CapsuleCollider {
    /// 节点本地空间中心
    pub center: Vec3,
    pub radius: f32,
    /// 总高度（含两端半球）
    pub height: f32,
    pub direction: CapsuleDirection,
    pub bound: Bound,

    // prepare 缓存
    sphere_center0: Vec3,
    sphere_center1: Vec3,
    scaled_radius: f32,
}

impl CapsuleCollider {
    pub fn new(center: Vec3, radius: f32, height: f32, direction: CapsuleDirection, bound: Bound) -> Self {
        let mut capsule = Self {
            center,
            radius: radius.abs(),
            height: height.abs(),
            direction,
            bound,
            sphere_center0: center,
            sphere_center1: center,
            scaled_radius: radius.abs(),
        };
        capsule.prepare(Mat4::IDENTITY);
        capsule
    }

    /// 世界空间两个球心
    pub fn sphere_centers(&self) -> (Vec3, Vec3) {
        (self.sphere_center0, self.sphere_center1)
    }

    pub fn scaled_radius(&self) -> f32 {
        self.scaled_radius
    }

    fn outside(&self, position: &mut Vec3, particle_radius: f32) -> bool {
        let p0 = self.sphere_center0;
        let p1 = self.sphere_center1;
        let d = p1 - p0;
        let t = (*position - p0).dot(d);
        let d2 = d.length_squared();
        let r = particle_radius + self.scaled_radius;

        if t <= 0.0 {
            // 起点之前：起点球
            push_outside(position, particle_radius, p0, self.scaled_radius)
        } else if t >= d2 {
            // 终点之后：终点球
            push_outside(position, particle_radius, p1, self.scaled_radius)
        } else {
            // 中段：沿线段法向推出
            let dir = *position - p0;
            let dnormal = dir - d * (t / d2);
            let dn2 = dnormal.length_squared();
            if dn2 > 0.0 && dn2 < r * r {
                let dn = dn2.sqrt();
                *position += dnormal * ((r - dn) / dn);
                return true;
            }
            false
        }
    }
}

impl Collider for CapsuleCollider {
    fn prepare(&mut self, local_to_world: Mat4) {
        let h = (0.5 * self.height - self.radius).max(0.0);
        let offset = self.direction.axis() * h;
        self.sphere_center0 = local_to_world.transform_point3(self.center + offset);
        self.sphere_center1 = local_to_world.transform_point3(self.center - offset);
        self.scaled_radius = local_to_world.x_axis.truncate().length() * self.radius;
    }

    fn collide(&self, position: &mut Vec3, radius: f32) -> bool {
        match self.bound {
            Bound::Outside => self.outside(position, radius),
            // 体内约束未实现
            Bound::Inside => false,
        }
    }

    fn bound(&self) -> Bound {
        self.bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collider::SphereCollider;

    fn capsule_y(height: f32, radius: f32, bound: Bound) -> CapsuleCollider {
        CapsuleCollider::new(Vec3::ZERO, radius, height, CapsuleDirection::Y, bound)
    }

    #[test]
    fn test_sphere_centers() {
        let capsule = capsule_y(3.0, 0.5, Bound::Outside);
        let (c0, c1) = capsule.sphere_centers();
        assert!((c0 - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-6);
        assert!((c1 - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_endpoint_cap_push() {
        let capsule = capsule_y(3.0, 0.5, Bound::Outside);
        let mut pos = Vec3::new(0.0, 1.2, 0.0);
        assert!(capsule.collide(&mut pos, 0.0));
        assert!((pos - Vec3::new(0.0, 1.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_endpoint_matches_sphere() {
        let capsule = capsule_y(3.0, 0.5, Bound::Outside);
        let mut sphere = SphereCollider::new(Vec3::new(0.0, -1.0, 0.0), 0.5, Bound::Outside);
        sphere.prepare(Mat4::IDENTITY);

        for start in [
            Vec3::new(0.1, -1.3, 0.0),
            Vec3::new(-0.2, -1.1, 0.3),
            Vec3::new(0.0, -5.0, 0.0),
        ] {
            let mut a = start;
            let mut b = start;
            let hit_a = capsule.collide(&mut a, 0.1);
            let hit_b = sphere.collide(&mut b, 0.1);
            assert_eq!(hit_a, hit_b);
            assert!((a - b).length() < 1e-6);
        }
    }

    #[test]
    fn test_segment_pushes_radially() {
        let capsule = capsule_y(3.0, 0.5, Bound::Outside);
        let mut pos = Vec3::new(0.2, 0.3, 0.0);
        assert!(capsule.collide(&mut pos, 0.1));
        assert!((pos - Vec3::new(0.6, 0.3, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_on_axis_is_noop() {
        let capsule = capsule_y(3.0, 0.5, Bound::Outside);
        let mut pos = Vec3::new(0.0, 0.2, 0.0);
        assert!(!capsule.collide(&mut pos, 0.0));
        assert!(pos.is_finite());
    }

    #[test]
    fn test_inside_not_implemented() {
        let capsule = capsule_y(3.0, 0.5, Bound::Inside);
        let mut pos = Vec3::new(0.0, 10.0, 0.0);
        assert!(!capsule.collide(&mut pos, 0.0));
        assert_eq!(pos, Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_direction_x() {
        let capsule = CapsuleCollider::new(Vec3::ZERO, 0.25, 2.0, CapsuleDirection::X, Bound::Outside);
        let (c0, c1) = capsule.sphere_centers();
        assert!((c0 - Vec3::new(0.75, 0.0, 0.0)).length() < 1e-6);
        assert!((c1 - Vec3::new(-0.75, 0.0, 0.0)).length() < 1e-6);
    }
}
