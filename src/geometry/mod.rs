use crate::{Vec3f, Point3f, Float};
use cgmath::prelude::*;

pub mod bounds;
pub mod transform;

pub use bounds::*;
pub use transform::*;
pub use transform::Transform;

/// Relative scale of the offset applied to spawned ray origins.
const RAY_OFFSET_SCALE: Float = 1.0e-4;

pub fn distance(p1: Point3f, p2: Point3f) -> Float {
    (p1 - p2).magnitude()
}

pub fn abs_dot(v1: Vec3f, v2: Vec3f) -> Float {
    v1.dot(v2).abs()
}

/// Flip `n` so that it lies in the same hemisphere as `v`.
pub fn faceforward(n: Vec3f, v: Vec3f) -> Vec3f {
    if n.dot(v) < 0.0 { -n } else { n }
}

pub fn spherical_direction(sin_theta: Float, cos_theta: Float, phi: Float) -> Vec3f {
    Vec3f::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Build an orthonormal basis `(v2, v3)` around the unit vector `v1`.
pub fn coordinate_system(v1: Vec3f) -> (Vec3f, Vec3f) {
    let v2 = if v1.x.abs() > v1.y.abs() {
        Vec3f::new(-v1.z, 0.0, v1.x) / (v1.x * v1.x + v1.z * v1.z).sqrt()
    } else {
        Vec3f::new(0.0, v1.z, -v1.y) / (v1.y * v1.y + v1.z * v1.z).sqrt()
    };
    (v2, v1.cross(v2))
}

/// Move a surface point off the surface along the geometric normal, on the side `dir` leaves from.
pub fn offset_ray_origin(p: Point3f, n: Vec3f, dir: Vec3f) -> Point3f {
    let scale = p.x.abs().max(p.y.abs()).max(p.z.abs()).max(1.0);
    let offset = n * (RAY_OFFSET_SCALE * scale);
    if dir.dot(n) < 0.0 { p - offset } else { p + offset }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3f,
    pub dir: Vec3f,
}

impl Ray {
    pub fn new(origin: Point3f, dir: Vec3f) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: Float) -> Point3f {
        self.origin + (self.dir * t)
    }
}
