use std::sync::Arc;

use crate::{Float, Point2f, Point3f, Vec3f};

#[derive(Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: Point3f,
    pub radius: Float,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [Point3f; 3],
    pub normals: Option<[Vec3f; 3]>,
    pub uvs: Option<[Point2f; 3]>,
}

/// Infinite plane through `point` facing `normal`.
#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    pub point: Point3f,
    pub normal: Vec3f,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TriangleMesh {
    pub positions: Vec<Point3f>,
    pub normals: Option<Vec<Vec3f>>,
    pub uvs: Option<Vec<Point2f>>,
    pub indices: Vec<[u32; 3]>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Sphere(Sphere),
    Triangle(Triangle),
    Plane(Plane),
    Mesh(TriangleMesh),
}

impl Shape {
    pub fn sphere(center: Point3f, radius: Float) -> Arc<Self> {
        Arc::new(Shape::Sphere(Sphere { center, radius }))
    }

    pub fn triangle(p0: Point3f, p1: Point3f, p2: Point3f) -> Arc<Self> {
        Arc::new(Shape::Triangle(Triangle { vertices: [p0, p1, p2], normals: None, uvs: None }))
    }

    pub fn plane(point: Point3f, normal: Vec3f) -> Arc<Self> {
        Arc::new(Shape::Plane(Plane { point, normal }))
    }

    pub fn mesh(mesh: TriangleMesh) -> Arc<Self> {
        Arc::new(Shape::Mesh(mesh))
    }

    /// Axis-aligned quad spanned by `p0`, `p0 + e0`, `p0 + e0 + e1`, `p0 + e1`, as a two-triangle mesh.
    pub fn quad(p0: Point3f, e0: Vec3f, e1: Vec3f) -> Arc<Self> {
        Self::mesh(TriangleMesh {
            positions: vec![p0, p0 + e0, p0 + e0 + e1, p0 + e1],
            normals: None,
            uvs: Some(vec![
                Point2f::new(0.0, 0.0),
                Point2f::new(1.0, 0.0),
                Point2f::new(1.0, 1.0),
                Point2f::new(0.0, 1.0),
            ]),
            indices: vec![[0, 1, 2], [0, 2, 3]],
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Shape::Sphere(_) => "sphere",
            Shape::Triangle(_) => "triangle",
            Shape::Plane(_) => "plane",
            Shape::Mesh(_) => "mesh",
        }
    }
}
