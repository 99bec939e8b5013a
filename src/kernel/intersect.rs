//! Object-space ray/shape tests and surface reconstruction over shape records.
//!
//! Rays are brought into object space with the primitive's inverse affine rows and are not
//! renormalized, so a hit distance is the same parameter along the world ray.

use cgmath::{EuclideanSpace, InnerSpace};

use crate::compiler::layout::{self, read3, word_int, PackedRef, ShapeKind};
use crate::compiler::NodeKind;
use crate::consts::PI;
use crate::geometry::{affine_normal, affine_point, affine_vector};
use crate::kernel::PrimitiveRecord;
use crate::math::quadratic;
use crate::{coordinate_system, faceforward, Float, Point2f, Point3f, Ray, Vec3f};

/// Barycentrics `(b1, b2)` for triangles, unused by other shapes.
pub type HitParams = [Float; 2];

/// Shape-local geometry at a hit, before the primitive transform.
#[derive(Clone, Copy, Debug)]
pub struct LocalSurface {
    pub p: Point3f,
    pub ng: Vec3f,
    pub ns: Vec3f,
    pub dpdu: Vec3f,
    pub uv: Point2f,
}

#[inline]
fn point(words: &[Float], at: usize) -> Point3f {
    Point3f::from(read3(words, at))
}

#[inline]
fn vector(words: &[Float], at: usize) -> Vec3f {
    Vec3f::from(read3(words, at))
}

fn intersect_sphere(rec: &[Float], ray: &Ray, t_min: Float, t_max: Float) -> Option<(Float, HitParams)> {
    let center = point(rec, layout::sphere::CENTER);
    let radius = rec[layout::sphere::RADIUS];
    let oc = ray.origin - center;
    let a = ray.dir.magnitude2();
    let b = 2.0 * oc.dot(ray.dir);
    let c = oc.magnitude2() - radius * radius;
    let (t0, t1) = quadratic(a, b, c)?;
    if t0 >= t_min && t0 <= t_max {
        Some((t0, [0.0; 2]))
    } else if t1 >= t_min && t1 <= t_max {
        Some((t1, [0.0; 2]))
    } else {
        None
    }
}

/// Möller-Trumbore.
fn intersect_triangle_points(
    p0: Point3f,
    p1: Point3f,
    p2: Point3f,
    ray: &Ray,
    t_min: Float,
    t_max: Float,
) -> Option<(Float, HitParams)> {
    let e1 = p1 - p0;
    let e2 = p2 - p0;
    let pvec = ray.dir.cross(e2);
    let det = e1.dot(pvec);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - p0;
    let b1 = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&b1) {
        return None;
    }
    let qvec = tvec.cross(e1);
    let b2 = ray.dir.dot(qvec) * inv_det;
    if b2 < 0.0 || b1 + b2 > 1.0 {
        return None;
    }
    let t = e2.dot(qvec) * inv_det;
    if t < t_min || t > t_max {
        return None;
    }
    Some((t, [b1, b2]))
}

fn intersect_plane(rec: &[Float], ray: &Ray, t_min: Float, t_max: Float) -> Option<(Float, HitParams)> {
    let p0 = point(rec, layout::plane::POINT);
    let n = vector(rec, layout::plane::NORMAL);
    let denom = n.dot(ray.dir);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = (p0 - ray.origin).dot(n) / denom;
    if t < t_min || t > t_max {
        return None;
    }
    Some((t, [0.0; 2]))
}

/// Vertex indices of one mesh triangle.
fn mesh_triangle(rec: &[Float], part: u32) -> (usize, u32, [usize; 3]) {
    let n_vertices = word_int(rec[layout::mesh::N_VERTICES]) as usize;
    let flags = word_int(rec[layout::mesh::FLAGS]);
    let at = layout::mesh::indices_at(n_vertices, flags) + 3 * part as usize;
    let idx = [word_int(rec[at]) as usize, word_int(rec[at + 1]) as usize, word_int(rec[at + 2]) as usize];
    (n_vertices, flags, idx)
}

fn mesh_position(rec: &[Float], i: usize) -> Point3f {
    point(rec, layout::mesh::HEADER + 3 * i)
}

/// Intersects one shape part with an object-space ray.
pub fn intersect_shape(
    kind: ShapeKind,
    rec: &[Float],
    part: u32,
    ray: &Ray,
    t_min: Float,
    t_max: Float,
) -> Option<(Float, HitParams)> {
    match kind {
        ShapeKind::Sphere => intersect_sphere(rec, ray, t_min, t_max),
        ShapeKind::Triangle => intersect_triangle_points(
            point(rec, layout::triangle::P0),
            point(rec, layout::triangle::P1),
            point(rec, layout::triangle::P2),
            ray,
            t_min,
            t_max,
        ),
        ShapeKind::Plane => intersect_plane(rec, ray, t_min, t_max),
        ShapeKind::Mesh => {
            let (_, _, [i0, i1, i2]) = mesh_triangle(rec, part);
            intersect_triangle_points(
                mesh_position(rec, i0),
                mesh_position(rec, i1),
                mesh_position(rec, i2),
                ray,
                t_min,
                t_max,
            )
        }
    }
}

/// Intersects a primitive given its shape record, transforming the ray into object space.
pub fn intersect_primitive(
    prim: &PrimitiveRecord<'_>,
    shape: &[Float],
    part: u32,
    ray: &Ray,
    t_min: Float,
    t_max: Float,
) -> Option<(Float, HitParams)> {
    let kind = ShapeKind::from_id(prim.shape.kind())?;
    let local = Ray::new(affine_point(prim.to_object, ray.origin), affine_vector(prim.to_object, ray.dir));
    intersect_shape(kind, shape, part, &local, t_min, t_max)
}

fn triangle_surface(
    p: [Point3f; 3],
    normals: Option<[Vec3f; 3]>,
    uv: [Point2f; 3],
    params: HitParams,
) -> LocalSurface {
    let [b1, b2] = params;
    let b0 = 1.0 - b1 - b2;
    let hit = Point3f::from_vec(p[0].to_vec() * b0 + p[1].to_vec() * b1 + p[2].to_vec() * b2);
    let ng = (p[1] - p[0]).cross(p[2] - p[0]).normalize();

    let ns = match normals {
        Some(n) => {
            let ns = n[0] * b0 + n[1] * b1 + n[2] * b2;
            if ns.magnitude2() > 0.0 { ns.normalize() } else { ng }
        }
        None => ng,
    };

    // dpdu from the uv parameterization, falling back to the first edge
    let duv02 = uv[0] - uv[2];
    let duv12 = uv[1] - uv[2];
    let dp02 = p[0] - p[2];
    let dp12 = p[1] - p[2];
    let det = duv02.x * duv12.y - duv02.y * duv12.x;
    let dpdu = if det.abs() < 1e-8 {
        p[1] - p[0]
    } else {
        (dp02 * duv12.y - dp12 * duv02.y) / det
    };

    let hit_uv = Point2f::new(
        uv[0].x * b0 + uv[1].x * b1 + uv[2].x * b2,
        uv[0].y * b0 + uv[1].y * b1 + uv[2].y * b2,
    );
    LocalSurface { p: hit, ng, ns, dpdu, uv: hit_uv }
}

fn read_uvs(rec: &[Float], at: [usize; 3]) -> [Point2f; 3] {
    at.map(|i| Point2f::new(rec[i], rec[i + 1]))
}

/// Reconstructs the object-space surface at a hit found by [`intersect_shape`].
pub fn local_surface(kind: ShapeKind, rec: &[Float], part: u32, ray: &Ray, t: Float, params: HitParams) -> LocalSurface {
    match kind {
        ShapeKind::Sphere => {
            let center = point(rec, layout::sphere::CENTER);
            let radius = rec[layout::sphere::RADIUS];
            let n = (ray.at(t) - center).normalize();
            // reproject onto the surface
            let p = center + n * radius;
            let mut phi = n.z.atan2(n.x);
            if phi < 0.0 {
                phi += 2.0 * PI;
            }
            let theta = n.y.clamp(-1.0, 1.0).acos();
            let dpdu = Vec3f::new(-n.z, 0.0, n.x);
            let dpdu = if dpdu.magnitude2() > 0.0 { dpdu } else { coordinate_system(n).0 };
            LocalSurface { p, ng: n, ns: n, dpdu, uv: Point2f::new(phi / (2.0 * PI), theta / PI) }
        }
        ShapeKind::Triangle => {
            use layout::triangle::*;
            let p = [point(rec, P0), point(rec, P1), point(rec, P2)];
            let normals = if word_int(rec[FLAGS]) & HAS_NORMALS != 0 {
                Some([vector(rec, N0), vector(rec, N1), vector(rec, N2)])
            } else {
                None
            };
            triangle_surface(p, normals, read_uvs(rec, [UV0, UV1, UV2]), params)
        }
        ShapeKind::Plane => {
            let n = vector(rec, layout::plane::NORMAL);
            let origin = point(rec, layout::plane::POINT);
            let p = ray.at(t);
            let (s, tt) = coordinate_system(n);
            let d = p - origin;
            LocalSurface { p, ng: n, ns: n, dpdu: s, uv: Point2f::new(d.dot(s), d.dot(tt)) }
        }
        ShapeKind::Mesh => {
            let (n_vertices, flags, idx) = mesh_triangle(rec, part);
            let p = idx.map(|i| mesh_position(rec, i));
            let normals = if flags & layout::mesh::HAS_NORMALS != 0 {
                let at = layout::mesh::normals_at(n_vertices);
                Some(idx.map(|i| vector(rec, at + 3 * i)))
            } else {
                None
            };
            let uvs = if flags & layout::mesh::HAS_UVS != 0 {
                let at = layout::mesh::uvs_at(n_vertices, flags);
                read_uvs(rec, idx.map(|i| at + 2 * i))
            } else {
                [Point2f::new(0.0, 0.0), Point2f::new(1.0, 0.0), Point2f::new(1.0, 1.0)]
            };
            triangle_surface(p, normals, uvs, params)
        }
    }
}

/// World-space surface at a primitive hit.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceInteraction {
    pub p: Point3f,
    pub t: Float,
    /// Geometric normal, following the shape's own orientation.
    pub ng: Vec3f,
    /// Shading normal, on the same side as `ng`.
    pub ns: Vec3f,
    pub dpdu: Vec3f,
    pub uv: Point2f,
    /// Unit direction back along the incoming ray.
    pub wo: Vec3f,
    pub prim: u32,
    pub material: PackedRef,
    pub light: PackedRef,
}

pub fn surface_interaction(
    prim_index: u32,
    prim: &PrimitiveRecord<'_>,
    shape: &[Float],
    part: u32,
    ray: &Ray,
    t: Float,
    params: HitParams,
) -> Option<SurfaceInteraction> {
    let kind = ShapeKind::from_id(prim.shape.kind())?;
    let local_ray = Ray::new(affine_point(prim.to_object, ray.origin), affine_vector(prim.to_object, ray.dir));
    let local = local_surface(kind, shape, part, &local_ray, t, params);

    let ng = affine_normal(prim.to_object, local.ng);
    let ns = affine_normal(prim.to_object, local.ns);
    if ng.magnitude2() == 0.0 || ns.magnitude2() == 0.0 {
        return None;
    }
    let ng = ng.normalize();
    let ns = faceforward(ns.normalize(), ng);
    let wo = -ray.dir.normalize();

    Some(SurfaceInteraction {
        p: affine_point(prim.to_world, local.p),
        t,
        ng,
        ns,
        dpdu: affine_vector(prim.to_world, local.dpdu),
        uv: local.uv,
        wo,
        prim: prim_index,
        material: prim.material,
        light: prim.light,
    })
}
