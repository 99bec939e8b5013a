use cgmath::InnerSpace;

use crate::compiler::layout::{self, int_word, ShapeKind};
use crate::compiler::node_cache::{NodeCache, RecordLength};
use crate::compiler::table::{push3, KindTable};
use crate::error::CompileError;
use crate::scene::{Shape, TriangleMesh};
use crate::{Float, Point2f};

pub type ShapeCompiler = KindTable<Shape, ShapeKind>;

pub fn shape_kind(shape: &Shape) -> ShapeKind {
    match shape {
        Shape::Sphere(_) => ShapeKind::Sphere,
        Shape::Triangle(_) => ShapeKind::Triangle,
        Shape::Plane(_) => ShapeKind::Plane,
        Shape::Mesh(_) => ShapeKind::Mesh,
    }
}

fn mesh_flags(mesh: &TriangleMesh) -> u32 {
    let mut flags = 0;
    if mesh.normals.is_some() {
        flags |= layout::mesh::HAS_NORMALS;
    }
    if mesh.uvs.is_some() {
        flags |= layout::mesh::HAS_UVS;
    }
    flags
}

pub fn record_len(shape: &Shape) -> usize {
    match shape {
        Shape::Sphere(_) => layout::sphere::LEN,
        Shape::Triangle(_) => layout::triangle::LEN,
        Shape::Plane(_) => layout::plane::LEN,
        Shape::Mesh(m) => layout::mesh::len(m.positions.len(), m.indices.len(), mesh_flags(m)),
    }
}

fn default_uvs() -> [Point2f; 3] {
    [Point2f::new(0.0, 0.0), Point2f::new(1.0, 0.0), Point2f::new(1.0, 1.0)]
}

fn check_finite(values: impl IntoIterator<Item = Float>, what: &str) -> Result<(), CompileError> {
    if values.into_iter().all(Float::is_finite) {
        Ok(())
    } else {
        Err(CompileError::InvalidGeometry(format!("{} has non-finite coordinates", what)))
    }
}

fn validate_mesh(mesh: &TriangleMesh) -> Result<(), CompileError> {
    let n = mesh.positions.len();
    if let Some(normals) = &mesh.normals {
        if normals.len() != n {
            return Err(CompileError::InvalidGeometry(format!(
                "mesh has {} positions but {} normals",
                n,
                normals.len()
            )));
        }
    }
    if let Some(uvs) = &mesh.uvs {
        if uvs.len() != n {
            return Err(CompileError::InvalidGeometry(format!("mesh has {} positions but {} uvs", n, uvs.len())));
        }
    }
    if let Some(bad) = mesh.indices.iter().flatten().find(|&&i| i as usize >= n) {
        return Err(CompileError::InvalidGeometry(format!(
            "mesh index {} out of range for {} vertices",
            bad, n
        )));
    }
    check_finite(mesh.positions.iter().flat_map(|p| [p.x, p.y, p.z]), "mesh")
}

fn encode(shape: &Shape, out: &mut Vec<Float>) -> Result<(), CompileError> {
    match shape {
        Shape::Sphere(s) => {
            if !(s.radius > 0.0 && s.radius.is_finite()) {
                return Err(CompileError::InvalidGeometry(format!("sphere radius {}", s.radius)));
            }
            check_finite([s.center.x, s.center.y, s.center.z], "sphere")?;
            push3(out, s.center.into());
            out.push(s.radius);
        }
        Shape::Triangle(t) => {
            check_finite(t.vertices.iter().flat_map(|p| [p.x, p.y, p.z]), "triangle")?;
            for p in &t.vertices {
                push3(out, (*p).into());
            }
            let normals = t.normals.unwrap_or([crate::vec3f!(0, 0, 0); 3]);
            for n in &normals {
                push3(out, (*n).into());
            }
            for uv in &t.uvs.unwrap_or_else(default_uvs) {
                out.extend_from_slice(&[uv.x, uv.y]);
            }
            let flags = if t.normals.is_some() { layout::triangle::HAS_NORMALS } else { 0 };
            out.push(int_word(flags));
        }
        Shape::Plane(p) => {
            if p.normal.magnitude2() == 0.0 {
                return Err(CompileError::InvalidGeometry("plane normal has zero length".to_string()));
            }
            push3(out, p.point.into());
            push3(out, p.normal.normalize().into());
        }
        Shape::Mesh(m) => {
            validate_mesh(m)?;
            out.push(int_word(m.positions.len() as u32));
            out.push(int_word(m.indices.len() as u32));
            out.push(int_word(mesh_flags(m)));
            for p in &m.positions {
                push3(out, (*p).into());
            }
            if let Some(normals) = &m.normals {
                for n in normals {
                    push3(out, (*n).into());
                }
            }
            if let Some(uvs) = &m.uvs {
                for uv in uvs {
                    out.extend_from_slice(&[uv.x, uv.y]);
                }
            }
            for tri in &m.indices {
                out.extend(tri.iter().map(|&i| int_word(i)));
            }
        }
    }
    Ok(())
}

impl KindTable<Shape, ShapeKind> {
    /// Rebuilds the shape arrays from scratch.
    pub fn setup(&mut self, cache: &NodeCache) -> Result<(), CompileError> {
        self.clear(cache);
        for &kind in ShapeKind::ALL {
            self.pack_kind(
                cache,
                kind,
                |s| shape_kind(s) == kind,
                RecordLength::PerInstance(&record_len),
                |_, shape, out| encode(shape, out),
            )?;
        }
        self.finish();
        Ok(())
    }
}

/// Number of BVH references a shape contributes.
pub fn part_count(shape: &Shape) -> usize {
    match shape {
        Shape::Mesh(m) => m.indices.len(),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::layout::{read3, word_int};
    use crate::geometry::Transform;
    use crate::scene::{Camera, Material, Primitive, Scene};
    use crate::spectrum::Spectrum;
    use crate::{point3f, vec3f};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_records_round_trip() {
        let mut scene = Scene::new(Camera::default());
        let m = Material::matte(Spectrum::uniform(0.5));
        let sphere = Shape::sphere(point3f!(1, 2, 3), 0.5);
        let tri = Shape::triangle(point3f!(0, 0, 0), point3f!(1, 0, 0), point3f!(0, 1, 0));
        let plane = Shape::plane(point3f!(0, -1, 0), vec3f!(0, 2, 0));
        for s in [&sphere, &tri, &plane] {
            scene.add_primitive(Primitive::new((*s).clone(), m.clone(), Transform::identity()));
        }
        let cache = NodeCache::build(&scene);
        let mut shapes = ShapeCompiler::new();
        shapes.setup(&cache).unwrap();

        let r = shapes.find_offset_for(&cache, &sphere).unwrap();
        assert_eq!(r.kind(), ShapeKind::Sphere as u32);
        let words = &shapes.array(ShapeKind::Sphere)[r.offset()..];
        assert_eq!(read3(words, layout::sphere::CENTER), [1.0, 2.0, 3.0]);
        assert_eq!(words[layout::sphere::RADIUS], 0.5);

        let r = shapes.find_offset_for(&cache, &plane).unwrap();
        let words = &shapes.array(ShapeKind::Plane)[r.offset()..];
        assert_abs_diff_eq!(words[layout::plane::NORMAL + 1], 1.0);

        let r = shapes.find_offset_for(&cache, &tri).unwrap();
        let words = &shapes.array(ShapeKind::Triangle)[r.offset()..];
        assert_eq!(read3(words, layout::triangle::P1), [1.0, 0.0, 0.0]);
        assert_eq!(word_int(words[layout::triangle::FLAGS]), 0);

        assert_eq!(shapes.index().len(), 3);
        assert!(shapes.array(ShapeKind::Mesh).is_empty());
    }

    #[test]
    fn test_rejects_bad_mesh_indices() {
        let mut scene = Scene::new(Camera::default());
        let mesh = Shape::mesh(TriangleMesh {
            positions: vec![point3f!(0, 0, 0), point3f!(1, 0, 0), point3f!(0, 1, 0)],
            normals: None,
            uvs: None,
            indices: vec![[0, 1, 3]],
        });
        scene.add_primitive(Primitive::new(mesh, Material::mirror(), Transform::identity()));
        let cache = NodeCache::build(&scene);
        let mut shapes = ShapeCompiler::new();
        assert!(matches!(shapes.setup(&cache), Err(CompileError::InvalidGeometry(_))));
    }
}
