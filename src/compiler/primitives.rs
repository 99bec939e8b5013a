use std::sync::Arc;

use crate::bvh::PrimRef;
use crate::compiler::layout::{self, PackedRef};
use crate::compiler::lights::{AreaLightOwner, LightCompiler};
use crate::compiler::materials::MaterialCompiler;
use crate::compiler::node_cache::NodeCache;
use crate::compiler::shapes::ShapeCompiler;
use crate::error::CompileError;
use crate::geometry::{Bounds3f, Transform};
use crate::scene::{Light, Primitive, Shape};
use crate::{Float, Point3f};

/// Which primitive owns each area light, indexed by light node id.
///
/// A primitive's light must be an area light over that primitive's own shape, and an area light
/// belongs to exactly one primitive.
pub fn area_light_owners(cache: &NodeCache, primitives: &[Primitive]) -> Result<Vec<Option<AreaLightOwner>>, CompileError> {
    let mut owners = vec![None; cache.list::<Light>().len()];
    for (i, prim) in primitives.iter().enumerate() {
        let Some(light) = &prim.area_light else { continue };
        match light.as_ref() {
            Light::Area(area) if Arc::ptr_eq(&area.shape, &prim.shape) => {}
            _ => return Err(CompileError::MismatchedAreaLight { primitive: i }),
        }
        let id = cache.id_of(light)?;
        if owners[id.index()].is_some() {
            return Err(CompileError::MismatchedAreaLight { primitive: i });
        }
        owners[id.index()] = Some(AreaLightOwner { primitive: i, transform: prim.transform });
    }
    Ok(owners)
}

fn check_transform(index: usize, transform: &Transform) -> Result<(), CompileError> {
    if transform.has_nans() {
        return Err(CompileError::InvalidGeometry(format!("primitive {} has a non-invertible transform", index)));
    }
    Ok(())
}

fn transformed_bounds(points: impl IntoIterator<Item = Point3f>, transform: &Transform) -> Bounds3f {
    points
        .into_iter()
        .fold(Bounds3f::empty(), |b, p| b.join_point(&transform.transform_point(p)))
}

/// World-space bounds of each BVH part of a primitive, `None` for unbounded shapes.
pub fn world_bounds(shape: &Shape, transform: &Transform) -> Option<Vec<Bounds3f>> {
    match shape {
        Shape::Sphere(s) => {
            let r = crate::vec3f!(s.radius, s.radius, s.radius);
            let object = Bounds3f::with_bounds(s.center - r, s.center + r);
            Some(vec![transformed_bounds((0..8).map(|i| object.corner(i)), transform)])
        }
        Shape::Triangle(t) => Some(vec![transformed_bounds(t.vertices, transform)]),
        Shape::Plane(_) => None,
        Shape::Mesh(m) => Some(
            m.indices
                .iter()
                .map(|tri| transformed_bounds(tri.iter().map(|&i| m.positions[i as usize]), transform))
                .collect(),
        ),
    }
}

/// Fixed-length primitive records, BVH references and the unbounded primitives kept out of the
/// hierarchy.
pub struct PrimitiveTable {
    pub records: Vec<Float>,
    pub refs: Vec<PrimRef>,
    pub unbounded: Vec<u32>,
}

pub fn compile_primitives(
    primitives: &[Primitive],
    cache: &NodeCache,
    shapes: &ShapeCompiler,
    materials: &MaterialCompiler,
    lights: &LightCompiler,
) -> Result<PrimitiveTable, CompileError> {
    let mut records = Vec::with_capacity(primitives.len() * layout::primitive::LEN);
    let mut refs = Vec::with_capacity(primitives.len());
    let mut unbounded = Vec::new();

    for (i, prim) in primitives.iter().enumerate() {
        check_transform(i, &prim.transform)?;
        let shape = shapes.find_offset_for(cache, &prim.shape)?;
        let material = materials.find_offset_for(cache, &prim.material)?;
        let light = match &prim.area_light {
            Some(light) => lights.lookup(cache, light)?.unwrap_or(PackedRef::NONE),
            None => PackedRef::NONE,
        };

        records.push(shape.to_word());
        records.push(material.to_word());
        records.push(light.to_word());
        records.extend_from_slice(&prim.transform.affine_rows());
        records.extend_from_slice(&prim.transform.inverse_affine_rows());

        match world_bounds(&prim.shape, &prim.transform) {
            Some(parts) => refs.extend(parts.into_iter().enumerate().map(|(part, bounds)| PrimRef {
                prim: i as u32,
                part: part as u32,
                bounds,
            })),
            None => unbounded.push(i as u32),
        }
    }
    debug_assert_eq!(records.len(), primitives.len() * layout::primitive::LEN);
    Ok(PrimitiveTable { records, refs, unbounded })
}
