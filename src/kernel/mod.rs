//! Routines that read a compiled scene through flat slices only.
//!
//! A [`SceneView`] borrows every array of a compiled scene. It is built either from a
//! [`CompiledScene`](crate::compiler::CompiledScene) or from buffers in device memory, and the path
//! tracer cannot tell the two apart.

use crate::bvh::BvhView;
use crate::compiler::layout::{self, CameraRecord, LightKind, MaterialKind, PackedRef, ShapeKind, TextureKind};
use crate::compiler::NodeKind;
use crate::{Float, Ray};

pub mod camera;
pub mod intersect;
pub mod lights;
pub mod material;
pub mod texture;

pub use intersect::SurfaceInteraction;

#[derive(Clone, Copy, Debug)]
pub struct SceneView<'a> {
    pub shapes: [&'a [Float]; ShapeKind::COUNT],
    pub textures: [&'a [Float]; TextureKind::COUNT],
    pub materials: [&'a [Float]; MaterialKind::COUNT],
    pub lights: [&'a [Float]; LightKind::COUNT],
    /// Every compiled light, in node cache order.
    pub light_index: &'a [PackedRef],
    /// Lights reached by rays that escape the scene.
    pub infinite_lights: &'a [PackedRef],
    pub primitives: &'a [Float],
    pub bvh: BvhView<'a>,
    /// Primitives kept out of the BVH.
    pub unbounded: &'a [u32],
    pub camera: CameraRecord,
}

/// Borrowed view of one fixed-length primitive record.
#[derive(Clone, Copy, Debug)]
pub struct PrimitiveRecord<'a> {
    pub shape: PackedRef,
    pub material: PackedRef,
    pub light: PackedRef,
    pub to_world: &'a [Float],
    pub to_object: &'a [Float],
}

const EMPTY: &[Float] = &[];

impl<'a> SceneView<'a> {
    /// A scene with nothing in it.
    pub fn empty(camera: CameraRecord) -> Self {
        Self {
            shapes: [EMPTY; ShapeKind::COUNT],
            textures: [EMPTY; TextureKind::COUNT],
            materials: [EMPTY; MaterialKind::COUNT],
            lights: [EMPTY; LightKind::COUNT],
            light_index: &[],
            infinite_lights: &[],
            primitives: &[],
            bvh: BvhView { nodes: &[], refs: &[] },
            unbounded: &[],
            camera,
        }
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len() / layout::primitive::LEN
    }

    pub fn primitive(&self, index: usize) -> Option<PrimitiveRecord<'a>> {
        use layout::primitive::*;
        let words = self.primitives.get(index * LEN..(index + 1) * LEN)?;
        Some(PrimitiveRecord {
            shape: PackedRef::from_word(words[SHAPE]),
            material: PackedRef::from_word(words[MATERIAL]),
            light: PackedRef::from_word(words[LIGHT]),
            to_world: &words[OBJECT_TO_WORLD..WORLD_TO_OBJECT],
            to_object: &words[WORLD_TO_OBJECT..LEN],
        })
    }

    /// The tail of the shape array starting at the referenced record.
    pub fn shape_record(&self, shape: PackedRef) -> Option<&'a [Float]> {
        let kind = ShapeKind::from_id(shape.kind())?;
        let array: &'a [Float] = self.shapes[kind.id() as usize];
        array.get(shape.offset()..)
    }

    pub fn light_record(&self, light: PackedRef) -> Option<(LightKind, &'a [Float])> {
        if light.is_none() {
            return None;
        }
        let kind = LightKind::from_id(light.kind())?;
        let array: &'a [Float] = self.lights[kind.id() as usize];
        let words = array.get(light.offset()..)?;
        Some((kind, words))
    }

    fn test_primitive(&self, prim: u32, part: u32, ray: &Ray, t_min: Float, t_max: Float) -> Option<(Float, intersect::HitParams)> {
        let record = self.primitive(prim as usize)?;
        let shape = self.shape_record(record.shape)?;
        intersect::intersect_primitive(&record, shape, part, ray, t_min, t_max)
    }

    /// Nearest surface along `ray` with `t` in `[t_min, t_max]`.
    pub fn intersect(&self, ray: &Ray, t_min: Float, t_max: Float) -> Option<SurfaceInteraction> {
        let mut best = self
            .bvh
            .nearest(ray, t_min, t_max, |prim, part, lo, hi| self.test_primitive(prim, part, ray, lo, hi))
            .map(|hit| (hit.t, hit.prim, hit.part, hit.local));

        for &prim in self.unbounded {
            let limit = best.map_or(t_max, |b| b.0);
            if let Some((t, params)) = self.test_primitive(prim, 0, ray, t_min, limit) {
                if best.map_or(true, |b| t < b.0) {
                    best = Some((t, prim, 0, params));
                }
            }
        }

        let (t, prim, part, params) = best?;
        let record = self.primitive(prim as usize)?;
        let shape = self.shape_record(record.shape)?;
        intersect::surface_interaction(prim, &record, shape, part, ray, t, params)
    }

    /// Whether anything blocks `ray` within `[t_min, t_max]`.
    pub fn occluded(&self, ray: &Ray, t_min: Float, t_max: Float) -> bool {
        self.bvh.any(ray, t_min, t_max, |prim, part, lo, hi| self.test_primitive(prim, part, ray, lo, hi).is_some())
            || self
                .unbounded
                .iter()
                .any(|&prim| self.test_primitive(prim, 0, ray, t_min, t_max).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, CompiledScene};
    use crate::geometry::Transform;
    use crate::scene::{Camera, Material, Primitive, Scene, Shape};
    use crate::spectrum::Spectrum;
    use crate::{point3f, vec3f};
    use approx::assert_abs_diff_eq;

    fn two_spheres_over_plane() -> Scene {
        let mut scene = Scene::new(Camera::default());
        let white = Material::matte(Spectrum::uniform(0.5));
        let unit = Shape::sphere(point3f!(0, 0, 0), 1.0);
        scene.add_primitive(Primitive::new(unit.clone(), white.clone(), Transform::translate(vec3f!(0, 1, 0))));
        scene.add_primitive(Primitive::new(unit, white.clone(), Transform::translate(vec3f!(0, 1, -4))));
        scene.add_primitive(Primitive::new(
            Shape::plane(point3f!(0, 0, 0), vec3f!(0, 1, 0)),
            white,
            Transform::identity(),
        ));
        scene
    }

    #[test]
    fn test_nearest_hit_through_bvh_and_unbounded() {
        let compiled = CompiledScene::compile(&two_spheres_over_plane(), &CompileOptions::default()).unwrap();
        let view = compiled.view();

        let ray = Ray::new(point3f!(0, 1, 5), vec3f!(0, 0, -1));
        let hit = view.intersect(&ray, 0.0, Float::INFINITY).unwrap();
        assert_eq!(hit.prim, 0);
        assert_abs_diff_eq!(hit.t, 4.0, epsilon = 1e-4);
        assert_abs_diff_eq!(hit.ng.z, 1.0, epsilon = 1e-4);

        let down = Ray::new(point3f!(3, 5, 0), vec3f!(0, -1, 0));
        let hit = view.intersect(&down, 0.0, Float::INFINITY).unwrap();
        assert_eq!(hit.prim, 2);
        assert_abs_diff_eq!(hit.p.y, 0.0, epsilon = 1e-5);

        let up = Ray::new(point3f!(3, 5, 0), vec3f!(0, 1, 0));
        assert!(view.intersect(&up, 0.0, Float::INFINITY).is_none());
    }

    #[test]
    fn test_occlusion_respects_interval() {
        let compiled = CompiledScene::compile(&two_spheres_over_plane(), &CompileOptions::default()).unwrap();
        let view = compiled.view();
        let ray = Ray::new(point3f!(0, 1, 5), vec3f!(0, 0, -1));
        assert!(view.occluded(&ray, 0.0, 10.0));
        assert!(!view.occluded(&ray, 0.0, 3.5));
    }

    #[test]
    fn test_primitive_records_decode() {
        let compiled = CompiledScene::compile(&two_spheres_over_plane(), &CompileOptions::default()).unwrap();
        let view = compiled.view();
        assert_eq!(view.primitive_count(), 3);
        let rec = view.primitive(1).unwrap();
        assert_eq!(rec.shape.kind(), ShapeKind::Sphere.id());
        assert!(rec.light.is_none());
        assert_abs_diff_eq!(rec.to_world[11], -4.0, epsilon = 1e-6);
        assert!(view.primitive(3).is_none());
    }
}
