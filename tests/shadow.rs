//! Shadow-ray any-hit queries against a single occluder between a surface and a point light.

use anyhow::Context;
use cgmath::InnerSpace;

use lumen::compiler::{CompileOptions, CompiledScene};
use lumen::geometry::{offset_ray_origin, Transform};
use lumen::integrator::uniform_sample_one_light;
use lumen::kernel::material;
use lumen::sampler::RandomSampler;
use lumen::scene::{Camera, Light, Material, Primitive, Scene, Shape};
use lumen::spectrum::Spectrum;
use lumen::{point3f, vec3f, Float, Point3f, Ray};

fn light() -> Point3f {
    point3f!(0, 4, 0)
}

/// A ground plane under a point light, with the index of the occluding sphere.
fn scene() -> (Scene, usize) {
    let mut scene = Scene::new(Camera::default());
    scene.add_primitive(Primitive::new(
        Shape::plane(point3f!(0, 0, 0), vec3f!(0, 1, 0)),
        Material::matte(Spectrum::uniform(0.5)),
        Transform::identity(),
    ));
    let occluder = scene.add_primitive(Primitive::new(
        Shape::sphere(point3f!(0, 0, 0), 0.5),
        Material::matte(Spectrum::uniform(0.5)),
        Transform::translate(vec3f!(0, 2, 0)),
    ));
    scene.add_light(Light::point(light(), Spectrum::uniform(16.0)));
    (scene, occluder)
}

fn shadow_ray(from: Point3f) -> (Ray, Float) {
    let n = vec3f!(0, 1, 0);
    let origin = offset_ray_origin(from, n, light() - from);
    let distance = (light() - origin).magnitude();
    (Ray::new(origin, (light() - origin) / distance), distance)
}

#[test]
fn occluder_blocks_the_light() -> anyhow::Result<()> {
    let (mut scene, occluder) = scene();
    let compiled = CompiledScene::compile(&scene, &CompileOptions::default())?;
    let (ray, distance) = shadow_ray(Point3f::new(0.0, 0.0, 0.0));
    assert!(compiled.view().occluded(&ray, 0.0, distance * (1.0 - 1e-3)));

    // a point off to the side sees past the sphere
    let (side, side_distance) = shadow_ray(Point3f::new(3.0, 0.0, 0.0));
    assert!(!compiled.view().occluded(&side, 0.0, side_distance * (1.0 - 1e-3)));

    scene.remove_primitive(occluder).context("occluder")?;
    let compiled = CompiledScene::compile(&scene, &CompileOptions::default())?;
    assert!(!compiled.view().occluded(&ray, 0.0, distance * (1.0 - 1e-3)));
    Ok(())
}

#[test]
fn direct_lighting_is_zero_in_shadow() -> anyhow::Result<()> {
    let (mut scene, occluder) = scene();
    let down = Ray::new(point3f!(0.01, 1, 0.01), vec3f!(0, -1, 0));

    let compiled = CompiledScene::compile(&scene, &CompileOptions::default())?;
    let view = compiled.view();
    let si = view.intersect(&down, 0.0, Float::INFINITY).context("ground hit")?;
    let bsdf = material::bsdf(&view, si.material, &si).context("ground bsdf")?;
    let mut sampler = RandomSampler::new_with_seed(1);
    assert!(uniform_sample_one_light(&view, &si, &bsdf, &mut sampler).is_black());

    scene.remove_primitive(occluder).context("occluder")?;
    let compiled = CompiledScene::compile(&scene, &CompileOptions::default())?;
    let view = compiled.view();
    let si = view.intersect(&down, 0.0, Float::INFINITY).context("ground hit")?;
    let bsdf = material::bsdf(&view, si.material, &si).context("ground bsdf")?;
    let lit = uniform_sample_one_light(&view, &si, &bsdf, &mut sampler);
    assert!(!lit.is_black());
    Ok(())
}
