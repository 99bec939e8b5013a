//! The unidirectional path tracer with next-event estimation.
//!
//! Emission reached by BSDF sampling is weighted with the power heuristic against the chance of
//! having sampled the same point through [`uniform_sample_one_light`], except on the camera ray
//! and after specular bounces, where light sampling cannot reach it.

use cgmath::InnerSpace;

use crate::geometry::offset_ray_origin;
use crate::integrator::{light_select_pdf, uniform_sample_one_light, IntegratorSettings};
use crate::kernel::{camera, lights, material, SceneView};
use crate::reflection::{BxDFType, ScatterSample};
use crate::sampler::Sampler;
use crate::sampling::power_heuristic;
use crate::spectrum::Spectrum;
use crate::{Float, Ray, Vec3f};

/// Mean of `samples` path estimates through pixel `(x, y)`.
pub fn render_pixel<S: Sampler>(
    view: &SceneView<'_>,
    settings: &IntegratorSettings,
    x: u32,
    y: u32,
    samples: u32,
    sampler: &mut S,
) -> Spectrum {
    let samples = samples.max(1);
    let mut sum = Spectrum::black();
    for _ in 0..samples {
        let u_pixel = sampler.get_2d();
        let u_lens = sampler.get_2d();
        let ray = camera::generate_ray(&view.camera, x, y, u_pixel, u_lens);
        sum += incident_radiance(view, settings, ray, sampler).sanitized();
    }
    sum / samples as Float
}

/// Radiance arriving at the origin of `ray` from along its direction.
pub fn incident_radiance<S: Sampler>(view: &SceneView<'_>, settings: &IntegratorSettings, ray: Ray, sampler: &mut S) -> Spectrum {
    let select_pdf = light_select_pdf(view);
    let mut radiance = Spectrum::black();
    let mut throughput = Spectrum::uniform(1.0);
    let mut ray = ray;
    let mut bounces = 0u32;

    // was the last direction chosen by a specular lobe?
    let mut specular_bounce = false;
    // where, and with what density, the last direction was sampled
    let mut scatter_pdf: Float = 0.0;
    let mut scatter_origin = ray.origin;

    loop {
        let Some(si) = view.intersect(&ray, 0.0, Float::INFINITY) else {
            for &light in view.infinite_lights {
                let le = lights::infinite_le(view, light, ray.dir);
                if le.is_black() {
                    continue;
                }
                let weight = if bounces == 0 || specular_bounce {
                    1.0
                } else {
                    power_heuristic(1, scatter_pdf, 1, lights::infinite_pdf(view, light, ray.dir) * select_pdf)
                };
                radiance += throughput * le * weight;
            }
            break;
        };

        if !si.light.is_none() {
            let le = lights::area_le(view, si.light, si.ng, si.wo);
            if !le.is_black() {
                let weight = if bounces == 0 || specular_bounce {
                    1.0
                } else {
                    let light_pdf = lights::area_pdf(view, si.light, scatter_origin, si.p, si.ng) * select_pdf;
                    power_heuristic(1, scatter_pdf, 1, light_pdf)
                };
                radiance += throughput * le * weight;
            }
        }

        if bounces >= settings.max_depth {
            break;
        }

        let Some(bsdf) = material::bsdf(view, si.material, &si) else {
            break;
        };

        if bsdf.has_non_specular() {
            radiance += throughput * uniform_sample_one_light(view, &si, &bsdf, sampler);
        }

        let Some(scatter) = bsdf.sample_f(si.wo, sampler.get_2d(), BxDFType::all()) else {
            break;
        };
        if !(scatter.pdf > 0.0) || scatter.f.clamp_positive().is_black() {
            break;
        }
        throughput = scattered_throughput(throughput, &scatter, si.ns);
        if !throughput.is_finite() || throughput.is_black() {
            break;
        }

        specular_bounce = scatter.sampled_type.contains(BxDFType::SPECULAR);
        scatter_pdf = scatter.pdf;
        scatter_origin = si.p;
        ray = Ray::new(offset_ray_origin(si.p, si.ng, scatter.wi), scatter.wi);
        bounces += 1;

        if settings.russian_roulette && bounces > settings.rr_min_bounces {
            let survival = throughput.luminance().min(1.0);
            if !(survival > 0.0) || sampler.get_1d() >= survival {
                break;
            }
            throughput /= survival;
        }
    }

    radiance
}

/// Path weight after following `scatter`. Negative lobe channels are dropped here rather than
/// carried into later bounces.
fn scattered_throughput(throughput: Spectrum, scatter: &ScatterSample, ns: Vec3f) -> Spectrum {
    let f = scatter.f.clamp_positive();
    (throughput * f * scatter.wi.dot(ns).abs() / scatter.pdf).clamp_positive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, CompiledScene};
    use crate::geometry::Transform;
    use crate::sampler::RandomSampler;
    use crate::scene::{Camera, Light, Material, Primitive, Scene, Shape};
    use crate::{point3f, vec3f};
    use approx::assert_abs_diff_eq;

    fn compile(scene: &Scene) -> CompiledScene {
        CompiledScene::compile(scene, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_camera_sees_environment() {
        let mut scene = Scene::new(Camera::default());
        scene.add_light(Light::uniform_environment(Spectrum::rgb(0.2, 0.4, 0.8)));
        let compiled = compile(&scene);
        let view = compiled.view();

        let mut sampler = RandomSampler::new_with_seed(3);
        let l = render_pixel(&view, &IntegratorSettings::default(), 0, 0, 4, &mut sampler);
        assert_abs_diff_eq!(l[0], 0.2, epsilon = 1e-5);
        assert_abs_diff_eq!(l[1], 0.4, epsilon = 1e-5);
        assert_abs_diff_eq!(l[2], 0.8, epsilon = 1e-5);
    }

    #[test]
    fn test_unlit_scene_is_black() {
        let mut scene = Scene::new(Camera::default());
        scene.add_primitive(Primitive::new(
            Shape::sphere(point3f!(0, 0, 0), 100.0),
            Material::matte(Spectrum::uniform(0.9)),
            Transform::identity(),
        ));
        let compiled = compile(&scene);
        let view = compiled.view();

        let mut sampler = RandomSampler::new_with_seed(5);
        for x in 0..4 {
            let l = render_pixel(&view, &IntegratorSettings::default(), x, 2, 2, &mut sampler);
            assert!(l.is_black());
        }
    }

    #[test]
    fn test_depth_zero_counts_only_visible_emission() {
        let mut scene = Scene::new(Camera::default());
        scene.add_primitive(Primitive::emissive(
            Shape::sphere(point3f!(0, 0, 0), 100.0),
            Material::matte(Spectrum::uniform(0.5)),
            Transform::identity(),
            Spectrum::uniform(2.0),
            true,
        ));
        let compiled = compile(&scene);
        let view = compiled.view();

        let settings = IntegratorSettings { max_depth: 0, ..Default::default() };
        let mut sampler = RandomSampler::new_with_seed(9);
        let l = render_pixel(&view, &settings, 1, 1, 8, &mut sampler);
        assert_abs_diff_eq!(l[1], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_negative_lobe_channel_does_not_enter_throughput() {
        let scatter = ScatterSample {
            f: Spectrum::rgb(0.5, -0.2, 0.3),
            wi: vec3f!(0, 0.6, 0.8),
            pdf: 0.5,
            sampled_type: BxDFType::REFLECTION | BxDFType::GLOSSY,
        };
        let throughput = scattered_throughput(Spectrum::rgb(1.0, 2.0, 0.5), &scatter, vec3f!(0, 0, 1));
        assert_abs_diff_eq!(throughput[0], 0.8, epsilon = 1e-5);
        assert_abs_diff_eq!(throughput[1], 0.0);
        assert_abs_diff_eq!(throughput[2], 0.24, epsilon = 1e-5);

        // a later bounce cannot turn the dropped channel negative again
        let next = scattered_throughput(throughput, &scatter, vec3f!(0, 0, -1));
        assert!((0..3).all(|c| next[c] >= 0.0));
    }
}
