//! Small built-in scenes used by the CLI, thumbnails, tests and benchmarks.

use std::sync::Arc;

use crate::geometry::Transform;
use crate::scene::*;
use crate::spectrum::Spectrum;
use crate::{point3f, vec3f, Float, Point3f};

/// Emissive two-triangle patch in the plane `y = height`, facing down.
fn ceiling_light(scene: &mut Scene, half: Float, height: Float, emission: Spectrum, material: &Arc<Material>) {
    let corners = [
        point3f!(-half, height, -half),
        point3f!(half, height, -half),
        point3f!(half, height, half),
        point3f!(-half, height, half),
    ];
    for tri in [[0, 1, 2], [0, 2, 3]] {
        let shape = Shape::triangle(corners[tri[0]], corners[tri[1]], corners[tri[2]]);
        scene.add_primitive(Primitive::emissive(
            shape,
            material.clone(),
            Transform::identity(),
            emission,
            false,
        ));
    }
}

/// Classic red/green box with a ceiling light, spanning `[-1, 1] x [0, 2] x [-1, 1]`.
pub fn cornell_box(width: u32, height: u32) -> Scene {
    let camera = Camera::new(
        point3f!(0, 1, 3.9),
        point3f!(0, 1, 0),
        vec3f!(0, 1, 0),
        FieldOfView::Vertical(39.0),
        (width, height),
    );
    let mut scene = Scene::new(camera);

    let white = Material::matte(Spectrum::uniform(0.73));
    let red = Material::matte(Spectrum::rgb(0.65, 0.05, 0.05));
    let green = Material::matte(Spectrum::rgb(0.12, 0.45, 0.15));

    let walls = [
        // floor, ceiling, back
        (Shape::quad(point3f!(-1, 0, -1), vec3f!(0, 0, 2), vec3f!(2, 0, 0)), &white),
        (Shape::quad(point3f!(-1, 2, -1), vec3f!(2, 0, 0), vec3f!(0, 0, 2)), &white),
        (Shape::quad(point3f!(-1, 0, -1), vec3f!(2, 0, 0), vec3f!(0, 2, 0)), &white),
        // left, right
        (Shape::quad(point3f!(-1, 0, -1), vec3f!(0, 2, 0), vec3f!(0, 0, 2)), &red),
        (Shape::quad(point3f!(1, 0, -1), vec3f!(0, 0, 2), vec3f!(0, 2, 0)), &green),
    ];
    for (shape, material) in walls {
        scene.add_primitive(Primitive::new(shape, (*material).clone(), Transform::identity()));
    }

    let ball = Shape::sphere(point3f!(0, 0, 0), 0.35);
    scene.add_primitive(Primitive::new(
        ball.clone(),
        white.clone(),
        Transform::translate(vec3f!(-0.4, 0.35, -0.3)),
    ));
    scene.add_primitive(Primitive::new(
        ball,
        Material::glass(1.5),
        Transform::translate(vec3f!(0.4, 0.35, 0.3)),
    ));

    ceiling_light(&mut scene, 0.25, 1.98, Spectrum::rgb(17.0, 12.0, 4.0), &white);
    scene
}

/// A camera inside an emissive, diffusely reflecting sphere of radius 5.
///
/// Every surface emits 1 and reflects `albedo`, so a path of at most `D` bounces converges to
/// `sum(albedo^k, k = 0..=D)`.
pub fn furnace(albedo: Float, width: u32, height: u32) -> Scene {
    let camera = Camera::new(
        point3f!(0, 0, 0),
        point3f!(0, 0, -1),
        vec3f!(0, 1, 0),
        FieldOfView::Vertical(60.0),
        (width, height),
    );
    let mut scene = Scene::new(camera);
    scene.add_primitive(Primitive::emissive(
        Shape::sphere(point3f!(0, 0, 0), 5.0),
        Material::matte(Spectrum::uniform(albedo)),
        Transform::identity(),
        Spectrum::uniform(1.0),
        true,
    ));
    scene
}

/// Infinite matte plane at `y = 0` lit by a point light `light_height` above the origin, seen
/// from straight above through a very narrow field of view.
///
/// The radiance leaving the origin towards the camera is `albedo / pi * intensity / light_height^2`.
pub fn lit_plane(albedo: Float, intensity: Float, light_height: Float, width: u32, height: u32) -> Scene {
    let camera = Camera::new(
        point3f!(0, light_height * 2.0, 0),
        point3f!(0, 0, 0),
        vec3f!(0, 0, -1),
        FieldOfView::Vertical(0.5),
        (width, height),
    );
    let mut scene = Scene::new(camera);
    scene.add_primitive(Primitive::new(
        Shape::plane(point3f!(0, 0, 0), vec3f!(0, 1, 0)),
        Material::matte(Spectrum::uniform(albedo)),
        Transform::identity(),
    ));
    scene.add_light(Light::point(point3f!(0, light_height, 0), Spectrum::uniform(intensity)));
    scene
}

fn ground(scene: &mut Scene) {
    let checker = Texture::checkerboard(8.0, Spectrum::uniform(0.8), Spectrum::uniform(0.2));
    scene.add_primitive(Primitive::new(
        Shape::plane(point3f!(0, 0, 0), vec3f!(0, 1, 0)),
        Material::matte_textured(checker),
        Transform::identity(),
    ));
}

/// A row of spheres showing off the material kinds, lit by `environment` (uniform grey when absent).
pub fn spheres(width: u32, height: u32, environment: Option<Arc<Light>>) -> Scene {
    let camera = Camera::new(
        point3f!(0, 1.5, 6),
        point3f!(0, 0.5, 0),
        vec3f!(0, 1, 0),
        FieldOfView::Horizontal(50.0),
        (width, height),
    );
    let mut scene = Scene::new(camera);
    ground(&mut scene);

    let unit = Shape::sphere(point3f!(0, 0, 0), 0.5);
    let tex = |s: Spectrum| Texture::constant(s);
    let materials = [
        Material::plastic(Spectrum::rgb(0.1, 0.2, 0.6), Spectrum::uniform(0.25), 0.3),
        Material::gold(0.2),
        Material::glass(1.5),
        Material::mirror(),
        Arc::new(Material::Substrate {
            kd: tex(Spectrum::rgb(0.5, 0.1, 0.1)),
            ks: tex(Spectrum::uniform(0.04)),
            u_roughness: 0.1,
            v_roughness: 0.1,
        }),
        Arc::new(Material::Disney {
            base_color: tex(Spectrum::rgb(0.8, 0.5, 0.2)),
            metallic: 0.3,
            roughness: 0.4,
            specular: 0.5,
            clearcoat: 0.5,
            clearcoat_gloss: 0.8,
        }),
    ];
    let n = materials.len() as Float;
    for (i, material) in materials.into_iter().enumerate() {
        let x = (i as Float - (n - 1.0) / 2.0) * 1.2;
        scene.add_primitive(Primitive::new(
            unit.clone(),
            material,
            Transform::translate(vec3f!(x, 0.5, 0)),
        ));
    }

    scene.add_light(environment.unwrap_or_else(|| Light::uniform_environment(Spectrum::uniform(0.8))));
    scene.add_light(Light::point(point3f!(2, 4, 3), Spectrum::uniform(20.0)));
    scene
}

/// Spheres under an afternoon daylight sky and matching sun.
pub fn sky(width: u32, height: u32) -> Scene {
    let camera = Camera::new(
        point3f!(0, 1.2, 5),
        point3f!(0, 0.5, 0),
        vec3f!(0, 1, 0),
        FieldOfView::Horizontal(55.0),
        (width, height),
    );
    let mut scene = Scene::new(camera);
    ground(&mut scene);

    let sun = vec3f!(0.5, 0.6, 0.3);
    scene.add_light(Light::sky(sun, 3.0));
    scene.add_light(Light::directional(-sun, Spectrum::uniform(3.0)));

    scene.add_primitive(Primitive::new(
        Shape::sphere(point3f!(-0.7, 0.5, 0), 0.5),
        Arc::new(Material::ClearCoat { base: Texture::constant(Spectrum::rgb(0.7, 0.1, 0.1)), eta: 1.5, roughness: 0.05 }),
        Transform::identity(),
    ));
    scene.add_primitive(Primitive::new(
        Shape::sphere(point3f!(0.7, 0.5, 0), 0.5),
        Arc::new(Material::Glossy { ks: Texture::constant(Spectrum::rgb(0.9, 0.9, 0.6)), roughness: 0.35 }),
        Transform::identity(),
    ));
    scene
}

/// Standard material ball used for thumbnails.
pub fn material_preview(material: Arc<Material>, size: u32) -> Scene {
    let camera = Camera::new(
        point3f!(0, 0.6, 3.2),
        point3f!(0, 0.4, 0),
        vec3f!(0, 1, 0),
        FieldOfView::Vertical(30.0),
        (size, size),
    );
    let mut scene = Scene::new(camera);
    ground(&mut scene);
    scene.add_primitive(Primitive::new(
        Shape::sphere(Point3f::new(0.0, 0.5, 0.0), 0.5),
        material,
        Transform::identity(),
    ));
    scene.add_light(Light::uniform_environment(Spectrum::uniform(0.6)));
    scene.add_light(Light::point(point3f!(1.5, 3, 2), Spectrum::uniform(12.0)));
    scene
}
