use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use lumen::bvh::{Bvh, PrimRef};
use lumen::compiler::primitives::world_bounds;
use lumen::compiler::{CompileOptions, CompiledScene};
use lumen::geometry::Transform;
use lumen::kernel::camera::generate_ray;
use lumen::scene::{test_scenes, Material, Primitive, Scene, Shape};
use lumen::spectrum::Spectrum;
use lumen::{point3f, vec3f, Float, Point2f};

/// A grid of small spheres over the cornell box, enough to give the hierarchy some depth.
fn busy_scene(n: usize) -> Scene {
    let mut scene = test_scenes::cornell_box(256, 256);
    let ball = Shape::sphere(point3f!(0, 0, 0), 0.04);
    let matte = Material::matte(Spectrum::uniform(0.6));
    for i in 0..n {
        for j in 0..n {
            let x = -0.9 + 1.8 * i as Float / n as Float;
            let z = -0.9 + 1.8 * j as Float / n as Float;
            scene.add_primitive(Primitive::new(
                ball.clone(),
                matte.clone(),
                Transform::translate(vec3f!(x, 0.04 + 0.5 * ((i + j) % 3) as Float, z)),
            ));
        }
    }
    scene
}

fn prim_refs(scene: &Scene) -> Vec<PrimRef> {
    let mut refs = Vec::new();
    for (prim, p) in scene.primitives().iter().enumerate() {
        for (part, bounds) in world_bounds(&p.shape, &p.transform).unwrap_or_default().into_iter().enumerate() {
            refs.push(PrimRef { prim: prim as u32, part: part as u32, bounds });
        }
    }
    refs
}

fn bench(c: &mut Criterion) {
    let scene = busy_scene(24);
    let options = CompileOptions::default();

    let mut group = c.benchmark_group("Compile");
    group.bench_function("cornell + 576 spheres", |b| {
        b.iter(|| CompiledScene::compile(&scene, &options).unwrap())
    });
    let refs = prim_refs(&scene);
    group.throughput(Throughput::Elements(refs.len() as u64));
    group.bench_function("bvh build", |b| {
        b.iter_batched(|| refs.clone(), |refs| Bvh::build(&refs), BatchSize::SmallInput)
    });
    group.finish();

    let compiled = CompiledScene::compile(&scene, &options).unwrap();
    let view = compiled.view();
    let (width, height) = compiled.resolution();
    let mut rng = Xoshiro256Plus::seed_from_u64(1);

    let mut group = c.benchmark_group("Traversal");
    group.throughput(Throughput::Elements(1));
    group.bench_function("nearest hit", |b| {
        b.iter(|| {
            let (x, y) = (rng.gen_range(0..width), rng.gen_range(0..height));
            let u = Point2f::new(rng.gen(), rng.gen());
            let ray = generate_ray(&view.camera, x, y, u, Point2f::new(0.5, 0.5));
            view.intersect(&ray, 0.0, Float::INFINITY)
        })
    });
    group.bench_function("any hit", |b| {
        b.iter(|| {
            let (x, y) = (rng.gen_range(0..width), rng.gen_range(0..height));
            let ray = generate_ray(&view.camera, x, y, Point2f::new(0.5, 0.5), Point2f::new(0.5, 0.5));
            view.occluded(&ray, 0.0, 10.0)
        })
    });
    group.finish();
}

criterion_group!(benches, bench);
criterion_main!(benches);
