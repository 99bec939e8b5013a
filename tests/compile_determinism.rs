//! Properties of scene compilation: determinism, offset tiling, record round trips and BVH
//! containment.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context;
use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;

use lumen::compiler::layout::{self, NodeKind};
use lumen::compiler::primitives::world_bounds;
use lumen::compiler::shapes::{record_len, shape_kind};
use lumen::compiler::{CompileOptions, CompiledScene, LightKind, PackedRef, ShapeKind};
use lumen::geometry::Transform;
use lumen::scene::{test_scenes, Camera, Light, Material, Primitive, Scene, Shape, TriangleMesh};
use lumen::spectrum::Spectrum;
use lumen::{point3f, vec3f, Float, Point3f};

fn bits(words: &[Float]) -> Vec<u32> {
    words.iter().map(|w| w.to_bits()).collect()
}

fn array_bits(arrays: &[Vec<Float>]) -> Vec<Vec<u32>> {
    arrays.iter().map(|a| bits(a)).collect()
}

fn compile(scene: &Scene) -> anyhow::Result<CompiledScene> {
    Ok(CompiledScene::compile(scene, &CompileOptions::default())?)
}

/// Shapes of every kind, including two meshes of different sizes and a shared sphere.
fn mixed_scene() -> Scene {
    let mut scene = Scene::new(Camera::default());
    let matte = Material::matte(Spectrum::uniform(0.5));
    let sphere = Shape::sphere(point3f!(0.25, -0.5, 1), 0.75);
    let fan = Shape::mesh(TriangleMesh {
        positions: vec![
            point3f!(0, 0, 0),
            point3f!(1, 0, 0),
            point3f!(1, 1, 0),
            point3f!(0, 1, 0),
            point3f!(-1, 1, 0),
        ],
        normals: None,
        uvs: None,
        indices: vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]],
    });

    scene.add_primitive(Primitive::new(sphere.clone(), matte.clone(), Transform::identity()));
    scene.add_primitive(Primitive::new(sphere, matte.clone(), Transform::translate(vec3f!(3, 0, 0))));
    scene.add_primitive(Primitive::new(
        Shape::quad(point3f!(-2, 0, -2), vec3f!(4, 0, 0), vec3f!(0, 0, 4)),
        matte.clone(),
        Transform::identity(),
    ));
    scene.add_primitive(Primitive::new(fan, Material::gold(0.3), Transform::rotate(30.0, vec3f!(0, 1, 0))));
    scene.add_primitive(Primitive::new(
        Shape::triangle(point3f!(0, 2, 0), point3f!(1, 2, 0), point3f!(0, 3, 1)),
        Material::glass(1.5),
        Transform::scale(2.0, 1.0, 0.5),
    ));
    scene.add_primitive(Primitive::new(
        Shape::sphere(point3f!(0, 0, 0), 0.2),
        Material::mirror(),
        Transform::translate(vec3f!(0, 4, -1)),
    ));
    scene.add_primitive(Primitive::new(
        Shape::plane(point3f!(0, -1, 0), vec3f!(0, 1, 0)),
        matte,
        Transform::identity(),
    ));
    scene.add_light(Light::point(point3f!(1, 5, 2), Spectrum::rgb(10.0, 8.0, 6.0)));
    scene.add_light(Light::uniform_environment(Spectrum::uniform(0.1)));
    scene
}

#[test]
fn compiling_twice_is_bit_identical() -> anyhow::Result<()> {
    for scene in [test_scenes::cornell_box(32, 24), mixed_scene(), test_scenes::sky(16, 16)] {
        let a = compile(&scene)?;
        let b = compile(&scene)?;

        assert_eq!(array_bits(a.shapes().arrays()), array_bits(b.shapes().arrays()));
        assert_eq!(array_bits(a.textures().arrays()), array_bits(b.textures().arrays()));
        assert_eq!(array_bits(a.materials().arrays()), array_bits(b.materials().arrays()));
        assert_eq!(array_bits(a.lights().arrays()), array_bits(b.lights().arrays()));
        assert_eq!(bits(a.primitives()), bits(b.primitives()));

        assert_eq!(a.shapes().index(), b.shapes().index());
        assert_eq!(a.textures().index(), b.textures().index());
        assert_eq!(a.materials().index(), b.materials().index());
        assert_eq!(a.lights().index(), b.lights().index());
        assert_eq!(a.lights().infinite(), b.lights().infinite());

        assert_eq!(a.bvh().nodes(), b.bvh().nodes());
        assert_eq!(a.bvh().refs(), b.bvh().refs());
        assert_eq!(a.unbounded(), b.unbounded());
    }
    Ok(())
}

#[test]
fn shape_offsets_tile_each_kind_array() -> anyhow::Result<()> {
    let scene = mixed_scene();
    let compiled = compile(&scene)?;
    let cache = compiled.node_cache();

    for &kind in ShapeKind::ALL {
        let mut records: Vec<(usize, usize)> = Vec::new();
        for shape in cache.distinct::<Shape>() {
            if shape_kind(shape) != kind {
                continue;
            }
            let packed = compiled.shapes().find_offset_for(cache, shape)?;
            assert_eq!(packed.kind(), kind.id());
            records.push((packed.offset(), record_len(shape)));
        }
        records.sort_unstable();

        let offsets: HashSet<usize> = records.iter().map(|&(offset, _)| offset).collect();
        assert_eq!(offsets.len(), records.len(), "{} offsets are not distinct", kind.name());

        let mut expected = 0;
        for &(offset, len) in &records {
            assert_eq!(offset, expected, "{} records leave a gap", kind.name());
            expected += len;
        }
        assert_eq!(expected, compiled.shapes().array(kind).len());
    }
    Ok(())
}

#[test]
fn shared_instances_compile_once() -> anyhow::Result<()> {
    let scene = mixed_scene();
    let compiled = compile(&scene)?;
    let cache = compiled.node_cache();

    // the sphere shared by the first two primitives plus the mirror ball
    assert_eq!(compiled.shapes().array(ShapeKind::Sphere).len(), 2 * layout::sphere::LEN);

    let prims = scene.primitives();
    let first = compiled.shapes().find_offset_for(cache, &prims[0].shape)?;
    let second = compiled.shapes().find_offset_for(cache, &prims[1].shape)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn records_recover_defining_fields() -> anyhow::Result<()> {
    let scene = mixed_scene();
    let compiled = compile(&scene)?;
    let cache = compiled.node_cache();
    let view = compiled.view();

    let sphere = scene.primitives()[0].shape.clone();
    let packed = compiled.shapes().find_offset_for(cache, &sphere)?;
    let record = view.shape_record(packed).context("sphere record")?;
    let center = layout::read3(record, layout::sphere::CENTER);
    assert_abs_diff_eq!(center[0], 0.25, epsilon = 1e-6);
    assert_abs_diff_eq!(center[1], -0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(center[2], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(record[layout::sphere::RADIUS], 0.75, epsilon = 1e-6);

    let triangle = scene.primitives()[4].shape.clone();
    let packed = compiled.shapes().find_offset_for(cache, &triangle)?;
    let record = view.shape_record(packed).context("triangle record")?;
    let p2 = layout::read3(record, layout::triangle::P2);
    assert_eq!(Point3f::from(p2), point3f!(0, 3, 1));

    let light = scene.lights()[0].clone();
    let packed = compiled.lights().find_offset_for(cache, &light)?;
    let (kind, record) = view.light_record(packed).context("light record")?;
    assert_eq!(kind, LightKind::Point);
    let position = layout::read3(record, layout::point_light::POSITION);
    let intensity = layout::read3(record, layout::point_light::INTENSITY);
    assert_eq!(position, [1.0, 5.0, 2.0]);
    assert_abs_diff_eq!(intensity[0], 10.0, epsilon = 1e-6);
    assert_abs_diff_eq!(intensity[1], 8.0, epsilon = 1e-6);
    assert_abs_diff_eq!(intensity[2], 6.0, epsilon = 1e-6);

    // the primitive record points back at the shared sphere and its matte material
    let prim = view.primitive(1).context("primitive record")?;
    assert_eq!(prim.shape, compiled.shapes().find_offset_for(cache, &sphere)?);
    assert_eq!(
        prim.material,
        compiled.materials().find_offset_for(cache, &scene.primitives()[1].material)?
    );
    assert_eq!(prim.light, PackedRef::NONE);
    Ok(())
}

#[test]
fn zero_lights_compile_to_empty_arrays() -> anyhow::Result<()> {
    let mut scene = Scene::new(Camera::default());
    scene.add_primitive(Primitive::new(
        Shape::sphere(point3f!(0, 0, 0), 1.0),
        Material::matte(Spectrum::uniform(0.5)),
        Transform::identity(),
    ));
    let compiled = compile(&scene)?;

    assert!(compiled.lights().is_empty());
    assert!(compiled.lights().index().is_empty());
    assert!(compiled.lights().infinite().is_empty());
    for &kind in LightKind::ALL {
        assert!(compiled.lights().array(kind).is_empty(), "{} array not empty", kind.name());
    }
    Ok(())
}

#[test]
fn hierarchy_nodes_enclose_what_they_reference() -> anyhow::Result<()> {
    for scene in [test_scenes::cornell_box(8, 8), mixed_scene(), test_scenes::spheres(8, 8, None)] {
        let compiled = compile(&scene)?;
        let bvh = compiled.bvh();
        assert!(bvh.refs().len() > 2);
        let root = bvh.nodes().first().context("built hierarchy has a root node")?.bounds();

        let mut parts = HashMap::new();
        for (index, prim) in scene.primitives().iter().enumerate() {
            let Some(bounds) = world_bounds(&prim.shape, &prim.transform) else {
                continue;
            };
            for (part, b) in bounds.into_iter().enumerate() {
                assert!(root.contains(&b, 1e-4), "{:?} outside root {:?}", b, root);
                parts.insert([index as u32, part as u32], b);
            }
        }
        assert_eq!(parts.len(), bvh.refs().len());

        // every node encloses its children, every leaf the parts it lists
        for node in bvh.nodes() {
            let outer = node.bounds();
            let first = node.left_or_first as usize;
            if node.is_leaf() {
                for item in &bvh.refs()[first..first + node.count as usize] {
                    let inner = parts.get(item).context("leaf references a bounded part")?;
                    assert!(outer.contains(inner, 1e-4), "{:?} outside leaf {:?}", inner, outer);
                }
            } else {
                for child in &bvh.nodes()[first..first + 2] {
                    assert!(outer.contains(&child.bounds(), 1e-4));
                }
            }
        }
    }
    Ok(())
}

#[test]
fn area_light_on_shared_shape_keeps_instance_identity() -> anyhow::Result<()> {
    let mut scene = test_scenes::cornell_box(8, 8);
    let before = compile(&scene)?;
    let lights = before.lights().len();

    let shared = Arc::clone(&scene.primitives()[0].shape);
    scene.add_primitive(Primitive::new(shared, Material::mirror(), Transform::translate(vec3f!(0, 0.01, 0))));
    let after = compile(&scene)?;
    assert_eq!(after.lights().len(), lights);
    assert_eq!(
        after.shapes().array(ShapeKind::Mesh).len(),
        before.shapes().array(ShapeKind::Mesh).len()
    );
    Ok(())
}
