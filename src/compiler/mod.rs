//! Flattening of a [`Scene`] into the immutable arrays the kernel reads.
//!
//! Compilation runs the per-type compilers in dependency order against one [`NodeCache`] pass:
//! textures, shapes, materials (embedding texture offsets), lights (embedding shape offsets),
//! the primitive table, the BVH and finally the camera record. The result is a
//! [`CompiledScene`] that is never mutated again; a scene edit produces a new one.

use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::InnerSpace;

use crate::bvh::{Bvh, BvhView};
use crate::error::CompileError;
use crate::kernel::SceneView;
use crate::scene::{Camera, PixelSampling, Scene};
use crate::Float;

pub mod layout;
pub mod node_cache;
mod table;
pub mod shapes;
pub mod materials;
pub mod lights;
pub mod primitives;

pub use layout::{CameraRecord, LightKind, MaterialKind, NodeKind, PackedRef, ShapeKind, TextureKind};
pub use lights::LightCompiler;
pub use materials::{MaterialCompiler, TextureCompiler};
pub use node_cache::{NodeCache, OffsetMap, RecordLength};
pub use shapes::ShapeCompiler;
pub use table::KindTable;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// What to do with an area light whose shape the area-light sampler cannot handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AreaLightPolicy {
    /// Leave the light out of the render and log a warning.
    #[default]
    Skip,
    /// Fail compilation.
    Strict,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub area_light_policy: AreaLightPolicy,
}

/// Every flat array of one compiled scene, plus the scene revision it was built from.
pub struct CompiledScene {
    generation: u64,
    scene_id: u64,
    scene_revision: u64,
    node_cache: NodeCache,
    shapes: ShapeCompiler,
    textures: TextureCompiler,
    materials: MaterialCompiler,
    lights: LightCompiler,
    primitives: Vec<Float>,
    primitive_count: usize,
    bvh: Bvh,
    unbounded: Vec<u32>,
    camera: CameraRecord,
}

impl CompiledScene {
    #[tracing::instrument(skip_all, fields(scene = scene.id(), revision = scene.revision()))]
    pub fn compile(scene: &Scene, options: &CompileOptions) -> Result<Self, CompileError> {
        let node_cache = NodeCache::build(scene);

        let mut textures = TextureCompiler::new();
        textures.setup(&node_cache)?;
        let mut shapes = ShapeCompiler::new();
        shapes.setup(&node_cache)?;
        let mut materials = MaterialCompiler::new();
        materials.setup(&node_cache, &textures)?;

        let owners = primitives::area_light_owners(&node_cache, scene.primitives())?;
        let mut lights = LightCompiler::new();
        lights.setup(&node_cache, &shapes, &owners, options.area_light_policy)?;

        let table = primitives::compile_primitives(scene.primitives(), &node_cache, &shapes, &materials, &lights)?;
        let bvh = Bvh::build(&table.refs);
        let camera = camera_record(scene.camera())?;

        let compiled = Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            scene_id: scene.id(),
            scene_revision: scene.revision(),
            node_cache,
            shapes,
            textures,
            materials,
            lights,
            primitives: table.records,
            primitive_count: scene.primitives().len(),
            bvh,
            unbounded: table.unbounded,
            camera,
        };

        tracing::info!(
            generation = compiled.generation,
            primitives = compiled.primitive_count,
            shapes = compiled.shapes.len(),
            materials = compiled.materials.len(),
            textures = compiled.textures.len(),
            lights = compiled.lights.len(),
            filtered_lights = compiled.lights.filtered(),
            bvh_nodes = compiled.bvh.nodes().len(),
            "compiled scene"
        );
        Ok(compiled)
    }

    /// Process-unique number of this compilation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn scene_id(&self) -> u64 {
        self.scene_id
    }

    pub fn scene_revision(&self) -> u64 {
        self.scene_revision
    }

    /// Whether this bundle was compiled from the current state of `scene`.
    pub fn is_current_for(&self, scene: &Scene) -> bool {
        self.scene_id == scene.id() && self.scene_revision == scene.revision()
    }

    pub fn node_cache(&self) -> &NodeCache {
        &self.node_cache
    }

    pub fn shapes(&self) -> &ShapeCompiler {
        &self.shapes
    }

    pub fn textures(&self) -> &TextureCompiler {
        &self.textures
    }

    pub fn materials(&self) -> &MaterialCompiler {
        &self.materials
    }

    pub fn lights(&self) -> &LightCompiler {
        &self.lights
    }

    /// Primitive records, [`layout::primitive::LEN`] words each, in scene order.
    pub fn primitives(&self) -> &[Float] {
        &self.primitives
    }

    pub fn primitive_count(&self) -> usize {
        self.primitive_count
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Primitives with unbounded shapes, tested outside the BVH.
    pub fn unbounded(&self) -> &[u32] {
        &self.unbounded
    }

    pub fn camera(&self) -> &CameraRecord {
        &self.camera
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.camera.width, self.camera.height)
    }

    pub fn view(&self) -> SceneView<'_> {
        let mut view = SceneView::empty(self.camera);
        for (slot, array) in view.shapes.iter_mut().zip(self.shapes.arrays()) {
            *slot = array;
        }
        for (slot, array) in view.textures.iter_mut().zip(self.textures.arrays()) {
            *slot = array;
        }
        for (slot, array) in view.materials.iter_mut().zip(self.materials.arrays()) {
            *slot = array;
        }
        for (slot, array) in view.lights.iter_mut().zip(self.lights.arrays()) {
            *slot = array;
        }
        view.light_index = self.lights.index();
        view.infinite_lights = self.lights.infinite();
        view.primitives = &self.primitives;
        view.bvh = BvhView { nodes: self.bvh.nodes(), refs: self.bvh.refs() };
        view.unbounded = &self.unbounded;
        view
    }
}

/// Camera basis scaled by the field of view.
pub fn camera_record(camera: &Camera) -> Result<CameraRecord, CompileError> {
    let (width, height) = camera.resolution;
    if width == 0 || height == 0 {
        return Err(CompileError::InvalidCamera(format!("resolution {}x{}", width, height)));
    }
    let forward = camera.look_at - camera.position;
    if forward.magnitude2() == 0.0 {
        return Err(CompileError::InvalidCamera("camera looks at its own position".to_string()));
    }
    let forward = forward.normalize();
    let right = forward.cross(camera.up);
    if right.magnitude2() < 1e-12 {
        return Err(CompileError::InvalidCamera("up vector is parallel to the view direction".to_string()));
    }
    let right = right.normalize();
    let up = right.cross(forward);
    let (tan_x, tan_y) = camera.tan_half_fov();
    if !(tan_x > 0.0 && tan_y > 0.0 && tan_x.is_finite() && tan_y.is_finite()) {
        return Err(CompileError::InvalidCamera("field of view must be in (0, 180) degrees".to_string()));
    }

    Ok(CameraRecord {
        position: camera.position.into(),
        width,
        right: (right * tan_x).into(),
        height,
        up: (up * tan_y).into(),
        sampling: match camera.sampling {
            PixelSampling::Jittered => 0,
            PixelSampling::Center => 1,
        },
        forward: forward.into(),
        lens_radius: camera.lens_radius.max(0.0),
        focal_distance: camera.focal_distance.max(1e-4),
        _pad: [0; 3],
    })
}
