//! The authoring-side scene graph.
//!
//! Shapes, materials, textures and lights are shared between primitives through `Arc`. Sharing is
//! by identity: two primitives holding clones of the same `Arc<Material>` compile to a single
//! material record. Nodes are immutable once shared; editing a scene means replacing nodes through
//! the [`Scene`] mutators, which bump its revision.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::geometry::Transform;
use crate::spectrum::Spectrum;

pub mod shape;
pub mod material;
pub mod texture;
pub mod light;
pub mod camera;
pub mod test_scenes;

pub use shape::*;
pub use material::*;
pub use texture::*;
pub use light::*;
pub use camera::*;

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

/// A shape placed in the world with a material and an optional area light.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub shape: Arc<Shape>,
    pub material: Arc<Material>,
    pub transform: Transform,
    pub area_light: Option<Arc<Light>>,
}

impl Primitive {
    pub fn new(shape: Arc<Shape>, material: Arc<Material>, transform: Transform) -> Self {
        Self { shape, material, transform, area_light: None }
    }

    /// A primitive that also emits `emission` from its surface.
    pub fn emissive(
        shape: Arc<Shape>,
        material: Arc<Material>,
        transform: Transform,
        emission: Spectrum,
        two_sided: bool,
    ) -> Self {
        let light = Arc::new(Light::Area(AreaLight {
            shape: shape.clone(),
            emission,
            two_sided,
        }));
        Self { shape, material, transform, area_light: Some(light) }
    }

    pub fn with_area_light(mut self, light: Arc<Light>) -> Self {
        self.area_light = Some(light);
        self
    }
}

/// Primitives, standalone lights and a camera.
#[derive(Debug)]
pub struct Scene {
    id: u64,
    revision: u64,
    primitives: Vec<Primitive>,
    lights: Vec<Arc<Light>>,
    camera: Camera,
}

/// A clone is a separate scene: it gets its own id, so edits to either side never match the
/// other's compiled state.
impl Clone for Scene {
    fn clone(&self) -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            revision: self.revision,
            primitives: self.primitives.clone(),
            lights: self.lights.clone(),
            camera: self.camera.clone(),
        }
    }
}

impl Scene {
    pub fn new(camera: Camera) -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            revision: 0,
            primitives: Vec::new(),
            lights: Vec::new(),
            camera,
        }
    }

    /// Process-unique identifier of this scene.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bumped by every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn lights(&self) -> &[Arc<Light>] {
        &self.lights
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn add_primitive(&mut self, primitive: Primitive) -> usize {
        self.revision += 1;
        self.primitives.push(primitive);
        self.primitives.len() - 1
    }

    pub fn remove_primitive(&mut self, index: usize) -> Option<Primitive> {
        if index >= self.primitives.len() {
            return None;
        }
        self.revision += 1;
        Some(self.primitives.remove(index))
    }

    pub fn add_light(&mut self, light: Arc<Light>) -> usize {
        self.revision += 1;
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn remove_light(&mut self, index: usize) -> Option<Arc<Light>> {
        if index >= self.lights.len() {
            return None;
        }
        self.revision += 1;
        Some(self.lights.remove(index))
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.revision += 1;
        self.camera = camera;
    }
}
