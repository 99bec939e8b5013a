//! Identity-based deduplication of scene nodes.
//!
//! The cache walks the scene once, depth-first in primitive declaration order, and assigns every
//! distinct node instance a dense [`Id`]. Two `Arc`s pointing at the same allocation are the same
//! instance no matter how often they appear; two equal values in different allocations are not.
//! The cache holds a clone of every `Arc`, so the addresses used as identity keys stay valid for
//! its lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CompileError;
use crate::id_arena::{Id, IdArena};
use crate::scene::{Light, Material, Scene, Shape, Texture};

pub type NodeId<T> = Id<Arc<T>>;

/// Distinct instances of one node type in first-visit order.
pub struct NodeList<T> {
    arena: IdArena<Arc<T>>,
    by_address: HashMap<usize, NodeId<T>>,
}

impl<T> NodeList<T> {
    fn new() -> Self {
        Self { arena: IdArena::new(), by_address: HashMap::new() }
    }

    fn address(node: &Arc<T>) -> usize {
        Arc::as_ptr(node) as *const () as usize
    }

    /// Returns the id and whether this was the first visit.
    fn register(&mut self, node: &Arc<T>) -> (NodeId<T>, bool) {
        let key = Self::address(node);
        if let Some(&id) = self.by_address.get(&key) {
            return (id, false);
        }
        let id = self.arena.insert(node.clone());
        self.by_address.insert(key, id);
        (id, true)
    }

    pub fn distinct(&self) -> &[Arc<T>] {
        self.arena.items()
    }

    pub fn get(&self, node: &Arc<T>) -> Option<NodeId<T>> {
        self.by_address.get(&Self::address(node)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId<T>, &Arc<T>)> {
        self.arena.iter()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

/// Node types the cache indexes.
pub trait CachedNode: Sized + 'static {
    const TYPE_NAME: &'static str;

    fn list(cache: &NodeCache) -> &NodeList<Self>;
}

impl CachedNode for Shape {
    const TYPE_NAME: &'static str = "Shape";

    fn list(cache: &NodeCache) -> &NodeList<Self> {
        &cache.shapes
    }
}

impl CachedNode for Material {
    const TYPE_NAME: &'static str = "Material";

    fn list(cache: &NodeCache) -> &NodeList<Self> {
        &cache.materials
    }
}

impl CachedNode for Texture {
    const TYPE_NAME: &'static str = "Texture";

    fn list(cache: &NodeCache) -> &NodeList<Self> {
        &cache.textures
    }
}

impl CachedNode for Light {
    const TYPE_NAME: &'static str = "Light";

    fn list(cache: &NodeCache) -> &NodeList<Self> {
        &cache.lights
    }
}

/// How many words each instance occupies in its flat array.
pub enum RecordLength<'a, T> {
    Fixed(usize),
    PerInstance(&'a dyn Fn(&T) -> usize),
}

impl<'a, T> RecordLength<'a, T> {
    fn of(&self, node: &T) -> usize {
        match self {
            RecordLength::Fixed(len) => *len,
            RecordLength::PerInstance(f) => f(node),
        }
    }
}

/// Cumulative offsets of the selected instances of one type, in cache order.
pub struct OffsetMap<T> {
    entries: Vec<(NodeId<T>, usize)>,
    by_index: Vec<Option<usize>>,
    total_len: usize,
}

impl<T> OffsetMap<T> {
    pub fn get(&self, id: NodeId<T>) -> Option<usize> {
        self.by_index.get(id.index()).copied().flatten()
    }

    /// `(id, offset)` in increasing offset order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId<T>, usize)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of the array the selected instances tile.
    pub fn total_len(&self) -> usize {
        self.total_len
    }
}

/// Distinct shapes, materials, textures and lights reachable from a scene.
pub struct NodeCache {
    shapes: NodeList<Shape>,
    materials: NodeList<Material>,
    textures: NodeList<Texture>,
    lights: NodeList<Light>,
}

impl NodeCache {
    #[tracing::instrument(skip_all, fields(primitives = scene.primitives().len()))]
    pub fn build(scene: &Scene) -> Self {
        let mut cache = Self {
            shapes: NodeList::new(),
            materials: NodeList::new(),
            textures: NodeList::new(),
            lights: NodeList::new(),
        };

        for prim in scene.primitives() {
            cache.shapes.register(&prim.shape);
            cache.visit_material(&prim.material);
            if let Some(light) = &prim.area_light {
                cache.visit_light(light);
            }
        }
        for light in scene.lights() {
            cache.visit_light(light);
        }

        tracing::debug!(
            shapes = cache.shapes.len(),
            materials = cache.materials.len(),
            textures = cache.textures.len(),
            lights = cache.lights.len(),
            "indexed scene nodes"
        );
        cache
    }

    fn visit_material(&mut self, material: &Arc<Material>) {
        let (_, first) = self.materials.register(material);
        if first {
            for tex in material.textures() {
                self.textures.register(tex);
            }
        }
    }

    fn visit_light(&mut self, light: &Arc<Light>) {
        let (_, first) = self.lights.register(light);
        if first {
            if let Light::Area(area) = light.as_ref() {
                self.shapes.register(&area.shape);
            }
        }
    }

    pub fn list<T: CachedNode>(&self) -> &NodeList<T> {
        T::list(self)
    }

    /// Distinct instances of `T` in stable visitation order.
    pub fn distinct<T: CachedNode>(&self) -> &[Arc<T>] {
        T::list(self).distinct()
    }

    /// Fails if `node` was never seen while walking the scene.
    pub fn id_of<T: CachedNode>(&self, node: &Arc<T>) -> Result<NodeId<T>, CompileError> {
        T::list(self)
            .get(node)
            .ok_or(CompileError::UnregisteredNode { type_name: T::TYPE_NAME })
    }

    /// Offsets of the instances of `T` accepted by `filter`, each taking `len` words. The first
    /// selected instance sits at offset 0 and each following one starts where its predecessor
    /// ends.
    pub fn offsets<T: CachedNode>(&self, filter: impl Fn(&T) -> bool, len: RecordLength<'_, T>) -> OffsetMap<T> {
        let list = T::list(self);
        let mut entries = Vec::new();
        let mut by_index = vec![None; list.len()];
        let mut total_len = 0;
        for (id, node) in list.iter() {
            if !filter(node) {
                continue;
            }
            entries.push((id, total_len));
            by_index[id.index()] = Some(total_len);
            total_len += len.of(node);
        }
        OffsetMap { entries, by_index, total_len }
    }
}
