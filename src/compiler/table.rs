use std::marker::PhantomData;
use std::sync::Arc;

use crate::compiler::layout::{NodeKind, PackedRef};
use crate::compiler::node_cache::{CachedNode, NodeCache, NodeId, RecordLength};
use crate::error::CompileError;
use crate::Float;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Unset,
    Compiled(PackedRef),
    Filtered,
}

/// Per-kind flat arrays of one node type, with the identity lookup and the aggregate index.
///
/// The shape, texture and material compilers are this table with a `setup` of their own.
pub struct KindTable<T, K> {
    arrays: Vec<Vec<Float>>,
    slots: Vec<Slot>,
    index: Vec<PackedRef>,
    _ty: PhantomData<fn() -> (T, K)>,
}

impl<T: CachedNode, K: NodeKind> KindTable<T, K> {
    pub fn new() -> Self {
        Self {
            arrays: vec![Vec::new(); K::count()],
            slots: Vec::new(),
            index: Vec::new(),
            _ty: PhantomData,
        }
    }

    /// Drops everything from a previous setup.
    pub(crate) fn clear(&mut self, cache: &NodeCache) {
        self.arrays.clear();
        self.arrays.resize(K::count(), Vec::new());
        self.slots.clear();
        self.slots.resize(cache.list::<T>().len(), Slot::Unset);
        self.index.clear();
    }

    /// Packs every instance accepted by `select` into the array for `kind`. Offsets come from
    /// the node cache and `encode` must append exactly `len` words per instance.
    pub(crate) fn pack_kind(
        &mut self,
        cache: &NodeCache,
        kind: K,
        select: impl Fn(&T) -> bool,
        len: RecordLength<'_, T>,
        mut encode: impl FnMut(NodeId<T>, &T, &mut Vec<Float>) -> Result<(), CompileError>,
    ) -> Result<(), CompileError> {
        let offsets = cache.offsets::<T>(select, len);
        let nodes = cache.distinct::<T>();
        let array = &mut self.arrays[kind.id() as usize];
        array.reserve(offsets.total_len());

        for (id, offset) in offsets.iter() {
            let packed = PackedRef::new(kind.id(), offset).ok_or(CompileError::OffsetOverflow {
                type_name: T::TYPE_NAME,
                kind: kind.name(),
                len: offset,
            })?;
            debug_assert_eq!(array.len(), offset);
            encode(id, &nodes[id.index()], array)?;
            self.slots[id.index()] = Slot::Compiled(packed);
        }
        debug_assert_eq!(array.len(), offsets.total_len());

        tracing::trace!(
            type_name = T::TYPE_NAME,
            kind = kind.name(),
            instances = offsets.len(),
            words = array.len(),
            "packed kind"
        );
        Ok(())
    }

    pub(crate) fn mark_filtered(&mut self, id: NodeId<T>) {
        self.slots[id.index()] = Slot::Filtered;
    }

    /// Builds the aggregate index in node cache order.
    pub(crate) fn finish(&mut self) {
        self.index = self
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Compiled(r) => Some(*r),
                _ => None,
            })
            .collect();
    }

    /// The packed `(kind, offset)` of a compiled instance. Asking for an instance that was never
    /// registered, or one that was filtered out, is an error.
    pub fn find_offset_for(&self, cache: &NodeCache, node: &Arc<T>) -> Result<PackedRef, CompileError> {
        self.lookup(cache, node)?
            .ok_or(CompileError::FilteredNode { type_name: T::TYPE_NAME })
    }

    /// Like [`find_offset_for`](Self::find_offset_for) but a filtered instance is `None`.
    pub fn lookup(&self, cache: &NodeCache, node: &Arc<T>) -> Result<Option<PackedRef>, CompileError> {
        let id = cache.id_of(node)?;
        match self.slots.get(id.index()) {
            Some(Slot::Compiled(r)) => Ok(Some(*r)),
            Some(Slot::Filtered) => Ok(None),
            _ => Err(CompileError::UnregisteredNode { type_name: T::TYPE_NAME }),
        }
    }

    pub fn array(&self, kind: K) -> &[Float] {
        &self.arrays[kind.id() as usize]
    }

    /// All per-kind arrays, indexed by kind id.
    pub fn arrays(&self) -> &[Vec<Float>] {
        &self.arrays
    }

    /// Packed references to every compiled instance.
    pub fn index(&self) -> &[PackedRef] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn total_words(&self) -> usize {
        self.arrays.iter().map(Vec::len).sum()
    }
}

impl<T: CachedNode, K: NodeKind> Default for KindTable<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends a spectrum or point as three words.
pub(crate) fn push3(out: &mut Vec<Float>, v: [Float; 3]) {
    out.extend_from_slice(&v);
}
