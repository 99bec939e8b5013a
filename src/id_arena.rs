use std::num::NonZeroU32;
use std::marker::PhantomData;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Index;
use std::fmt::{Debug, Formatter};

/// Dense handle into an [`IdArena`]. Ids are assigned in insertion order starting at zero.
pub struct Id<T> {
    idx: NonZeroU32,
    _ty: PhantomData<fn() -> T>
}

// #[derive] bug means we have to impl these manually because of PhantomData
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.idx.cmp(&other.idx)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.idx.hash(state)
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl<T> Id<T> {
    /// Zero-based position of the item in its arena.
    pub fn index(&self) -> usize {
        self.idx.get() as usize - 1
    }
}

pub struct IdArena<T> {
    items: Vec<T>,
}

impl<T> IdArena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> Id<T> {
        self.items.push(item);
        let idx = NonZeroU32::new(self.items.len() as u32)
            .unwrap_or(NonZeroU32::MIN);
        Id {
            idx,
            _ty: PhantomData
        }
    }

    pub fn get(&self, id: Id<T>) -> Option<&T> {
        self.items.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.items.iter().enumerate().filter_map(|(i, item)| {
            NonZeroU32::new(i as u32 + 1).map(|idx| (Id { idx, _ty: PhantomData }, item))
        })
    }
}

impl<T> Default for IdArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<Id<T>> for IdArena<T> {
    type Output = T;

    fn index(&self, index: Id<T>) -> &Self::Output {
        &self.items[index.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense_and_ordered() {
        let mut arena = IdArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert!(a < b);
        assert_eq!(arena[b], "b");
        let collected: Vec<_> = arena.iter().map(|(id, s)| (id.index(), *s)).collect();
        assert_eq!(collected, vec![(0, "a"), (1, "b")]);
    }
}
