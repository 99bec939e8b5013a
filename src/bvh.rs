//! Binned SAH bounding volume hierarchy over primitive references.
//!
//! The tree is a flat array of 32-byte nodes. An internal node stores the index of its left
//! child, the right child follows it. A leaf stores the first index into the reordered reference
//! list and a non-zero count. Zero or one reference produces no nodes at all and queries test the
//! references directly.

use bytemuck::{Pod, Zeroable};
use partition::partition;
use smallvec::SmallVec;

use crate::geometry::{Bounds3f, Ray};
use crate::{Float, Point3f};

const NUM_BINS: usize = 12;
const TRAVERSAL_COST: Float = 1.0;
const MAX_LEAF_SIZE: usize = 4;
/// Ranges larger than this are split even when SAH prefers a leaf.
const MAX_FORCED_LEAF_SIZE: usize = 16;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub min: [f32; 3],
    pub left_or_first: u32,
    pub max: [f32; 3],
    pub count: u32,
}

impl BvhNode {
    fn new(bounds: &Bounds3f, left_or_first: usize, count: usize) -> Self {
        Self {
            min: bounds.min.into(),
            left_or_first: left_or_first as u32,
            max: bounds.max.into(),
            count: count as u32,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    pub fn bounds(&self) -> Bounds3f {
        Bounds3f::with_bounds(Point3f::from(self.min), Point3f::from(self.max))
    }
}

/// One entry in the hierarchy: a primitive, the part of it (a triangle of a mesh, otherwise 0)
/// and its world-space bounds.
#[derive(Clone, Copy, Debug)]
pub struct PrimRef {
    pub prim: u32,
    pub part: u32,
    pub bounds: Bounds3f,
}

struct BuildRef {
    item: [u32; 2],
    bounds: Bounds3f,
    centroid: Point3f,
}

#[derive(Clone, Copy)]
struct Bin {
    bounds: Bounds3f,
    count: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    refs: Vec<[u32; 2]>,
    bounds: Bounds3f,
}

impl Bvh {
    #[tracing::instrument(skip_all, fields(refs = prims.len()))]
    pub fn build(prims: &[PrimRef]) -> Self {
        let bounds = prims.iter().fold(Bounds3f::empty(), |b, p| b.join(&p.bounds));
        if prims.len() <= 1 {
            return Self { nodes: Vec::new(), refs: prims.iter().map(|p| [p.prim, p.part]).collect(), bounds };
        }

        let mut build: Vec<BuildRef> = prims
            .iter()
            .map(|p| BuildRef { item: [p.prim, p.part], bounds: p.bounds, centroid: p.bounds.centroid() })
            .collect();

        let mut nodes = Vec::with_capacity(2 * prims.len());
        nodes.push(BvhNode::zeroed());

        struct Task {
            node: usize,
            start: usize,
            end: usize,
        }
        let mut stack = vec![Task { node: 0, start: 0, end: build.len() }];

        while let Some(Task { node, start, end }) = stack.pop() {
            let range = &mut build[start..end];
            let (node_bounds, centroid_bounds) = range.iter().fold(
                (Bounds3f::empty(), Bounds3f::empty()),
                |(nb, cb), r| (nb.join(&r.bounds), cb.join_point(&r.centroid)),
            );
            let count = range.len();

            if count <= MAX_LEAF_SIZE {
                nodes[node] = BvhNode::new(&node_bounds, start, count);
                continue;
            }

            let split = find_best_split(range, &centroid_bounds, node_bounds.surface_area());
            let mid = match split {
                Some((axis, pos, cost)) if cost < count as Float || count > MAX_FORCED_LEAF_SIZE => {
                    let (left, _) = partition(range, |r| r.centroid[axis] < pos);
                    left.len()
                }
                None if count > MAX_FORCED_LEAF_SIZE => count / 2,
                _ => {
                    nodes[node] = BvhNode::new(&node_bounds, start, count);
                    continue;
                }
            };
            let mid = if mid == 0 || mid == count { count / 2 } else { mid };

            let left = nodes.len();
            nodes.push(BvhNode::zeroed());
            nodes.push(BvhNode::zeroed());
            nodes[node] = BvhNode::new(&node_bounds, left, 0);

            stack.push(Task { node: left + 1, start: start + mid, end });
            stack.push(Task { node: left, start, end: start + mid });
        }

        tracing::debug!(nodes = nodes.len(), refs = build.len(), "built bvh");
        Self { nodes, refs: build.into_iter().map(|r| r.item).collect(), bounds }
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// `[primitive, part]` pairs in leaf order.
    pub fn refs(&self) -> &[[u32; 2]] {
        &self.refs
    }

    /// Union of every reference's bounds.
    pub fn root_bounds(&self) -> Bounds3f {
        self.bounds
    }

    pub fn view(&self) -> BvhView<'_> {
        BvhView { nodes: &self.nodes, refs: &self.refs }
    }
}

/// SAH binned split search over all three axes. Returns `(axis, position, cost)` with the cost
/// relative to intersecting every reference in the range. Ties keep the lowest axis and bin.
fn find_best_split(refs: &[BuildRef], centroid_bounds: &Bounds3f, parent_area: Float) -> Option<(usize, Float, Float)> {
    if parent_area <= 0.0 {
        return None;
    }
    let mut best: Option<(usize, Float, Float)> = None;

    for axis in 0..3 {
        let lo = centroid_bounds.min[axis];
        let extent = centroid_bounds.max[axis] - lo;
        if !(extent > 1e-8) {
            continue;
        }

        let mut bins = [Bin { bounds: Bounds3f::empty(), count: 0 }; NUM_BINS];
        let scale = NUM_BINS as Float / extent;
        for r in refs {
            let b = (((r.centroid[axis] - lo) * scale) as usize).min(NUM_BINS - 1);
            bins[b].bounds = bins[b].bounds.join(&r.bounds);
            bins[b].count += 1;
        }

        let mut left_area = [0.0; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut sweep = Bounds3f::empty();
        let mut sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep = sweep.join(&bins[i].bounds);
            sweep_count += bins[i].count;
            left_area[i] = if sweep_count > 0 { sweep.surface_area() } else { 0.0 };
            left_count[i] = sweep_count;
        }

        sweep = Bounds3f::empty();
        sweep_count = 0;
        let mut candidates = [None; NUM_BINS];
        for i in (1..NUM_BINS).rev() {
            sweep = sweep.join(&bins[i].bounds);
            sweep_count += bins[i].count;
            if sweep_count == 0 || left_count[i - 1] == 0 {
                continue;
            }
            let cost = TRAVERSAL_COST
                + (left_count[i - 1] as Float * left_area[i - 1] + sweep_count as Float * sweep.surface_area())
                    / parent_area;
            candidates[i] = Some(cost);
        }
        // ascending bin order so equal costs resolve to the lowest split
        for (i, cost) in candidates.iter().enumerate() {
            if let Some(cost) = *cost {
                if best.map_or(true, |(_, _, c)| cost < c) {
                    best = Some((axis, lo + i as Float / NUM_BINS as Float * extent, cost));
                }
            }
        }
    }
    best
}

/// Closest hit found by [`BvhView::nearest`].
#[derive(Clone, Copy, Debug)]
pub struct BvhHit<H> {
    pub t: Float,
    pub prim: u32,
    pub part: u32,
    pub local: H,
}

/// Ray with precomputed slab test data.
struct SlabRay {
    origin: [Float; 3],
    inv_dir: [Float; 3],
}

impl SlabRay {
    fn new(ray: &Ray) -> Self {
        Self {
            origin: ray.origin.into(),
            inv_dir: [1.0 / ray.dir.x, 1.0 / ray.dir.y, 1.0 / ray.dir.z],
        }
    }

    /// Entry distance into the node's box, if the box overlaps `[t_min, t_max]`.
    #[inline]
    fn enter(&self, node: &BvhNode, t_min: Float, t_max: Float) -> Option<Float> {
        let mut t0 = t_min;
        let mut t1 = t_max;
        for axis in 0..3 {
            let mut near = (node.min[axis] - self.origin[axis]) * self.inv_dir[axis];
            let mut far = (node.max[axis] - self.origin[axis]) * self.inv_dir[axis];
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            // NaN from 0 * inf leaves the interval unchanged
            if near > t0 {
                t0 = near;
            }
            if far < t1 {
                t1 = far;
            }
            if t0 > t1 {
                return None;
            }
        }
        Some(t0)
    }
}

/// Borrowed node and reference arrays, from a built [`Bvh`] or from device memory.
#[derive(Clone, Copy, Debug)]
pub struct BvhView<'a> {
    pub nodes: &'a [BvhNode],
    pub refs: &'a [[u32; 2]],
}

impl<'a> BvhView<'a> {
    /// Closest hit with `t` in `[t_min, t_max]`. `test(prim, part, t_min, t_max)` intersects one
    /// reference and returns its hit distance plus any local data. Among hits at the same
    /// distance the first one visited wins.
    pub fn nearest<H>(
        &self,
        ray: &Ray,
        t_min: Float,
        t_max: Float,
        mut test: impl FnMut(u32, u32, Float, Float) -> Option<(Float, H)>,
    ) -> Option<BvhHit<H>> {
        let mut closest: Option<BvhHit<H>> = None;
        let mut t_max = t_max;
        let mut visit = |item: &[u32; 2], t_max: &mut Float| {
            if let Some((t, local)) = test(item[0], item[1], t_min, *t_max) {
                if t < *t_max || closest.is_none() {
                    *t_max = t;
                    closest = Some(BvhHit { t, prim: item[0], part: item[1], local });
                }
            }
        };

        if self.nodes.is_empty() {
            for item in self.refs {
                visit(item, &mut t_max);
            }
            return closest;
        }

        let slab = SlabRay::new(ray);
        let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
        if slab.enter(&self.nodes[0], t_min, t_max).is_some() {
            stack.push(0);
        }
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx as usize];
            if slab.enter(node, t_min, t_max).is_none() {
                continue;
            }
            if node.is_leaf() {
                let first = node.left_or_first as usize;
                for item in &self.refs[first..first + node.count as usize] {
                    visit(item, &mut t_max);
                }
                continue;
            }
            let left = node.left_or_first;
            let right = left + 1;
            let tl = slab.enter(&self.nodes[left as usize], t_min, t_max);
            let tr = slab.enter(&self.nodes[right as usize], t_min, t_max);
            match (tl, tr) {
                (Some(a), Some(b)) => {
                    // nearer child on top
                    if b < a {
                        stack.push(left);
                        stack.push(right);
                    } else {
                        stack.push(right);
                        stack.push(left);
                    }
                }
                (Some(_), None) => stack.push(left),
                (None, Some(_)) => stack.push(right),
                (None, None) => {}
            }
        }
        closest
    }

    /// Whether anything is hit in `[t_min, t_max]`. Stops at the first hit.
    pub fn any(&self, ray: &Ray, t_min: Float, t_max: Float, mut test: impl FnMut(u32, u32, Float, Float) -> bool) -> bool {
        if self.nodes.is_empty() {
            return self.refs.iter().any(|item| test(item[0], item[1], t_min, t_max));
        }

        let slab = SlabRay::new(ray);
        let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
        stack.push(0);
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx as usize];
            if slab.enter(node, t_min, t_max).is_none() {
                continue;
            }
            if node.is_leaf() {
                let first = node.left_or_first as usize;
                if self.refs[first..first + node.count as usize]
                    .iter()
                    .any(|item| test(item[0], item[1], t_min, t_max))
                {
                    return true;
                }
            } else {
                stack.push(node.left_or_first + 1);
                stack.push(node.left_or_first);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{point3f, vec3f};

    fn unit_box(prim: u32, x: Float, y: Float) -> PrimRef {
        PrimRef {
            prim,
            part: 0,
            bounds: Bounds3f::with_bounds(point3f!(x, y, 0), point3f!(x + 1.0, y + 1.0, 1)),
        }
    }

    fn grid(n: u32) -> Vec<PrimRef> {
        (0..n * n).map(|i| unit_box(i, (i % n) as Float * 2.0, (i / n) as Float * 2.0)).collect()
    }

    /// Box hit test treating every reference as a solid box.
    fn box_test<'a>(prims: &'a [PrimRef], ray: &'a Ray) -> impl FnMut(u32, u32, Float, Float) -> Option<(Float, ())> + 'a {
        move |prim, _, t_min, t_max| {
            let node = BvhNode::new(&prims[prim as usize].bounds, 0, 1);
            SlabRay::new(ray).enter(&node, t_min, t_max).map(|t| (t, ()))
        }
    }

    #[test]
    fn test_degenerate_inputs_are_flat() {
        let empty = Bvh::build(&[]);
        assert!(empty.nodes().is_empty());
        assert!(empty.refs().is_empty());
        let ray = Ray::new(point3f!(0, 0, -1), vec3f!(0, 0, 1));
        assert!(empty.view().nearest(&ray, 0.0, Float::INFINITY, |_, _, _, _| Some((1.0, ()))).is_none());

        let one = [unit_box(7, 0.0, 0.0)];
        let bvh = Bvh::build(&one);
        assert!(bvh.nodes().is_empty());
        assert_eq!(bvh.refs(), &[[7, 0]]);
        let ray = Ray::new(point3f!(0.5, 0.5, -1), vec3f!(0, 0, 1));
        let hit = bvh.view().nearest(&ray, 0.0, Float::INFINITY, |_, _, t0, _| Some((t0 + 1.0, ()))).unwrap();
        assert_eq!(hit.prim, 7);
    }

    #[test]
    fn test_every_ref_contained_and_present() {
        let prims = grid(10);
        let bvh = Bvh::build(&prims);
        assert!(bvh.nodes().len() > 1);
        let root = bvh.nodes()[0].bounds();
        for p in &prims {
            assert!(root.contains(&p.bounds, 0.0));
        }
        let mut seen: Vec<u32> = bvh.refs().iter().map(|r| r[0]).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());

        // children nest inside parents
        for node in bvh.nodes().iter().filter(|n| !n.is_leaf()) {
            let b = node.bounds();
            for child in [node.left_or_first, node.left_or_first + 1] {
                assert!(b.contains(&bvh.nodes()[child as usize].bounds(), 0.0));
            }
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let prims = grid(7);
        let a = Bvh::build(&prims);
        let b = Bvh::build(&prims);
        assert_eq!(a.nodes(), b.nodes());
        assert_eq!(a.refs(), b.refs());
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let prims = grid(6);
        let bvh = Bvh::build(&prims);
        for (x, y) in [(0.5, 0.5), (4.2, 6.7), (10.9, 10.1), (1.5, 0.5)] {
            let ray = Ray::new(point3f!(x, y, -5), vec3f!(0.01, 0.0, 1));
            let hit = bvh.view().nearest(&ray, 0.0, Float::INFINITY, box_test(&prims, &ray));
            let brute = prims
                .iter()
                .filter_map(|p| SlabRay::new(&ray).enter(&BvhNode::new(&p.bounds, 0, 1), 0.0, Float::INFINITY).map(|t| (t, p.prim)))
                .min_by(|a, b| a.0.total_cmp(&b.0));
            assert_eq!(hit.map(|h| h.prim), brute.map(|b| b.1));
        }
    }

    #[test]
    fn test_any_respects_interval() {
        let prims = grid(4);
        let bvh = Bvh::build(&prims);
        let ray = Ray::new(point3f!(0.5, 0.5, -5), vec3f!(0, 0, 1));
        assert!(bvh.view().any(&ray, 0.0, 10.0, |p, part, t0, t1| box_test(&prims, &ray)(p, part, t0, t1).is_some()));
        assert!(!bvh.view().any(&ray, 0.0, 4.0, |p, part, t0, t1| box_test(&prims, &ray)(p, part, t0, t1).is_some()));
    }
}
