use crate::{Float, Point3f, Vec3f};

/// Axis-aligned bounding box. An empty box has `min > max` on every axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds3f {
    pub min: Point3f,
    pub max: Point3f,
}

impl Bounds3f {
    pub fn empty() -> Self {
        Self {
            min: Point3f::new(Float::INFINITY, Float::INFINITY, Float::INFINITY),
            max: Point3f::new(Float::NEG_INFINITY, Float::NEG_INFINITY, Float::NEG_INFINITY),
        }
    }

    pub fn with_bounds(p1: Point3f, p2: Point3f) -> Self {
        Self {
            min: Point3f::new(p1.x.min(p2.x), p1.y.min(p2.y), p1.z.min(p2.z)),
            max: Point3f::new(p1.x.max(p2.x), p1.y.max(p2.y), p1.z.max(p2.z)),
        }
    }

    pub fn from_point(p: Point3f) -> Self {
        Self { min: p, max: p }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn join(&self, other: &Self) -> Self {
        Self {
            min: Point3f::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y), self.min.z.min(other.min.z)),
            max: Point3f::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y), self.max.z.max(other.max.z)),
        }
    }

    pub fn join_point(&self, p: &Point3f) -> Self {
        self.join(&Self::from_point(*p))
    }

    pub fn diagonal(&self) -> Vec3f {
        self.max - self.min
    }

    pub fn centroid(&self) -> Point3f {
        Point3f::new(
            0.5 * (self.min.x + self.max.x),
            0.5 * (self.min.y + self.max.y),
            0.5 * (self.min.z + self.max.z),
        )
    }

    pub fn surface_area(&self) -> Float {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.diagonal();
        2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    /// Index of the axis with the widest extent; ties go to the lowest index.
    pub fn maximum_extent(&self) -> usize {
        let d = self.diagonal();
        let mut axis = 0;
        if d.y > d[axis] {
            axis = 1;
        }
        if d.z > d[axis] {
            axis = 2;
        }
        axis
    }

    pub fn is_point(&self) -> bool {
        self.min == self.max
    }

    /// True if `other` lies entirely inside `self`, allowing for a relative tolerance `eps`.
    pub fn contains(&self, other: &Self, eps: Float) -> bool {
        if other.is_empty() {
            return true;
        }
        (0..3).all(|i| {
            let tol = eps * (1.0 + self.min[i].abs().max(self.max[i].abs()));
            self.min[i] <= other.min[i] + tol && other.max[i] <= self.max[i] + tol
        })
    }

    /// Grow the box by `delta` on every side.
    pub fn expand(&self, delta: Float) -> Self {
        Self {
            min: Point3f::new(self.min.x - delta, self.min.y - delta, self.min.z - delta),
            max: Point3f::new(self.max.x + delta, self.max.y + delta, self.max.z + delta),
        }
    }

    pub fn corner(&self, i: usize) -> Point3f {
        Point3f::new(
            if i & 1 == 0 { self.min.x } else { self.max.x },
            if i & 2 == 0 { self.min.y } else { self.max.y },
            if i & 4 == 0 { self.min.z } else { self.max.z },
        )
    }
}

impl Default for Bounds3f {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_join_and_area() {
        let b = Bounds3f::with_bounds(point3f!(0, 0, 0), point3f!(1, 2, 3));
        let joined = b.join(&Bounds3f::from_point(point3f!(-1, 0, 0)));
        assert_eq!(joined.min, point3f!(-1, 0, 0));
        assert_abs_diff_eq!(b.surface_area(), 2.0 * (2.0 + 3.0 + 6.0));
        assert_eq!(b.maximum_extent(), 2);
        assert!(joined.contains(&b, 0.0));
        assert!(!b.contains(&joined, 0.0));
    }

    #[test]
    fn test_maximum_extent_tie_takes_lowest_axis() {
        let cube = Bounds3f::with_bounds(point3f!(0, 0, 0), point3f!(1, 1, 1));
        assert_eq!(cube.maximum_extent(), 0);
        let yz = Bounds3f::with_bounds(point3f!(0, 0, 0), point3f!(0.5, 2, 2));
        assert_eq!(yz.maximum_extent(), 1);
    }

    #[test]
    fn test_empty() {
        let e = Bounds3f::empty();
        assert!(e.is_empty());
        assert_eq!(e.surface_area(), 0.0);
        let p = e.join_point(&point3f!(1, 1, 1));
        assert!(p.is_point());
    }
}
