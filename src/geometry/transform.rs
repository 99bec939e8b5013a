use crate::{Float, Point3f, Vec3f};
use cgmath::prelude::*;
use cgmath::{Deg, Matrix4, Transform as cgTransform};

/// Number of words in a row-major 3x4 affine matrix.
pub const AFFINE_WORDS: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub t: Matrix4<Float>,
    pub invt: Matrix4<Float>,
}

impl Transform {
    pub fn identity() -> Self {
        Self::new(Matrix4::identity(), Matrix4::identity())
    }

    /// Build a transform from a matrix, or `None` if it cannot be inverted.
    pub fn from_mat(mat: Matrix4<Float>) -> Option<Self> {
        let m_inv = mat.invert()?;
        Some(Self::new(mat, m_inv))
    }

    pub fn new(mat: Matrix4<Float>, mat_inv: Matrix4<Float>) -> Self {
        Self { t: mat, invt: mat_inv }
    }

    pub fn translate(delta: Vec3f) -> Self {
        let m = Matrix4::from_translation(delta);
        let m_inv = Matrix4::from_translation(-delta);
        Self::new(m, m_inv)
    }

    pub fn scale(sx: Float, sy: Float, sz: Float) -> Self {
        let m = Matrix4::from_nonuniform_scale(sx, sy, sz);
        let m_inv = Matrix4::from_nonuniform_scale(1.0 / sx, 1.0 / sy, 1.0 / sz);
        Self::new(m, m_inv)
    }

    pub fn uniform_scale(s: Float) -> Self {
        Self::scale(s, s, s)
    }

    /// Rotation of `degrees` about `axis`.
    pub fn rotate(degrees: Float, axis: Vec3f) -> Self {
        let m = Matrix4::from_axis_angle(axis.normalize(), Deg(degrees));
        Self::new(m, m.transpose())
    }

    pub fn inverse(&self) -> Self {
        Self::new(self.invt, self.t)
    }

    pub fn transform_point(&self, p: Point3f) -> Point3f {
        self.t.transform_point(p)
    }

    pub fn transform_vector(&self, v: Vec3f) -> Vec3f {
        self.t.transform_vector(v)
    }

    pub fn transform_normal(&self, n: Vec3f) -> Vec3f {
        // transform by the transpose of the inverse
        let x = self.invt[0][0] * n.x + self.invt[0][1] * n.y + self.invt[0][2] * n.z;
        let y = self.invt[1][0] * n.x + self.invt[1][1] * n.y + self.invt[1][2] * n.z;
        let z = self.invt[2][0] * n.x + self.invt[2][1] * n.y + self.invt[2][2] * n.z;
        Vec3f::new(x, y, z)
    }

    /// The forward matrix as three row-major rows of four words.
    pub fn affine_rows(&self) -> [Float; AFFINE_WORDS] {
        affine_rows(&self.t)
    }

    /// The inverse matrix as three row-major rows of four words.
    pub fn inverse_affine_rows(&self) -> [Float; AFFINE_WORDS] {
        affine_rows(&self.invt)
    }

    pub fn has_nans(&self) -> bool {
        let m: &[Float; 16] = self.t.as_ref();
        let inv: &[Float; 16] = self.invt.as_ref();
        m.iter().chain(inv.iter()).any(|v| !v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.t * rhs.t, rhs.invt * self.invt)
    }
}

fn affine_rows(m: &Matrix4<Float>) -> [Float; AFFINE_WORDS] {
    // cgmath matrices are column-major: m[col][row]
    let mut rows = [0.0; AFFINE_WORDS];
    for r in 0..3 {
        for c in 0..4 {
            rows[r * 4 + c] = m[c][r];
        }
    }
    rows
}

/// Apply row-major affine rows to a point.
#[inline]
pub fn affine_point(m: &[Float], p: Point3f) -> Point3f {
    Point3f::new(
        m[0] * p.x + m[1] * p.y + m[2] * p.z + m[3],
        m[4] * p.x + m[5] * p.y + m[6] * p.z + m[7],
        m[8] * p.x + m[9] * p.y + m[10] * p.z + m[11],
    )
}

/// Apply row-major affine rows to a direction.
#[inline]
pub fn affine_vector(m: &[Float], v: Vec3f) -> Vec3f {
    Vec3f::new(
        m[0] * v.x + m[1] * v.y + m[2] * v.z,
        m[4] * v.x + m[5] * v.y + m[6] * v.z,
        m[8] * v.x + m[9] * v.y + m[10] * v.z,
    )
}

/// Transform a normal given the rows of the *inverse* matrix (multiplies by its transpose).
#[inline]
pub fn affine_normal(inv: &[Float], n: Vec3f) -> Vec3f {
    Vec3f::new(
        inv[0] * n.x + inv[4] * n.y + inv[8] * n.z,
        inv[1] * n.x + inv[5] * n.y + inv[9] * n.z,
        inv[2] * n.x + inv[6] * n.y + inv[10] * n.z,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_affine_rows_match_matrix() {
        let t = Transform::translate(vec3f!(1, 2, 3)) * Transform::rotate(30.0, vec3f!(0, 1, 0)) * Transform::uniform_scale(2.0);
        let p = point3f!(0.5, -1.0, 2.0);
        let expected = t.transform_point(p);
        let got = affine_point(&t.affine_rows(), p);
        assert_abs_diff_eq!(expected.x, got.x, epsilon = 1e-5);
        assert_abs_diff_eq!(expected.y, got.y, epsilon = 1e-5);
        assert_abs_diff_eq!(expected.z, got.z, epsilon = 1e-5);

        let back = affine_point(&t.inverse_affine_rows(), got);
        assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-5);
        assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-5);
        assert_abs_diff_eq!(back.z, p.z, epsilon = 1e-5);
    }

    #[test]
    fn test_normal_stays_perpendicular() {
        let t = Transform::scale(1.0, 3.0, 1.0);
        let tangent = vec3f!(1, 1, 0).normalize();
        let n = vec3f!(1, -1, 0).normalize();
        let tangent_w = t.transform_vector(tangent);
        let n_w = affine_normal(&t.inverse_affine_rows(), n);
        assert_abs_diff_eq!(tangent_w.dot(n_w), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(t.transform_normal(n).dot(tangent_w), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let m = Matrix4::from_nonuniform_scale(1.0, 0.0, 1.0);
        assert!(Transform::from_mat(m).is_none());
    }
}
