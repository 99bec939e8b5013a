use crate::{Point2f, Vec3f, Float};
use crate::consts::{FRAC_1_PI, FRAC_PI_2, FRAC_PI_4, PI};
use crate::math::ONE_MINUS_EPSILON;

pub fn concentric_sample_disk(u: Point2f) -> Point2f {
    // map sample from [0, 1] to [-1, 1]
    let ox = 2.0 * u.x - 1.0;
    let oy = 2.0 * u.y - 1.0;
    if ox == 0.0 && oy == 0.0 {
        return Point2f::new(0.0, 0.0);
    }

    let (r, theta) = if ox.abs() > oy.abs() {
        (ox, FRAC_PI_4 * (oy / ox))
    } else {
        (oy, FRAC_PI_2 - FRAC_PI_4 * (ox / oy))
    };

    Point2f::new(r * theta.cos(), r * theta.sin())
}

pub fn cosine_sample_hemisphere(u: Point2f) -> Vec3f {
    let d = concentric_sample_disk(u);
    let z = Float::sqrt(Float::max(0.0, 1.0 - d.x * d.x - d.y * d.y));
    Vec3f::new(d.x, d.y, z)
}

pub fn cosine_hemisphere_pdf(cos_theta: Float) -> Float {
    cos_theta * FRAC_1_PI
}

pub fn uniform_sample_sphere(u: Point2f) -> Vec3f {
    let z = 1.0 - 2.0 * u.x;
    let r = Float::sqrt(Float::max(0.0, 1.0 - z * z));
    let phi = 2.0 * PI * u.y;
    Vec3f::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> Float {
    1.0 / (4.0 * PI)
}

/// Uniformly sample barycentric coordinates `(b0, b1)` over a triangle.
pub fn uniform_sample_triangle(u: Point2f) -> (Float, Float) {
    let su0 = u.x.sqrt();
    (1.0 - su0, u.y * su0)
}

/// Power heuristic with beta = 2 for combining two sampling strategies.
pub fn power_heuristic(nf: u32, f_pdf: Float, ng: u32, g_pdf: Float) -> Float {
    let f = nf as Float * f_pdf;
    let g = ng as Float * g_pdf;
    if f.is_infinite() {
        return 1.0;
    }
    let denom = f * f + g * g;
    if denom == 0.0 { 0.0 } else { (f * f) / denom }
}

/// Largest index `i` in `[0, size - 2]` with `pred(i)` true, assuming `pred` is monotone.
fn find_interval(size: usize, pred: impl Fn(usize) -> bool) -> usize {
    let mut first = 0;
    let mut len = size;
    while len > 0 {
        let half = len >> 1;
        let middle = first + half;
        if pred(middle) {
            first = middle + 1;
            len -= half + 1;
        } else {
            len = half;
        }
    }
    first.saturating_sub(1).min(size.saturating_sub(2))
}

/// Piecewise-constant 1D distribution, built once and then stored as
/// `func[n] ++ cdf[n + 1] ++ [integral]`.
#[derive(Clone, Debug)]
pub struct Distribution1D {
    pub func: Vec<Float>,
    pub cdf: Vec<Float>,
    pub func_int: Float,
}

impl Distribution1D {
    pub fn new(mut func: Vec<Float>) -> Self {
        let n = func.len();
        let mut cdf = vec![0.0; n + 1];
        for i in 1..=n {
            cdf[i] = cdf[i - 1] + func[i - 1].abs() / n as Float;
        }
        let mut func_int = cdf[n];
        if func_int == 0.0 || !func_int.is_finite() {
            // nothing to importance sample, fall back to uniform
            func.iter_mut().for_each(|f| *f = 1.0);
            for (i, c) in cdf.iter_mut().enumerate() {
                *c = i as Float / n as Float;
            }
            func_int = 1.0;
        } else {
            cdf.iter_mut().for_each(|c| *c /= func_int);
        }
        Self { func, cdf, func_int }
    }

    pub fn stored_len(n: usize) -> usize {
        2 * n + 2
    }

    pub fn write_to(&self, out: &mut Vec<Float>) {
        out.extend_from_slice(&self.func);
        out.extend_from_slice(&self.cdf);
        out.push(self.func_int);
    }

    pub fn view(&self) -> Distribution1DRef<'_> {
        Distribution1DRef { func: &self.func, cdf: &self.cdf, func_int: self.func_int }
    }
}

/// Borrowed view of a stored [`Distribution1D`].
#[derive(Clone, Copy, Debug)]
pub struct Distribution1DRef<'a> {
    pub func: &'a [Float],
    pub cdf: &'a [Float],
    pub func_int: Float,
}

impl<'a> Distribution1DRef<'a> {
    pub fn from_words(words: &'a [Float], n: usize) -> Self {
        Self {
            func: &words[..n],
            cdf: &words[n..2 * n + 1],
            func_int: words[2 * n + 1],
        }
    }

    pub fn count(&self) -> usize {
        self.func.len()
    }

    /// Returns `(x, pdf, offset)` for a canonical sample `u`.
    pub fn sample_continuous(&self, u: Float) -> (Float, Float, usize) {
        let u = u.min(ONE_MINUS_EPSILON);
        let offset = find_interval(self.cdf.len(), |i| self.cdf[i] <= u);
        let mut du = u - self.cdf[offset];
        let width = self.cdf[offset + 1] - self.cdf[offset];
        if width > 0.0 {
            du /= width;
        }
        let pdf = if self.func_int > 0.0 { self.func[offset] / self.func_int } else { 0.0 };
        let x = (offset as Float + du) / self.count() as Float;
        (x.min(ONE_MINUS_EPSILON), pdf, offset)
    }
}

/// Marginal-conditional 2D distribution over `[0,1]^2`.
///
/// Stored layout: the marginal over rows, then one conditional per row.
#[derive(Clone, Debug)]
pub struct Distribution2D {
    nu: usize,
    nv: usize,
    conditional: Vec<Distribution1D>,
    marginal: Distribution1D,
}

impl Distribution2D {
    /// `func` is row-major with `nv` rows of `nu` values.
    pub fn new(func: &[Float], nu: usize, nv: usize) -> Self {
        let conditional: Vec<Distribution1D> = (0..nv)
            .map(|v| Distribution1D::new(func[v * nu..(v + 1) * nu].to_vec()))
            .collect();
        // raw row integrals, so rows that fell back to uniform keep zero weight
        let marginal = Distribution1D::new(
            (0..nv)
                .map(|v| func[v * nu..(v + 1) * nu].iter().map(|f| f.abs()).sum::<Float>() / nu as Float)
                .collect(),
        );
        Self { nu, nv, conditional, marginal }
    }

    pub fn stored_len(nu: usize, nv: usize) -> usize {
        Distribution1D::stored_len(nv) + nv * Distribution1D::stored_len(nu)
    }

    pub fn write_to(&self, out: &mut Vec<Float>) {
        let start = out.len();
        self.marginal.write_to(out);
        for c in &self.conditional {
            c.write_to(out);
        }
        debug_assert_eq!(out.len() - start, Self::stored_len(self.nu, self.nv));
    }
}

/// Borrowed view of a stored [`Distribution2D`].
#[derive(Clone, Copy, Debug)]
pub struct Distribution2DRef<'a> {
    words: &'a [Float],
    nu: usize,
    nv: usize,
}

impl<'a> Distribution2DRef<'a> {
    pub fn from_words(words: &'a [Float], nu: usize, nv: usize) -> Self {
        Self { words, nu, nv }
    }

    fn marginal(&self) -> Distribution1DRef<'a> {
        Distribution1DRef::from_words(self.words, self.nv)
    }

    fn conditional(&self, v: usize) -> Distribution1DRef<'a> {
        let start = Distribution1D::stored_len(self.nv) + v * Distribution1D::stored_len(self.nu);
        Distribution1DRef::from_words(&self.words[start..], self.nu)
    }

    pub fn sample_continuous(&self, u: Point2f) -> (Point2f, Float) {
        let (d1, pdf1, v) = self.marginal().sample_continuous(u.y);
        let (d0, pdf0, _) = self.conditional(v).sample_continuous(u.x);
        (Point2f::new(d0, d1), pdf0 * pdf1)
    }

    pub fn pdf(&self, p: Point2f) -> Float {
        let iu = ((p.x * self.nu as Float) as isize).clamp(0, self.nu as isize - 1) as usize;
        let iv = ((p.y * self.nv as Float) as isize).clamp(0, self.nv as isize - 1) as usize;
        let marginal = self.marginal();
        let conditional = self.conditional(iv);
        (conditional.func[iu] / conditional.func_int) * (marginal.func[iv] / marginal.func_int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cgmath::InnerSpace;

    #[test]
    fn test_disk_samples_inside_unit_disk() {
        for i in 0..16 {
            for j in 0..16 {
                let u = Point2f::new(i as Float / 15.0, j as Float / 15.0);
                let d = concentric_sample_disk(u);
                assert!(d.x * d.x + d.y * d.y <= 1.0 + 1e-5);
            }
        }
    }

    #[test]
    fn test_sphere_samples_are_unit() {
        let v = uniform_sample_sphere(Point2f::new(0.3, 0.7));
        assert_abs_diff_eq!(v.magnitude(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_power_heuristic_balances() {
        assert_abs_diff_eq!(power_heuristic(1, 1.0, 1, 1.0), 0.5);
        assert_abs_diff_eq!(power_heuristic(1, 1.0, 1, 0.0), 1.0);
        assert_eq!(power_heuristic(1, 0.0, 1, 0.0), 0.0);
    }

    #[test]
    fn test_distribution_1d_follows_func() {
        let d = Distribution1D::new(vec![0.0, 1.0, 3.0, 0.0]);
        let view = d.view();
        let (x, pdf, offset) = view.sample_continuous(0.5);
        assert_eq!(offset, 2);
        assert!(x >= 0.5 && x < 0.75);
        assert_abs_diff_eq!(pdf, 3.0 / 1.0, epsilon = 1e-5);

        // never lands in zero-valued buckets
        for i in 0..100 {
            let (_, pdf, offset) = view.sample_continuous(i as Float / 100.0);
            assert!(offset == 1 || offset == 2);
            assert!(pdf > 0.0);
        }
    }

    #[test]
    fn test_distribution_1d_zero_func_is_uniform() {
        let d = Distribution1D::new(vec![0.0; 4]);
        let (x, pdf, _) = d.view().sample_continuous(0.6);
        assert_abs_diff_eq!(x, 0.6, epsilon = 1e-5);
        assert_abs_diff_eq!(pdf, 1.0);
    }

    #[test]
    fn test_distribution_2d_stored_matches_pdf() {
        let func = [1.0, 2.0, 3.0, 4.0, 0.0, 6.0];
        let dist = Distribution2D::new(&func, 3, 2);
        let mut words = Vec::new();
        dist.write_to(&mut words);
        assert_eq!(words.len(), Distribution2D::stored_len(3, 2));

        let view = Distribution2DRef::from_words(&words, 3, 2);
        let (p, pdf) = view.sample_continuous(Point2f::new(0.2, 0.9));
        assert_abs_diff_eq!(pdf, view.pdf(p), epsilon = 1e-4);
        // zero-valued cell has zero density
        assert_eq!(view.pdf(Point2f::new(0.5, 0.75)), 0.0);
    }
}
