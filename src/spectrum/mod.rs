use crate::Float;

pub fn zip<F: Fn(Float, Float) -> Float, const N: usize>(a: [Float; N], b: [Float; N], f: F) -> [Float; N] {
    std::array::from_fn(|i| f(a[i], b[i]))
}

#[allow(clippy::excessive_precision)]
pub fn xyz_to_rgb(xyz: [Float; 3]) -> [Float; 3] {
    let mut rgb = [0.0; 3];
    rgb[0] = 3.240479 * xyz[0] - 1.537150 * xyz[1] - 0.498535 * xyz[2];
    rgb[1] = -0.969256 * xyz[0] + 1.875991 * xyz[1] + 0.041556 * xyz[2];
    rgb[2] = 0.055648 * xyz[0] - 0.204043 * xyz[1] + 1.057311 * xyz[2];
    rgb
}

#[allow(clippy::excessive_precision)]
pub fn rgb_to_xyz(rgb: [Float; 3]) -> [Float; 3] {
    let mut xyz = [0.0; 3];
    xyz[0] = 0.412453 * rgb[0] + 0.357580 * rgb[1] + 0.180423 * rgb[2];
    xyz[1] = 0.212671 * rgb[0] + 0.715160 * rgb[1] + 0.072169 * rgb[2];
    xyz[2] = 0.019334 * rgb[0] + 0.119193 * rgb[1] + 0.950227 * rgb[2];
    xyz
}

#[derive(Clone, Copy)]
pub struct CoefficientSpectrum<const N: usize>([Float; N]);

pub type Spectrum = CoefficientSpectrum<3>;

impl<const N: usize> CoefficientSpectrum<N> {

    #[inline]
    pub fn new_with<F: FnMut(usize) -> Float>(init: F) -> Self {
        Self(std::array::from_fn(init))
    }

    #[inline]
    pub fn zip<F: Fn(Float, Float) -> Float>(&self, other: &Self, f: F) -> Self {
        Self(zip(self.0, other.0, f))
    }

    pub fn uniform(val: Float) -> Self {
        Self([val; N])
    }

    pub fn black() -> Self {
        Self::uniform(0.0)
    }

    pub fn map<F: Fn(Float) -> Float>(&self, f: F) -> Self {
        Self::new_with(|i| f(self[i]))
    }

    pub fn is_black(&self) -> bool {
        self.0.iter().all(|&x| x == 0.0)
    }

    pub fn has_nans(&self) -> bool {
        self.0.iter().any(|&x| x.is_nan())
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|&x| x.is_finite())
    }

    pub fn max_component_value(&self) -> Float {
        self.0.iter().cloned().fold(Float::NEG_INFINITY, Float::max)
    }

    pub fn lerp(t: Float, s1: Self, s2: Self) -> Self {
        (1.0 - t) * s1 + t * s2
    }

    pub fn sqrt(self) -> Self {
        self.map(Float::sqrt)
    }

    pub fn exp(self) -> Self {
        self.map(Float::exp)
    }

    pub fn clamp(self, low: Float, high: Float) -> Self {
        self.map(|v| v.clamp(low, high))
    }

    pub fn clamp_positive(self) -> Self {
        self.map(|v| v.max(0.0))
    }

    /// Replace NaN or infinite channels by zero and clamp negatives, so a single
    /// diverging estimate cannot poison an accumulation.
    pub fn sanitized(self) -> Self {
        self.map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 })
    }

    pub fn into_array(self) -> [Float; N] {
        self.0
    }
}

impl CoefficientSpectrum<3> {
    pub fn rgb(r: Float, g: Float, b: Float) -> Self {
        Self([r, g, b])
    }

    pub fn from_xyz(xyz: [Float; 3]) -> Self {
        Self(xyz_to_rgb(xyz))
    }

    pub fn to_xyz(self) -> [Float; 3] {
        rgb_to_xyz(self.0)
    }

    /// The Y coordinate of the colour.
    #[allow(clippy::excessive_precision)]
    pub fn luminance(&self) -> Float {
        0.212671 * self.0[0] + 0.715160 * self.0[1] + 0.072169 * self.0[2]
    }

    pub fn average(&self) -> Float {
        (self.0[0] + self.0[1] + self.0[2]) / 3.0
    }
}

pub fn spectrum_from_rgb8(rgb8: [u8; 3]) -> Spectrum {
    let c = [
        rgb8[0] as Float / 255.0,
        rgb8[1] as Float / 255.0,
        rgb8[2] as Float / 255.0,
    ];
    CoefficientSpectrum(c)
}

pub fn spectrum_into_rgb8(s: Spectrum) -> [u8; 3] {
    let s = s.clamp(0.0, 1.0);
    [
        Float::round(s[0] * 255.0) as u8,
        Float::round(s[1] * 255.0) as u8,
        Float::round(s[2] * 255.0) as u8,
    ]
}

impl<const N: usize> std::ops::Index<usize> for CoefficientSpectrum<N> {
    type Output = Float;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<const N: usize> std::ops::IndexMut<usize> for CoefficientSpectrum<N> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const N: usize> std::cmp::PartialEq for CoefficientSpectrum<N> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<const N: usize> Default for CoefficientSpectrum<N> {
    fn default() -> Self {
        Self::uniform(Float::default())
    }
}

impl<const N: usize> std::fmt::Debug for CoefficientSpectrum<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl<const N: usize> From<[Float; N]> for CoefficientSpectrum<N> {
    fn from(a: [Float; N]) -> Self {
        Self(a)
    }
}

impl<const N: usize> From<Float> for CoefficientSpectrum<N> {
    fn from(x: Float) -> Self {
        Self::uniform(x)
    }
}

impl<const N: usize> From<CoefficientSpectrum<N>> for [Float; N] {
    fn from(s: CoefficientSpectrum<N>) -> Self {
        s.0
    }
}

impl<const N: usize> std::iter::Sum for CoefficientSpectrum<N> {
    fn sum<I: Iterator<Item=Self>>(iter: I) -> Self {
        iter.fold(Self::uniform(0.0), std::ops::Add::add)
    }
}

impl<const N: usize> std::ops::Neg for CoefficientSpectrum<N> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.map(|v| -v)
    }
}

macro_rules! impl_op {
    ($op:ident, $name:ident, $sym:tt) => {
        impl<const N: usize> std::ops::$op for CoefficientSpectrum<N> {
            type Output = Self;

            fn $name(self, rhs: Self) -> Self::Output {
                Self::zip(&self, &rhs, |x, y| x $sym y)
            }
        }

        impl<const N: usize> std::ops::$op<Float> for CoefficientSpectrum<N> {
            type Output = Self;

            fn $name(self, rhs: Float) -> Self::Output {
                Self::new_with(|i| self[i] $sym rhs)
            }
        }

        impl<const N: usize> std::ops::$op<CoefficientSpectrum<N>> for Float {
            type Output = CoefficientSpectrum<N>;

            fn $name(self, rhs: CoefficientSpectrum<N>) -> Self::Output {
                CoefficientSpectrum::new_with(|i| self $sym rhs[i])
            }
        }
    }
}

macro_rules! impl_assign_op {
    ($op:ident, $name:ident, $sym:tt) => {
        impl<const N: usize> std::ops::$op for CoefficientSpectrum<N> {
            fn $name(&mut self, rhs: Self) {
                for i in 0..N {
                    self[i] $sym rhs[i];
                }
            }
        }

        impl<const N: usize> std::ops::$op<Float> for CoefficientSpectrum<N> {
            fn $name(&mut self, rhs: Float) {
                for i in 0..N {
                    self[i] $sym rhs;
                }
            }
        }
    }
}

impl_op!(Add, add, +);
impl_op!(Sub, sub, -);
impl_op!(Mul, mul, *);
impl_op!(Div, div, /);
impl_assign_op!(AddAssign, add_assign, +=);
impl_assign_op!(SubAssign, sub_assign, -=);
impl_assign_op!(MulAssign, mul_assign, *=);
impl_assign_op!(DivAssign, div_assign, /=);


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_iter_sum() {
        let spectra = vec![Spectrum::uniform(1.0), Spectrum::from([0.0, 1.0, 0.5])];
        let sum: Spectrum = spectra.into_iter().sum();
        assert_eq!(sum, Spectrum::from([1.0, 2.0, 1.5]));
    }

    #[test]
    fn test_sanitized_drops_bad_channels() {
        let s = Spectrum::rgb(Float::NAN, -0.5, Float::INFINITY).sanitized();
        assert_eq!(s, Spectrum::black());
        let ok = Spectrum::rgb(0.25, 1.0, 3.0);
        assert_eq!(ok.sanitized(), ok);
    }

    #[test]
    fn test_xyz_round_trip() {
        let s = Spectrum::rgb(0.2, 0.5, 0.9);
        let back = Spectrum::from_xyz(s.to_xyz());
        for i in 0..3 {
            assert_abs_diff_eq!(back[i], s[i], epsilon = 1e-3);
        }
        assert_abs_diff_eq!(Spectrum::uniform(1.0).luminance(), 1.0, epsilon = 1e-5);
    }
}
