use crate::{Vec3f, Float, Point2f, spherical_direction};
use crate::reflection::{tan2_theta, cos2_theta, cos2_phi, sin2_phi, tan_theta, same_hemisphere, abs_cos_theta};
use crate::consts::PI;

/// Smallest alpha handed to the distribution; below it the lobe is numerically a mirror.
pub const MIN_ALPHA: Float = 1.0e-3;

pub trait MicrofacetDistribution {
    /// Find the differential area of microfacets oriented with the given normal vector `w`
    fn d(&self, wh: Vec3f) -> Float;

    /// The Smith masking-shadowing function, giving the fraction of microfacets with normal `wh`
    /// that are visible from direction `w`.
    fn g1(&self, w: Vec3f) -> Float {
        1.0 / (1.0 + self.lambda(w))
    }

    /// Measures invisible masked microfacet area per visible microfacet area.
    fn lambda(&self, w: Vec3f) -> Float;

    /// Gives the fraction of microfacets in a differential area that are visible from both
    /// directions `wo` and `wi`.
    fn g(&self, wo: Vec3f, wi: Vec3f) -> Float {
        1.0 / (1.0 + self.lambda(wo) + self.lambda(wi))
    }

    /// Sample a microfacet normal from the full distribution, in the hemisphere of `wo`.
    fn sample_wh(&self, wo: Vec3f, u: Point2f) -> Vec3f;

    fn pdf(&self, _wo: Vec3f, wh: Vec3f) -> Float {
        self.d(wh) * abs_cos_theta(wh)
    }
}

/// Also known as GGX
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrowbridgeReitzDistribution {
    alpha_x: Float,
    alpha_y: Float,
}

impl TrowbridgeReitzDistribution {
    /// Perceptual roughness in [0, 1] to alpha, `alpha = roughness^2`.
    pub fn roughness_to_alpha(roughness: Float) -> Float {
        sq!(roughness.clamp(0.0, 1.0)).max(MIN_ALPHA)
    }

    pub fn new(alpha_x: Float, alpha_y: Float) -> Self {
        TrowbridgeReitzDistribution { alpha_x: alpha_x.max(MIN_ALPHA), alpha_y: alpha_y.max(MIN_ALPHA) }
    }

    pub fn from_roughness(u_roughness: Float, v_roughness: Float) -> Self {
        Self::new(Self::roughness_to_alpha(u_roughness), Self::roughness_to_alpha(v_roughness))
    }

    pub fn isotropic(roughness: Float) -> Self {
        Self::from_roughness(roughness, roughness)
    }
}

impl MicrofacetDistribution for TrowbridgeReitzDistribution {
    fn d(&self, wh: Vec3f) -> Float {
        let tan2_theta = tan2_theta(wh);
        if tan2_theta.is_infinite() {
            return 0.0
        }

        let cos4_theta = cos2_theta(wh) * cos2_theta(wh);
        let e =
            (cos2_phi(wh) / (self.alpha_x * self.alpha_x) + sin2_phi(wh) / (self.alpha_y * self.alpha_y))
                * tan2_theta;
        1.0 / (PI * self.alpha_x * self.alpha_y * cos4_theta * (1.0 + e) * (1.0 + e))
    }

    fn lambda(&self, w: Vec3f) -> Float {
        let abs_tan_theta = tan_theta(w).abs();
        if abs_tan_theta.is_infinite() {
            return 0.0
        }

        // compute alpha for direction w
        let alpha = Float::sqrt(cos2_phi(w) * self.alpha_x * self.alpha_x +
            sin2_phi(w) * self.alpha_y * self.alpha_y);

        let alpha2_tan2_theta = (alpha * abs_tan_theta) * (alpha * abs_tan_theta);
        (-1.0 + Float::sqrt(1.0 + alpha2_tan2_theta)) / 2.0
    }

    fn sample_wh(&self, wo: Vec3f, u: Point2f) -> Vec3f {
        let (cos_theta, phi) = if self.alpha_x == self.alpha_y {
            let tan_theta2 = sq!(self.alpha_x) * u[0] / (1.0 - u[0]);
            (1.0 / Float::sqrt(1.0 + tan_theta2), 2.0 * PI * u[1])
        } else {
            let mut phi = Float::atan(self.alpha_y / self.alpha_x * Float::tan(2.0 * PI * u[1] + 0.5 * PI));
            if u[1] > 0.5 {
                phi += PI;
            }
            let sin_phi = phi.sin();
            let cos_phi = phi.cos();
            let alpha2 = 1.0 / (sq!(cos_phi) / sq!(self.alpha_x) + sq!(sin_phi) / sq!(self.alpha_y));
            let tan_theta2 = alpha2 * u[0] / (1.0 - u[0]);
            (1.0 / Float::sqrt(1.0 + tan_theta2), phi)
        };
        let sin_theta = Float::sqrt(Float::max(0.0, 1.0 - sq!(cos_theta)));
        let wh = spherical_direction(sin_theta, cos_theta, phi);
        if same_hemisphere(wo, wh) {
            wh
        } else {
            -wh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{RandomSampler, Sampler};
    use cgmath::InnerSpace;

    #[test]
    fn test_sampled_normals_have_positive_pdf() {
        let dist = TrowbridgeReitzDistribution::isotropic(0.5);
        let wo = Vec3f::new(0.3, 0.2, 0.9).normalize();
        let mut sampler = RandomSampler::new_with_seed(7);
        let n = 20_000;
        let mut hits = 0;
        for _ in 0..n {
            let wh = dist.sample_wh(wo, sampler.get_2d());
            let pdf = dist.pdf(wo, wh);
            if pdf > 0.0 {
                hits += 1;
            }
        }
        assert_eq!(hits, n);
        assert!(dist.g1(wo) > 0.0 && dist.g1(wo) <= 1.0);
    }

    #[test]
    fn test_alpha_floor() {
        assert_eq!(TrowbridgeReitzDistribution::roughness_to_alpha(0.0), MIN_ALPHA);
        assert!((TrowbridgeReitzDistribution::roughness_to_alpha(0.5) - 0.25).abs() < 1e-6);
    }
}
