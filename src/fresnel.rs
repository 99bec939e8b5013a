use crate::Float;
use crate::spectrum::Spectrum;

/// Unpolarized reflectance at a dielectric boundary. `cos_theta_i` is measured against the side
/// with index `eta_i`; a negative cosine means the ray arrives from the `eta_t` side.
pub fn fresnel_dielectric(cos_theta_i: Float, mut eta_i: Float, mut eta_t: Float) -> Float {
    let mut cos_theta_i = cos_theta_i.clamp(-1.0, 1.0);
    let entering = cos_theta_i > 0.0;
    if !entering {
        std::mem::swap(&mut eta_i, &mut eta_t);
        cos_theta_i = cos_theta_i.abs();
    }

    // compute cos_theta_t using snell's law
    let sin_theta_i = Float::sqrt((1.0 - cos_theta_i * cos_theta_i).max(0.0));
    let sin_theta_t = eta_i / eta_t * sin_theta_i;
    if sin_theta_t >= 1.0 { return 1.0 } // total internal reflection
    let cos_theta_t = Float::sqrt((1.0 - sin_theta_t * sin_theta_t).max(0.0));

    let r_parallel = ((eta_t * cos_theta_i) - (eta_i * cos_theta_t)) / ((eta_t * cos_theta_i) + (eta_i * cos_theta_t));
    let r_perp =     ((eta_i * cos_theta_i) - (eta_t * cos_theta_t)) / ((eta_i * cos_theta_i) + (eta_t * cos_theta_t));

    (r_parallel * r_parallel + r_perp * r_perp) / 2.0
}

#[allow(non_snake_case)]
pub fn fresnel_conductor(cos_theta_i: Float, eta_i: Spectrum, eta_t: Spectrum, k: Spectrum) -> Spectrum {
    let cos_theta_i = cos_theta_i.clamp(-1.0, 1.0);
    let eta = eta_t / eta_i;
    let eta_k = k / eta_i;

    let cos_theta_i2 = cos_theta_i * cos_theta_i;
    let sin_theta_i2 = 1.0 - cos_theta_i2;
    let eta2 = eta * eta;
    let eta_k2 = eta_k * eta_k;

    let t0 = eta2 - eta_k2 - sin_theta_i2;
    let a2plusb2 = (t0 * t0 + 4.0 * eta2 * eta_k2).sqrt();
    let t1 = a2plusb2 + cos_theta_i2;
    let a = (0.5 * (a2plusb2 + t0)).clamp_positive().sqrt();
    let t2 = 2.0 * cos_theta_i * a;
    let Rs = (t1 - t2) / (t1 + t2);

    let t3 = cos_theta_i2 * a2plusb2 + sin_theta_i2 * sin_theta_i2;
    let t4 = t2 * sin_theta_i2;
    let Rp = Rs * (t3 - t4) / (t3 + t4);

    0.5 * (Rp + Rs)
}

/// `r0 + (1 - r0)(1 - cos)^5`.
pub fn schlick(r0: Spectrum, cos_theta: Float) -> Spectrum {
    let m = (1.0 - cos_theta.abs()).clamp(0.0, 1.0);
    let m5 = m * m * m * m * m;
    r0 + (Spectrum::uniform(1.0) - r0) * m5
}

/// Normal-incidence reflectance of a dielectric with relative index `eta`.
pub fn schlick_r0(eta: Float) -> Float {
    sq!((eta - 1.0) / (eta + 1.0))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fresnel {
    /// Reflects everything.
    NoOp,
    Dielectric { eta_i: Float, eta_t: Float },
    Conductor { eta_i: Spectrum, eta_t: Spectrum, k: Spectrum },
    Schlick { r0: Spectrum },
}

impl Fresnel {
    /// Given the cosine of the angle made by the incoming direction and the surface normal,
    /// returns the amount of light reflected by the surface.
    pub fn evaluate(&self, cos_i: Float) -> Spectrum {
        match *self {
            Fresnel::NoOp => Spectrum::uniform(1.0),
            Fresnel::Dielectric { eta_i, eta_t } => Spectrum::uniform(fresnel_dielectric(cos_i, eta_i, eta_t)),
            Fresnel::Conductor { eta_i, eta_t, k } => fresnel_conductor(cos_i.abs(), eta_i, eta_t, k),
            Fresnel::Schlick { r0 } => schlick(r0, cos_i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_dielectric_normal_incidence() {
        assert_abs_diff_eq!(fresnel_dielectric(1.0, 1.0, 1.5), 0.04, epsilon = 1e-4);
        // same result from the inside
        assert_abs_diff_eq!(fresnel_dielectric(-1.0, 1.0, 1.5), 0.04, epsilon = 1e-4);
    }

    #[test]
    fn test_total_internal_reflection() {
        // 60 degrees inside glass is past the critical angle
        assert_eq!(fresnel_dielectric(-0.5, 1.0, 1.5), 1.0);
        assert!(fresnel_dielectric(0.5, 1.0, 1.5) < 1.0);
    }

    #[test]
    fn test_conductor_is_reflective() {
        let r = Fresnel::Conductor {
            eta_i: Spectrum::uniform(1.0),
            eta_t: Spectrum::rgb(0.2, 0.92, 1.1),
            k: Spectrum::rgb(3.9, 2.45, 2.14),
        }
        .evaluate(1.0);
        for i in 0..3 {
            assert!(r[i] > 0.5 && r[i] <= 1.0, "{:?}", r);
        }
    }

    #[test]
    fn test_schlick_limits() {
        let r0 = Spectrum::uniform(0.04);
        assert_abs_diff_eq!(schlick(r0, 1.0)[0], 0.04, epsilon = 1e-6);
        assert_abs_diff_eq!(schlick(r0, 0.0)[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(schlick_r0(1.5), 0.04, epsilon = 1e-6);
    }
}
