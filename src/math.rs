use crate::Float;

pub const INFINITY: Float = std::f32::INFINITY;
pub const NEG_INFINITY: Float = std::f32::NEG_INFINITY;

/// Largest float strictly below one, the upper end of every canonical sample.
pub const ONE_MINUS_EPSILON: Float = 1.0 - std::f32::EPSILON / 2.0;

pub fn lerp(t: Float, v1: Float, v2: Float) -> Float {
    (1.0 - t) * v1 + t * v2
}

pub fn clamp(v: Float, low: Float, high: Float) -> Float {
    if v < low {
        low
    } else if v > high {
        high
    } else {
        v
    }
}

/// Solves `a t^2 + b t + c = 0`, returning the roots in ascending order.
pub fn quadratic(a: Float, b: Float, c: Float) -> Option<(Float, Float)> {
    let discrim = b as f64 * b as f64 - 4.0 * a as f64 * c as f64;
    if discrim < 0.0 {
        return None;
    }
    let root_discrim = discrim.sqrt();

    let q = if b < 0.0 {
        -0.5 * (b as f64 - root_discrim)
    } else {
        -0.5 * (b as f64 + root_discrim)
    };
    if q == 0.0 || a == 0.0 {
        return None;
    }

    let t0 = (q / a as f64) as Float;
    let t1 = (c as f64 / q) as Float;
    if t0 > t1 { Some((t1, t0)) } else { Some((t0, t1)) }
}

/// SplitMix64 finaliser, used to derive independent RNG seeds from small integers.
pub fn mix_seed(a: u64, b: u64) -> u64 {
    let mut z = a ^ b.wrapping_add(0x9E37_79B9_7F4A_7C15).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
