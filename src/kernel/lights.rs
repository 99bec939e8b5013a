//! Light sampling, emitted radiance and solid-angle densities over light records.

use cgmath::{EuclideanSpace, InnerSpace};

use crate::compiler::layout::{self, read3, word_int, LightKind, PackedRef, ShapeKind};
use crate::compiler::lights::perez;
use crate::compiler::NodeKind;
use crate::consts::{FRAC_1_PI, PI};
use crate::geometry::{affine_normal, affine_point};
use crate::kernel::SceneView;
use crate::sampling::{cosine_sample_hemisphere, uniform_sample_sphere, uniform_sample_triangle, Distribution2DRef};
use crate::spectrum::Spectrum;
use crate::{Float, Point2f, Point3f, Vec3f};

/// Incident radiance toward a shading point from one light sample.
#[derive(Clone, Copy, Debug)]
pub struct LightSample {
    pub li: Spectrum,
    /// Unit direction from the shading point toward the light.
    pub wi: Vec3f,
    /// Solid-angle density, or 1 for delta lights.
    pub pdf: Float,
    /// Distance to the sampled point, infinite for directional and infinite lights.
    pub distance: Float,
    pub is_delta: bool,
}

pub fn is_delta(light: PackedRef) -> bool {
    matches!(
        LightKind::from_id(light.kind()),
        Some(LightKind::Point | LightKind::Spot | LightKind::Directional)
    )
}

fn point(words: &[Float], at: usize) -> Point3f {
    Point3f::from(read3(words, at))
}

fn vector(words: &[Float], at: usize) -> Vec3f {
    Vec3f::from(read3(words, at))
}

fn spectrum(words: &[Float], at: usize) -> Spectrum {
    Spectrum::from(read3(words, at))
}

fn spot_falloff(rec: &[Float], w: Vec3f) -> Float {
    use layout::spot_light::*;
    let cos_theta = w.dot(vector(rec, DIRECTION));
    let cos_total = rec[COS_TOTAL];
    let cos_falloff = rec[COS_FALLOFF];
    if cos_theta < cos_total {
        return 0.0;
    }
    if cos_theta >= cos_falloff || cos_falloff <= cos_total {
        return 1.0;
    }
    let delta = (cos_theta - cos_total) / (cos_falloff - cos_total);
    (delta * delta) * (delta * delta)
}

/// Equirectangular coordinates of a world direction, `v = 0` at +y.
fn environment_uv(rec: &[Float], w: Vec3f) -> (Point2f, Float) {
    let rotation = rec[layout::environment_light::ROTATION];
    let cos_theta = w.y.clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    let phi = (w.z.atan2(w.x) - rotation).rem_euclid(2.0 * PI);
    (Point2f::new(phi / (2.0 * PI), theta / PI), theta.sin())
}

fn environment_lookup(rec: &[Float], uv: Point2f) -> Spectrum {
    use layout::environment_light::*;
    let w = word_int(rec[WIDTH]) as usize;
    let h = word_int(rec[HEIGHT]) as usize;
    let x = ((uv.x * w as Float) as usize).min(w - 1);
    let y = ((uv.y * h as Float) as usize).min(h - 1);
    spectrum(rec, HEADER + 3 * (y * w + x)) * rec[SCALE]
}

fn environment_distribution(rec: &[Float]) -> Distribution2DRef<'_> {
    use layout::environment_light::*;
    let w = word_int(rec[WIDTH]) as usize;
    let h = word_int(rec[HEIGHT]) as usize;
    Distribution2DRef::from_words(&rec[distribution_at(w, h)..], w, h)
}

fn sky_radiance(rec: &[Float], w: Vec3f) -> Spectrum {
    use layout::sky_light::*;
    if w.y <= 0.0 {
        return Spectrum::black();
    }
    let sun = vector(rec, SUN);
    let gamma = w.dot(sun).clamp(-1.0, 1.0).acos();
    let channel = |i: usize, coefficients: usize| {
        let normalizer = rec[NORMALIZER + i];
        let value = rec[ZENITH + i] * perez(&rec[coefficients..coefficients + 5], w.y, gamma);
        if normalizer > 0.0 { value / normalizer } else { 0.0 }
    };
    let luminance = channel(0, PEREZ_Y);
    let x = channel(1, PEREZ_X_CHROMA);
    let y = channel(2, PEREZ_Y_CHROMA);
    if !(y > 0.0) {
        return Spectrum::black();
    }
    let xyz = [x / y * luminance, luminance, (1.0 - x - y) / y * luminance];
    Spectrum::from_xyz(xyz).clamp_positive()
}

/// Radiance arriving along `-w` from an infinite light, black for other kinds.
pub fn infinite_le(view: &SceneView<'_>, light: PackedRef, w: Vec3f) -> Spectrum {
    let Some((kind, rec)) = view.light_record(light) else {
        return Spectrum::black();
    };
    match kind {
        LightKind::Environment => environment_lookup(rec, environment_uv(rec, w).0),
        LightKind::Sky => sky_radiance(rec, w),
        _ => Spectrum::black(),
    }
}

/// Radiance leaving an area light's surface with normal `n` in direction `w`.
pub fn area_le(view: &SceneView<'_>, light: PackedRef, n: Vec3f, w: Vec3f) -> Spectrum {
    match view.light_record(light) {
        Some((LightKind::Area, rec)) => {
            let two_sided = word_int(rec[layout::area_light::TWO_SIDED]) != 0;
            if two_sided || n.dot(w) > 0.0 {
                spectrum(rec, layout::area_light::EMISSION)
            } else {
                Spectrum::black()
            }
        }
        _ => Spectrum::black(),
    }
}

/// Samples a point on an area light's surface, returning it with its world normal.
fn sample_area_point(view: &SceneView<'_>, rec: &[Float], u: Point2f) -> Option<(Point3f, Vec3f)> {
    let shape_ref = PackedRef::from_word(rec[layout::area_light::SHAPE]);
    let prim = view.primitive(word_int(rec[layout::area_light::PRIMITIVE]) as usize)?;
    let shape = view.shape_record(shape_ref)?;
    let (p, n) = match ShapeKind::from_id(shape_ref.kind())? {
        ShapeKind::Sphere => {
            let center = point(shape, layout::sphere::CENTER);
            let n = uniform_sample_sphere(u);
            (center + n * shape[layout::sphere::RADIUS], n)
        }
        ShapeKind::Triangle => {
            let p0 = point(shape, layout::triangle::P0).to_vec();
            let p1 = point(shape, layout::triangle::P1).to_vec();
            let p2 = point(shape, layout::triangle::P2).to_vec();
            let (b0, b1) = uniform_sample_triangle(u);
            let p = Point3f::from_vec(p0 * b0 + p1 * b1 + p2 * (1.0 - b0 - b1));
            (p, (p1 - p0).cross(p2 - p0))
        }
        _ => return None,
    };
    let n = affine_normal(prim.to_object, n);
    if n.magnitude2() == 0.0 {
        return None;
    }
    Some((affine_point(prim.to_world, p), n.normalize()))
}

/// Samples incident radiance at `p` from `light`. `None` means the sample carries no light.
pub fn sample_li(view: &SceneView<'_>, light: PackedRef, p: Point3f, u: Point2f) -> Option<LightSample> {
    let (kind, rec) = view.light_record(light)?;
    let sample = match kind {
        LightKind::Point | LightKind::Spot => {
            let position = point(rec, layout::point_light::POSITION);
            let d = position - p;
            let dist2 = d.magnitude2();
            if dist2 == 0.0 {
                return None;
            }
            let distance = dist2.sqrt();
            let wi = d / distance;
            let li = if kind == LightKind::Point {
                spectrum(rec, layout::point_light::INTENSITY) / dist2
            } else {
                spectrum(rec, layout::spot_light::INTENSITY) * spot_falloff(rec, -wi) / dist2
            };
            LightSample { li, wi, pdf: 1.0, distance, is_delta: true }
        }
        LightKind::Directional => LightSample {
            li: spectrum(rec, layout::directional_light::RADIANCE),
            wi: -vector(rec, layout::directional_light::DIRECTION),
            pdf: 1.0,
            distance: Float::INFINITY,
            is_delta: true,
        },
        LightKind::Area => {
            let (p_light, n) = sample_area_point(view, rec, u)?;
            let d = p_light - p;
            let dist2 = d.magnitude2();
            if dist2 == 0.0 {
                return None;
            }
            let distance = dist2.sqrt();
            let wi = d / distance;
            let cos_light = n.dot(-wi).abs();
            if cos_light == 0.0 {
                return None;
            }
            LightSample {
                li: area_le(view, light, n, -wi),
                wi,
                pdf: dist2 / (cos_light * rec[layout::area_light::AREA]),
                distance,
                is_delta: false,
            }
        }
        LightKind::Environment => {
            let (uv, map_pdf) = environment_distribution(rec).sample_continuous(u);
            if map_pdf == 0.0 {
                return None;
            }
            let theta = uv.y * PI;
            let phi = uv.x * 2.0 * PI + rec[layout::environment_light::ROTATION];
            let sin_theta = theta.sin();
            if sin_theta == 0.0 {
                return None;
            }
            let wi = Vec3f::new(sin_theta * phi.cos(), theta.cos(), sin_theta * phi.sin());
            LightSample {
                li: environment_lookup(rec, uv),
                wi,
                pdf: map_pdf / (2.0 * PI * PI * sin_theta),
                distance: Float::INFINITY,
                is_delta: false,
            }
        }
        LightKind::Sky => {
            let local = cosine_sample_hemisphere(u);
            let wi = Vec3f::new(local.x, local.z, local.y);
            LightSample {
                li: sky_radiance(rec, wi),
                wi,
                pdf: local.z * FRAC_1_PI,
                distance: Float::INFINITY,
                is_delta: false,
            }
        }
    };
    if sample.pdf > 0.0 && !sample.li.is_black() {
        Some(sample)
    } else {
        None
    }
}

/// Solid-angle density with which [`sample_li`] picks direction `wi` toward an infinite light.
pub fn infinite_pdf(view: &SceneView<'_>, light: PackedRef, wi: Vec3f) -> Float {
    match view.light_record(light) {
        Some((LightKind::Environment, rec)) => {
            let (uv, sin_theta) = environment_uv(rec, wi);
            if sin_theta == 0.0 {
                return 0.0;
            }
            environment_distribution(rec).pdf(uv) / (2.0 * PI * PI * sin_theta)
        }
        Some((LightKind::Sky, _)) => wi.y.max(0.0) * FRAC_1_PI,
        _ => 0.0,
    }
}

/// Solid-angle density of reaching `p_light`, with surface normal `n_light`, from `p` by sampling
/// the area light.
pub fn area_pdf(view: &SceneView<'_>, light: PackedRef, p: Point3f, p_light: Point3f, n_light: Vec3f) -> Float {
    let Some((LightKind::Area, rec)) = view.light_record(light) else {
        return 0.0;
    };
    let d = p_light - p;
    let dist2 = d.magnitude2();
    if dist2 == 0.0 {
        return 0.0;
    }
    let cos_light = n_light.dot(d / dist2.sqrt()).abs();
    if cos_light == 0.0 {
        return 0.0;
    }
    dist2 / (cos_light * rec[layout::area_light::AREA])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_spot_falloff_profile() {
        let mut rec = vec![0.0; layout::spot_light::LEN];
        rec[layout::spot_light::DIRECTION + 1] = -1.0;
        rec[layout::spot_light::COS_TOTAL] = 30.0_f32.to_radians().cos();
        rec[layout::spot_light::COS_FALLOFF] = 20.0_f32.to_radians().cos();
        assert_eq!(spot_falloff(&rec, Vec3f::new(0.0, -1.0, 0.0)), 1.0);
        assert_eq!(spot_falloff(&rec, Vec3f::new(1.0, 0.0, 0.0)), 0.0);
        let w = Vec3f::new(25.0_f32.to_radians().sin(), -25.0_f32.to_radians().cos(), 0.0);
        let f = spot_falloff(&rec, w);
        assert!(f > 0.0 && f < 1.0);
    }

    #[test]
    fn test_environment_uv_covers_sphere() {
        let mut rec = vec![0.0; layout::environment_light::HEADER];
        rec[layout::environment_light::ROTATION] = 0.0;
        let (uv, sin_theta) = environment_uv(&rec, Vec3f::new(0.0, 1.0, 0.0));
        assert_abs_diff_eq!(uv.y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sin_theta, 0.0, epsilon = 1e-6);
        let (uv, _) = environment_uv(&rec, Vec3f::new(-1.0, 0.0, 0.0));
        assert_abs_diff_eq!(uv.x, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(uv.y, 0.5, epsilon = 1e-6);
    }
}
