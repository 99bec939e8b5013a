use std::sync::Arc;

use cgmath::InnerSpace;

use crate::compiler::layout::{self, int_word, LightKind, PackedRef};
use crate::compiler::node_cache::{NodeCache, NodeId, RecordLength};
use crate::compiler::shapes::ShapeCompiler;
use crate::compiler::table::{push3, KindTable};
use crate::compiler::AreaLightPolicy;
use crate::consts::{FRAC_PI_2, PI};
use crate::error::CompileError;
use crate::geometry::Transform;
use crate::sampling::Distribution2D;
use crate::scene::{AreaLight, EnvironmentLight, Light, Shape, SkyLight};
use crate::{Float, Vec3f};

pub fn light_kind(light: &Light) -> LightKind {
    match light {
        Light::Point(_) => LightKind::Point,
        Light::Spot(_) => LightKind::Spot,
        Light::Directional(_) => LightKind::Directional,
        Light::Area(_) => LightKind::Area,
        Light::Environment(_) => LightKind::Environment,
        Light::Sky(_) => LightKind::Sky,
    }
}

fn light_len(light: &Light) -> usize {
    match light {
        Light::Point(_) => layout::point_light::LEN,
        Light::Spot(_) => layout::spot_light::LEN,
        Light::Directional(_) => layout::directional_light::LEN,
        Light::Area(_) => layout::area_light::LEN,
        Light::Environment(env) => layout::environment_light::len(env.width as usize, env.height as usize),
        Light::Sky(_) => layout::sky_light::LEN,
    }
}

/// Whether the area-light sampler can handle emitters of this shape.
pub fn supports_area_shape(shape: &Shape) -> bool {
    matches!(shape, Shape::Sphere(_) | Shape::Triangle(_))
}

/// The primitive an area light is attached to.
#[derive(Clone, Copy, Debug)]
pub struct AreaLightOwner {
    pub primitive: usize,
    pub transform: Transform,
}

fn unit(v: Vec3f, what: &str) -> Result<Vec3f, CompileError> {
    let len2 = v.magnitude2();
    if len2 == 0.0 || !len2.is_finite() {
        return Err(CompileError::InvalidLight(format!("{} direction has zero length", what)));
    }
    Ok(v / len2.sqrt())
}

fn world_area(area: &AreaLight, transform: &Transform) -> Result<Float, CompileError> {
    match area.shape.as_ref() {
        Shape::Triangle(tri) => {
            let [p0, p1, p2] = tri.vertices.map(|p| transform.transform_point(p));
            Ok(0.5 * (p1 - p0).cross(p2 - p0).magnitude())
        }
        Shape::Sphere(sphere) => {
            let sx = transform.transform_vector(Vec3f::unit_x()).magnitude();
            let sy = transform.transform_vector(Vec3f::unit_y()).magnitude();
            let sz = transform.transform_vector(Vec3f::unit_z()).magnitude();
            if (sx - sy).abs() > 1e-3 * sx || (sx - sz).abs() > 1e-3 * sx {
                return Err(CompileError::InvalidLight(
                    "sphere area light needs a uniformly scaled transform".to_string(),
                ));
            }
            let r = sphere.radius * sx;
            Ok(4.0 * PI * r * r)
        }
        other => Err(CompileError::UnsupportedAreaLightShape { shape: other.name() }),
    }
}

fn encode_area(
    area: &AreaLight,
    owner: &AreaLightOwner,
    cache: &NodeCache,
    shapes: &ShapeCompiler,
    out: &mut Vec<Float>,
) -> Result<(), CompileError> {
    let shape_ref = shapes.find_offset_for(cache, &area.shape)?;
    let world_area = world_area(area, &owner.transform)?;
    if !(world_area > 0.0) {
        return Err(CompileError::InvalidLight("area light has zero surface area".to_string()));
    }
    out.push(shape_ref.to_word());
    out.push(int_word(owner.primitive as u32));
    push3(out, area.emission.clamp_positive().into_array());
    out.push(int_word(area.two_sided as u32));
    out.push(world_area);
    Ok(())
}

fn encode_environment(env: &EnvironmentLight, out: &mut Vec<Float>) -> Result<(), CompileError> {
    let (w, h) = (env.width as usize, env.height as usize);
    if w == 0 || h == 0 || env.pixels.len() != w * h {
        return Err(CompileError::InvalidLight(format!(
            "{}x{} environment map has {} pixels",
            w,
            h,
            env.pixels.len()
        )));
    }
    out.push(int_word(env.width));
    out.push(int_word(env.height));
    out.push(env.scale);
    out.push(env.rotation_deg.to_radians());

    let mut func = Vec::with_capacity(w * h);
    for (i, p) in env.pixels.iter().enumerate() {
        let p = p.clamp_positive();
        push3(out, p.into_array());
        // rows nearer the poles cover less solid angle
        let theta = PI * ((i / w) as Float + 0.5) / h as Float;
        func.push(p.luminance().max(0.0) * theta.sin());
    }
    Distribution2D::new(&func, w, h).write_to(out);
    Ok(())
}

/// Perez distribution coefficients `A..E` for luminance and the x, y chromaticities.
fn perez_coefficients(t: Float) -> [[Float; 5]; 3] {
    [
        [0.1787 * t - 1.4630, -0.3554 * t + 0.4275, -0.0227 * t + 5.3251, 0.1206 * t - 2.5771, -0.0670 * t + 0.3703],
        [-0.0193 * t - 0.2592, -0.0665 * t + 0.0008, -0.0004 * t + 0.2125, -0.0641 * t - 0.8989, -0.0033 * t + 0.0452],
        [-0.0167 * t - 0.2608, -0.0950 * t + 0.0092, -0.0079 * t + 0.2102, -0.0441 * t - 1.6537, -0.0109 * t + 0.0529],
    ]
}

pub fn perez(c: &[Float], cos_theta: Float, gamma: Float) -> Float {
    let cos_gamma = gamma.cos();
    (1.0 + c[0] * (c[1] / cos_theta.max(1e-3)).exp()) * (1.0 + c[2] * (c[3] * gamma).exp() + c[4] * cos_gamma * cos_gamma)
}

fn zenith_chromaticity(t: Float, theta_s: Float) -> (Float, Float) {
    let t2 = t * t;
    let (s, s2, s3) = (theta_s, theta_s * theta_s, theta_s * theta_s * theta_s);
    let x = t2 * (0.00166 * s3 - 0.00375 * s2 + 0.00209 * s)
        + t * (-0.02903 * s3 + 0.06377 * s2 - 0.03202 * s + 0.00394)
        + (0.11693 * s3 - 0.21196 * s2 + 0.06052 * s + 0.25886);
    let y = t2 * (0.00275 * s3 - 0.00610 * s2 + 0.00317 * s)
        + t * (-0.04214 * s3 + 0.08970 * s2 - 0.04153 * s + 0.00516)
        + (0.15346 * s3 - 0.26756 * s2 + 0.06670 * s + 0.26688);
    (x, y)
}

/// Preetham zenith luminance in kcd/m^2.
fn zenith_luminance(t: Float, theta_s: Float) -> Float {
    let chi = (4.0 / 9.0 - t / 120.0) * (PI - 2.0 * theta_s);
    (4.0453 * t - 4.9710) * chi.tan() - 0.2155 * t + 2.4192
}

fn encode_sky(sky: &SkyLight, out: &mut Vec<Float>) -> Result<(), CompileError> {
    let sun = unit(sky.sun_direction, "sun")?;
    if !(1.7..=10.0).contains(&sky.turbidity) {
        return Err(CompileError::InvalidLight(format!("sky turbidity {} outside [1.7, 10]", sky.turbidity)));
    }
    // the model is only defined for a sun at or above the horizon
    let theta_s = sun.y.clamp(0.0, 1.0).acos().min(FRAC_PI_2);
    let coefficients = perez_coefficients(sky.turbidity);
    let (xz, yz) = zenith_chromaticity(sky.turbidity, theta_s);

    push3(out, sun.into());
    out.push(sky.turbidity);
    out.push(sky.scale);
    for c in &coefficients {
        out.extend_from_slice(c);
    }
    out.extend_from_slice(&[sky.scale * zenith_luminance(sky.turbidity, theta_s), xz, yz]);
    for c in &coefficients {
        out.push(perez(c, 1.0, theta_s));
    }
    Ok(())
}

fn encode_light(
    id: NodeId<Light>,
    light: &Light,
    cache: &NodeCache,
    shapes: &ShapeCompiler,
    owners: &[Option<AreaLightOwner>],
    out: &mut Vec<Float>,
) -> Result<(), CompileError> {
    match light {
        Light::Point(p) => {
            push3(out, p.position.into());
            push3(out, p.intensity.clamp_positive().into_array());
        }
        Light::Spot(s) => {
            push3(out, s.position.into());
            push3(out, unit(s.direction, "spot light")?.into());
            push3(out, s.intensity.clamp_positive().into_array());
            let total = s.total_width_deg.to_radians();
            let falloff = s.falloff_start_deg.min(s.total_width_deg).to_radians();
            out.push(total.cos());
            out.push(falloff.cos());
        }
        Light::Directional(d) => {
            push3(out, unit(d.direction, "directional light")?.into());
            push3(out, d.radiance.clamp_positive().into_array());
        }
        Light::Area(area) => {
            let owner = owners
                .get(id.index())
                .copied()
                .flatten()
                .ok_or(CompileError::OrphanAreaLight { light: id.index() })?;
            encode_area(area, &owner, cache, shapes, out)?;
        }
        Light::Environment(env) => encode_environment(env, out)?,
        Light::Sky(sky) => encode_sky(sky, out)?,
    }
    Ok(())
}

/// Light arrays plus the list of lights reached by escaping rays.
pub struct LightCompiler {
    table: KindTable<Light, LightKind>,
    infinite: Vec<PackedRef>,
    filtered: usize,
}

impl LightCompiler {
    pub fn new() -> Self {
        Self { table: KindTable::new(), infinite: Vec::new(), filtered: 0 }
    }

    /// Rebuilds the light arrays. Runs after the shape compiler, whose offsets area-light records
    /// embed. `owners` is indexed by light node id.
    pub fn setup(
        &mut self,
        cache: &NodeCache,
        shapes: &ShapeCompiler,
        owners: &[Option<AreaLightOwner>],
        policy: AreaLightPolicy,
    ) -> Result<(), CompileError> {
        self.table.clear(cache);
        self.infinite.clear();
        self.filtered = 0;

        for (id, light) in cache.list::<Light>().iter() {
            if let Light::Area(area) = light.as_ref() {
                if owners.get(id.index()).copied().flatten().is_none() {
                    return Err(CompileError::OrphanAreaLight { light: id.index() });
                }
                if !supports_area_shape(&area.shape) {
                    match policy {
                        AreaLightPolicy::Strict => {
                            return Err(CompileError::UnsupportedAreaLightShape { shape: area.shape.name() })
                        }
                        AreaLightPolicy::Skip => {
                            tracing::warn!(
                                light = id.index(),
                                shape = area.shape.name(),
                                "area light shape is not supported, light left out of the render"
                            );
                            self.table.mark_filtered(id);
                            self.filtered += 1;
                        }
                    }
                }
            }
        }

        let accepted = |light: &Light| match light {
            Light::Area(area) => supports_area_shape(&area.shape),
            _ => true,
        };
        for &kind in LightKind::ALL {
            self.table.pack_kind(
                cache,
                kind,
                |l| light_kind(l) == kind && accepted(l),
                RecordLength::PerInstance(&light_len),
                |id, light, out| encode_light(id, light, cache, shapes, owners, out),
            )?;
        }
        self.table.finish();

        for light in cache.distinct::<Light>() {
            if light.is_infinite() {
                self.infinite.push(self.table.find_offset_for(cache, light)?);
            }
        }
        Ok(())
    }

    pub fn find_offset_for(&self, cache: &NodeCache, light: &Arc<Light>) -> Result<PackedRef, CompileError> {
        self.table.find_offset_for(cache, light)
    }

    /// `None` for a light the area-light policy filtered out.
    pub fn lookup(&self, cache: &NodeCache, light: &Arc<Light>) -> Result<Option<PackedRef>, CompileError> {
        self.table.lookup(cache, light)
    }

    pub fn array(&self, kind: LightKind) -> &[Float] {
        self.table.array(kind)
    }

    pub fn arrays(&self) -> &[Vec<Float>] {
        self.table.arrays()
    }

    pub fn index(&self) -> &[PackedRef] {
        self.table.index()
    }

    pub fn infinite(&self) -> &[PackedRef] {
        &self.infinite
    }

    /// Number of lights dropped by the area-light policy in the last setup.
    pub fn filtered(&self) -> usize {
        self.filtered
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn total_words(&self) -> usize {
        self.table.total_words()
    }
}

impl Default for LightCompiler {
    fn default() -> Self {
        Self::new()
    }
}
