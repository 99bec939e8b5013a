use std::sync::Arc;

use crate::scene::Shape;
use crate::spectrum::Spectrum;
use crate::{Float, Point3f, Vec3f};

#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    pub position: Point3f,
    pub intensity: Spectrum,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpotLight {
    pub position: Point3f,
    pub direction: Vec3f,
    pub intensity: Spectrum,
    /// Full cone half-angle in degrees.
    pub total_width_deg: Float,
    /// Half-angle where falloff starts, in degrees.
    pub falloff_start_deg: Float,
}

/// Light arriving from infinitely far away, travelling along `direction`.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3f,
    pub radiance: Spectrum,
}

/// Emission from the surface of a primitive's shape. The owning primitive supplies the transform.
#[derive(Clone, Debug, PartialEq)]
pub struct AreaLight {
    pub shape: Arc<Shape>,
    pub emission: Spectrum,
    pub two_sided: bool,
}

/// Equirectangular radiance map surrounding the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentLight {
    pub width: u32,
    pub height: u32,
    /// Row-major, top row (+y) first.
    pub pixels: Vec<Spectrum>,
    pub scale: Float,
    /// Rotation about +y in degrees.
    pub rotation_deg: Float,
}

/// Analytic daylight sky.
#[derive(Clone, Debug, PartialEq)]
pub struct SkyLight {
    pub sun_direction: Vec3f,
    pub turbidity: Float,
    /// Multiplies the zenith luminance, which the model gives in kcd/m^2.
    pub scale: Float,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Point(PointLight),
    Spot(SpotLight),
    Directional(DirectionalLight),
    Area(AreaLight),
    Environment(EnvironmentLight),
    Sky(SkyLight),
}

impl Light {
    pub fn point(position: Point3f, intensity: Spectrum) -> Arc<Self> {
        Arc::new(Light::Point(PointLight { position, intensity }))
    }

    pub fn directional(direction: Vec3f, radiance: Spectrum) -> Arc<Self> {
        Arc::new(Light::Directional(DirectionalLight { direction, radiance }))
    }

    pub fn sky(sun_direction: Vec3f, turbidity: Float) -> Arc<Self> {
        Arc::new(Light::Sky(SkyLight { sun_direction, turbidity, scale: 0.1 }))
    }

    /// Constant-radiance environment.
    pub fn uniform_environment(radiance: Spectrum) -> Arc<Self> {
        Arc::new(Light::Environment(EnvironmentLight {
            width: 1,
            height: 1,
            pixels: vec![radiance],
            scale: 1.0,
            rotation_deg: 0.0,
        }))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Light::Point(_) => "point",
            Light::Spot(_) => "spot",
            Light::Directional(_) => "directional",
            Light::Area(_) => "area",
            Light::Environment(_) => "environment",
            Light::Sky(_) => "sky",
        }
    }

    /// Lights reached by rays that escape the scene.
    pub fn is_infinite(&self) -> bool {
        matches!(self, Light::Environment(_) | Light::Sky(_))
    }
}
