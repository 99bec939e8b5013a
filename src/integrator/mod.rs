//! Path tracing over a compiled scene, and the backends that run it.
//!
//! [`path::render_pixel`] is the only estimator. A [`PassExecutor`] decides how the pixels of one
//! pass are spread over hardware: [`CpuExecutor`] splits rows across a rayon pool, while
//! [`DeviceExecutor`] uploads the compiled arrays to a [`ComputeDevice`] and dispatches one lane
//! per pixel.

use cgmath::InnerSpace;

use crate::compiler::CompiledScene;
use crate::error::BackendError;
use crate::film::PassBuffer;
use crate::geometry::offset_ray_origin;
use crate::kernel::lights::{self, LightSample};
use crate::kernel::{SceneView, SurfaceInteraction};
use crate::reflection::{Bsdf, BxDFType};
use crate::sampler::Sampler;
use crate::sampling::power_heuristic;
use crate::spectrum::Spectrum;
use crate::{Float, Ray};

pub mod cpu;
pub mod device;
pub mod path;

pub use cpu::CpuExecutor;
pub use device::{open_device, ComputeDevice, DeviceBuffers, DeviceExecutor, HostDevice, LaneKernel};

/// Shadow rays stop this fraction short of the sampled light point.
const SHADOW_EPSILON: Float = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegratorSettings {
    /// Longest path, in bounces, whose emission is counted.
    pub max_depth: u32,
    pub russian_roulette: bool,
    /// Bounces before Russian roulette may end a path.
    pub rr_min_bounces: u32,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            max_depth: 8,
            russian_roulette: true,
            rr_min_bounces: 3,
        }
    }
}

/// Inputs of one progressive pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassParams {
    pub integrator: IntegratorSettings,
    pub samples_per_pixel: u32,
    pub seed: u64,
    /// Index of this pass within the current accumulation.
    pub pass_index: u64,
}

impl PassParams {
    /// Seed shared by every random stream of this pass.
    pub fn pass_seed(&self) -> u64 {
        crate::math::mix_seed(self.seed, self.pass_index)
    }
}

/// Which kind of executor a session starts with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Cpu,
    Device,
}

/// What a session does when its device cannot run a pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Switch to the CPU executor and rerun the pass.
    #[default]
    Cpu,
    /// Fail the session with the device's error.
    Abort,
}

/// Renders whole passes of a compiled scene into a [`PassBuffer`].
pub trait PassExecutor: Send {
    fn name(&self) -> &str;

    fn backend(&self) -> Backend;

    fn render_pass(&mut self, scene: &CompiledScene, params: &PassParams, out: &mut PassBuffer) -> Result<(), BackendError>;
}

/// The chance of picking any one light for next-event estimation.
pub(crate) fn light_select_pdf(view: &SceneView<'_>) -> Float {
    match view.light_index.len() {
        0 => 0.0,
        n => 1.0 / n as Float,
    }
}

/// Direct lighting at `si` from one light picked uniformly, weighted against BSDF sampling.
pub fn uniform_sample_one_light(
    view: &SceneView<'_>,
    si: &SurfaceInteraction,
    bsdf: &Bsdf,
    sampler: &mut impl Sampler,
) -> Spectrum {
    let n_lights = view.light_index.len();
    if n_lights == 0 {
        return Spectrum::black();
    }
    let choice = ((sampler.get_1d() * n_lights as Float) as usize).min(n_lights - 1);
    let light = view.light_index[choice];
    let u_light = sampler.get_2d();

    match lights::sample_li(view, light, si.p, u_light) {
        Some(sample) => estimate_direct(view, si, bsdf, &sample, light_select_pdf(view)),
        None => Spectrum::black(),
    }
}

/// One light sample's contribution, divided by the chance `select_pdf` of having picked its light.
fn estimate_direct(
    view: &SceneView<'_>,
    si: &SurfaceInteraction,
    bsdf: &Bsdf,
    sample: &LightSample,
    select_pdf: Float,
) -> Spectrum {
    let f = (bsdf.f(si.wo, sample.wi, BxDFType::all()) * sample.wi.dot(si.ns).abs()).clamp_positive();
    if f.is_black() {
        return Spectrum::black();
    }

    let origin = offset_ray_origin(si.p, si.ng, sample.wi);
    let t_max = if sample.distance.is_finite() {
        sample.distance * (1.0 - SHADOW_EPSILON)
    } else {
        Float::INFINITY
    };
    if view.occluded(&Ray::new(origin, sample.wi), 0.0, t_max) {
        return Spectrum::black();
    }

    let light_pdf = sample.pdf * select_pdf;
    if sample.is_delta {
        (f * sample.li / light_pdf).clamp_positive()
    } else {
        // the emitter-hit side in `path` weighs with the same pair of densities
        let scattering_pdf = bsdf.pdf(si.wo, sample.wi, BxDFType::all());
        let weight = power_heuristic(1, light_pdf, 1, scattering_pdf);
        (f * sample.li * weight / light_pdf).clamp_positive()
    }
}
