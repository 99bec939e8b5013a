//! Data-parallel execution on a compute device.
//!
//! Every flat array of a compiled scene is copied into device memory as plain `u32` words, in the
//! fixed slot order of [`slot`]. A dispatch runs a [`LaneKernel`] once per pixel; the kernel sees
//! the scene only through a [`SceneView`] rebuilt from those words by [`bind`].

use bytemuck::Pod;
use rayon::prelude::*;

use crate::bvh::BvhView;
use crate::compiler::layout::{CameraRecord, LightKind, MaterialKind, ShapeKind, TextureKind};
use crate::compiler::CompiledScene;
use crate::error::BackendError;
use crate::film::PassBuffer;
use crate::integrator::{path, Backend, PassExecutor, PassParams};
use crate::kernel::SceneView;
use crate::math::mix_seed;
use crate::sampler::RandomSampler;
use crate::spectrum::Spectrum;
use crate::Float;

/// Buffer slots in device memory.
pub mod slot {
    use super::*;

    pub const SHAPES: usize = 0;
    pub const TEXTURES: usize = SHAPES + ShapeKind::COUNT;
    pub const MATERIALS: usize = TEXTURES + TextureKind::COUNT;
    pub const LIGHTS: usize = MATERIALS + MaterialKind::COUNT;
    pub const LIGHT_INDEX: usize = LIGHTS + LightKind::COUNT;
    pub const INFINITE_LIGHTS: usize = LIGHT_INDEX + 1;
    pub const PRIMITIVES: usize = INFINITE_LIGHTS + 1;
    pub const BVH_NODES: usize = PRIMITIVES + 1;
    pub const BVH_REFS: usize = BVH_NODES + 1;
    pub const UNBOUNDED: usize = BVH_REFS + 1;
    pub const CAMERA: usize = UNBOUNDED + 1;
    pub const COUNT: usize = CAMERA + 1;
}

/// Host-side staging copy of a compiled scene, ready for upload.
#[derive(Clone, Debug, Default)]
pub struct DeviceBuffers {
    generation: u64,
    buffers: Vec<Vec<u32>>,
}

fn words<T: Pod>(data: &[T]) -> Vec<u32> {
    bytemuck::cast_slice(data).to_vec()
}

impl DeviceBuffers {
    pub fn from_scene(scene: &CompiledScene) -> Self {
        let view = scene.view();
        let mut buffers = Vec::with_capacity(slot::COUNT);
        buffers.extend(view.shapes.iter().map(|a| words(*a)));
        buffers.extend(view.textures.iter().map(|a| words(*a)));
        buffers.extend(view.materials.iter().map(|a| words(*a)));
        buffers.extend(view.lights.iter().map(|a| words(*a)));
        buffers.push(words(view.light_index));
        buffers.push(words(view.infinite_lights));
        buffers.push(words(view.primitives));
        buffers.push(words(view.bvh.nodes));
        buffers.push(words(view.bvh.refs));
        buffers.push(view.unbounded.to_vec());
        buffers.push(words(std::slice::from_ref(&view.camera)));
        debug_assert_eq!(buffers.len(), slot::COUNT);

        Self {
            generation: scene.generation(),
            buffers,
        }
    }

    /// Generation of the compiled scene these buffers were staged from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn buffers(&self) -> &[Vec<u32>] {
        &self.buffers
    }

    pub fn total_bytes(&self) -> usize {
        self.buffers.iter().map(|b| b.len() * 4).sum()
    }
}

fn buffer(buffers: &[Vec<u32>], index: usize) -> Result<&[u32], BackendError> {
    buffers.get(index).map(Vec::as_slice).ok_or(BackendError::MissingBuffer { index })
}

fn floats(buffers: &[Vec<u32>], index: usize) -> Result<&[Float], BackendError> {
    Ok(bytemuck::cast_slice(buffer(buffers, index)?))
}

fn typed<'a, T: Pod>(buffers: &'a [Vec<u32>], index: usize, what: &'static str) -> Result<&'a [T], BackendError> {
    bytemuck::try_cast_slice(buffer(buffers, index)?).map_err(|_| BackendError::MalformedBuffer { index, what })
}

/// Rebuilds a [`SceneView`] over buffers laid out in [`slot`] order.
pub fn bind(buffers: &[Vec<u32>]) -> Result<SceneView<'_>, BackendError> {
    let camera: &[CameraRecord] = typed(buffers, slot::CAMERA, "camera")?;
    let camera = *camera
        .first()
        .ok_or(BackendError::MalformedBuffer { index: slot::CAMERA, what: "camera" })?;

    let mut view = SceneView::empty(camera);
    for (i, array) in view.shapes.iter_mut().enumerate() {
        *array = floats(buffers, slot::SHAPES + i)?;
    }
    for (i, array) in view.textures.iter_mut().enumerate() {
        *array = floats(buffers, slot::TEXTURES + i)?;
    }
    for (i, array) in view.materials.iter_mut().enumerate() {
        *array = floats(buffers, slot::MATERIALS + i)?;
    }
    for (i, array) in view.lights.iter_mut().enumerate() {
        *array = floats(buffers, slot::LIGHTS + i)?;
    }
    view.light_index = typed(buffers, slot::LIGHT_INDEX, "light index")?;
    view.infinite_lights = typed(buffers, slot::INFINITE_LIGHTS, "infinite light")?;
    view.primitives = floats(buffers, slot::PRIMITIVES)?;
    view.bvh = BvhView {
        nodes: typed(buffers, slot::BVH_NODES, "bvh node")?,
        refs: typed(buffers, slot::BVH_REFS, "bvh reference")?,
    };
    view.unbounded = buffer(buffers, slot::UNBOUNDED)?;
    Ok(view)
}

/// Work done by one lane of a dispatch.
pub trait LaneKernel: Sync {
    fn lane(&self, view: &SceneView<'_>, x: u32, y: u32) -> Spectrum;
}

/// A device that holds scene buffers and runs kernels over 2D grids of lanes.
pub trait ComputeDevice: Send {
    fn name(&self) -> &str;

    /// Replaces device memory with `buffers`.
    fn upload(&mut self, buffers: &DeviceBuffers) -> Result<(), BackendError>;

    /// Generation of the scene currently resident in device memory.
    fn resident_generation(&self) -> Option<u64>;

    /// Runs `kernel` for every `(x, y)` of a `width` by `height` grid, writing lane `(x, y)` to
    /// `output[y * width + x]`. Lanes are independent and may run in any order.
    fn dispatch(&self, width: u32, height: u32, kernel: &dyn LaneKernel, output: &mut [Spectrum]) -> Result<(), BackendError>;
}

/// Software device: device memory is host memory and lanes run on the global rayon pool.
#[derive(Debug, Default)]
pub struct HostDevice {
    memory: Option<DeviceBuffers>,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComputeDevice for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn upload(&mut self, buffers: &DeviceBuffers) -> Result<(), BackendError> {
        // validate before replacing what is resident
        bind(buffers.buffers())?;
        self.memory = Some(buffers.clone());
        Ok(())
    }

    fn resident_generation(&self) -> Option<u64> {
        self.memory.as_ref().map(DeviceBuffers::generation)
    }

    fn dispatch(&self, width: u32, height: u32, kernel: &dyn LaneKernel, output: &mut [Spectrum]) -> Result<(), BackendError> {
        let memory = self.memory.as_ref().ok_or(BackendError::NotUploaded)?;
        let lanes = width as usize * height as usize;
        if output.len() != lanes {
            return Err(BackendError::InvalidLaunch { expected: lanes, actual: output.len() });
        }
        let view = bind(memory.buffers())?;
        let width = width as usize;
        output.par_iter_mut().enumerate().for_each(|(i, out)| {
            *out = kernel.lane(&view, (i % width) as u32, (i / width) as u32);
        });
        Ok(())
    }
}

/// Opens a compute device by name.
pub fn open_device(name: &str) -> Result<Box<dyn ComputeDevice>, BackendError> {
    match name {
        "host" => Ok(Box::new(HostDevice::new())),
        _ => Err(BackendError::Unavailable { device: name.to_string() }),
    }
}

/// The path tracer as a lane kernel. Each lane seeds its own sampler from its pixel index.
struct PathKernel<'p> {
    params: &'p PassParams,
    width: u32,
    pass_seed: u64,
}

impl LaneKernel for PathKernel<'_> {
    fn lane(&self, view: &SceneView<'_>, x: u32, y: u32) -> Spectrum {
        let pixel = y as u64 * self.width as u64 + x as u64;
        let mut sampler = RandomSampler::new_with_seed(mix_seed(self.pass_seed, pixel));
        path::render_pixel(view, &self.params.integrator, x, y, self.params.samples_per_pixel, &mut sampler)
    }
}

/// Runs passes on a [`ComputeDevice`], uploading the scene whenever its generation changes.
pub struct DeviceExecutor {
    device: Box<dyn ComputeDevice>,
}

impl DeviceExecutor {
    pub fn new(device: Box<dyn ComputeDevice>) -> Self {
        Self { device }
    }

    pub fn open(name: &str) -> Result<Self, BackendError> {
        open_device(name).map(Self::new)
    }

    pub fn device(&self) -> &dyn ComputeDevice {
        self.device.as_ref()
    }
}

impl PassExecutor for DeviceExecutor {
    fn name(&self) -> &str {
        self.device.name()
    }

    fn backend(&self) -> Backend {
        Backend::Device
    }

    #[tracing::instrument(skip_all, fields(pass = params.pass_index, device = self.device.name()))]
    fn render_pass(&mut self, scene: &CompiledScene, params: &PassParams, out: &mut PassBuffer) -> Result<(), BackendError> {
        if self.device.resident_generation() != Some(scene.generation()) {
            let buffers = DeviceBuffers::from_scene(scene);
            tracing::debug!(generation = buffers.generation(), bytes = buffers.total_bytes(), "uploading scene");
            self.device.upload(&buffers)?;
        }
        let (width, height) = out.resolution();
        let kernel = PathKernel {
            params,
            width,
            pass_seed: params.pass_seed(),
        };
        self.device.dispatch(width, height, &kernel, out.pixels_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOptions;
    use crate::integrator::IntegratorSettings;
    use crate::scene::test_scenes;

    fn compiled() -> CompiledScene {
        CompiledScene::compile(&test_scenes::spheres(8, 6, None), &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_bound_view_matches_compiled_view() {
        let scene = compiled();
        let buffers = DeviceBuffers::from_scene(&scene);
        let bound = bind(buffers.buffers()).unwrap();
        let direct = scene.view();

        assert_eq!(bound.camera, direct.camera);
        assert_eq!(bound.primitives, direct.primitives);
        assert_eq!(bound.bvh.nodes, direct.bvh.nodes);
        assert_eq!(bound.bvh.refs, direct.bvh.refs);
        assert_eq!(bound.unbounded, direct.unbounded);
        assert_eq!(bound.light_index, direct.light_index);
        for kind in 0..MaterialKind::COUNT {
            assert_eq!(bound.materials[kind], direct.materials[kind]);
        }
        for kind in 0..LightKind::COUNT {
            assert_eq!(bound.lights[kind], direct.lights[kind]);
        }
    }

    #[test]
    fn test_malformed_buffers_rejected() {
        let scene = compiled();
        let mut buffers = DeviceBuffers::from_scene(&scene);
        buffers.buffers[slot::BVH_NODES].push(0);
        let err = bind(buffers.buffers()).unwrap_err();
        assert!(matches!(err, BackendError::MalformedBuffer { index, .. } if index == slot::BVH_NODES));

        buffers.buffers.truncate(slot::CAMERA);
        assert!(matches!(bind(buffers.buffers()), Err(BackendError::MissingBuffer { .. })));
    }

    #[test]
    fn test_dispatch_requires_upload() {
        struct Constant;
        impl LaneKernel for Constant {
            fn lane(&self, _view: &SceneView<'_>, x: u32, y: u32) -> Spectrum {
                Spectrum::rgb(x as Float, y as Float, 0.0)
            }
        }

        let mut device = HostDevice::new();
        let mut output = vec![Spectrum::black(); 6];
        assert!(matches!(device.dispatch(3, 2, &Constant, &mut output), Err(BackendError::NotUploaded)));

        device.upload(&DeviceBuffers::from_scene(&compiled())).unwrap();
        device.dispatch(3, 2, &Constant, &mut output).unwrap();
        assert_eq!(output[5], Spectrum::rgb(2.0, 1.0, 0.0));
        let err = device.dispatch(4, 2, &Constant, &mut output).unwrap_err();
        assert!(matches!(err, BackendError::InvalidLaunch { expected: 8, actual: 6 }));
    }

    #[test]
    fn test_unknown_device_unavailable() {
        assert!(open_device("host").is_ok());
        assert!(matches!(open_device("vulkan0"), Err(BackendError::Unavailable { .. })));
    }

    #[test]
    fn test_executor_uploads_once_per_generation() {
        let scene = compiled();
        let mut executor = DeviceExecutor::open("host").unwrap();
        let params = PassParams {
            integrator: IntegratorSettings::default(),
            samples_per_pixel: 1,
            seed: 0,
            pass_index: 0,
        };
        let mut out = PassBuffer::new(8, 6, 1);
        executor.render_pass(&scene, &params, &mut out).unwrap();
        assert_eq!(executor.device().resident_generation(), Some(scene.generation()));
        assert!(out.pixels().iter().all(|p| p.is_finite()));
    }
}
