//! Render sessions: publishing compiled scenes and driving progressive passes over them.
//!
//! A session owns the published [`CompiledScene`] behind an `RwLock<Option<Arc<_>>>`. A pass
//! clones the `Arc` once and renders entirely against that bundle; publishing a new scene swaps the
//! pointer and rebinds the accumulator, so a pass that straddles the swap no longer matches the
//! accumulator's generation and is dropped instead of merged.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::compiler::{CompileOptions, CompiledScene};
use crate::error::RenderError;
use crate::film::{Accumulator, Image, PassBuffer};
use crate::integrator::{
    Backend, ComputeDevice, CpuExecutor, DeviceExecutor, FallbackPolicy, IntegratorSettings, PassExecutor, PassParams,
};
use crate::scene::test_scenes::material_preview;
use crate::scene::{Material, Scene};

/// Reduced sampling for fast previews and thumbnails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewSettings {
    pub passes: u32,
    pub samples_per_pass: u32,
    pub max_depth: u32,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            passes: 4,
            samples_per_pass: 4,
            max_depth: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub integrator: IntegratorSettings,
    pub samples_per_pass: u32,
    /// Passes run by [`RenderSession::render_all`].
    pub passes: u32,
    pub preview: PreviewSettings,
    pub backend: Backend,
    /// Compute device opened when `backend` is [`Backend::Device`].
    pub device: String,
    pub fallback: FallbackPolicy,
    /// Worker threads of the CPU executor, `None` for one per core.
    pub threads: Option<usize>,
    pub seed: u64,
    pub compile: CompileOptions,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            integrator: IntegratorSettings::default(),
            samples_per_pass: 1,
            passes: 64,
            preview: PreviewSettings::default(),
            backend: Backend::Cpu,
            device: "host".to_string(),
            fallback: FallbackPolicy::Cpu,
            threads: None,
            seed: 0,
            compile: CompileOptions::default(),
        }
    }
}

/// State of the accumulation after a merged pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassProgress {
    /// Passes merged since the last reset.
    pub passes: u64,
    pub samples_per_pixel: u64,
    pub generation: u64,
}

/// Result of one call to [`RenderSession::render_pass`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    Merged(PassProgress),
    /// The scene was replaced while the pass was rendering.
    Discarded,
}

/// Receives progress from a session. Called on the thread driving the passes.
pub trait RenderObserver: Send + Sync {
    fn pass_completed(&self, progress: &PassProgress, image: &Image);

    fn render_completed(&self, image: &Image);
}

/// Cloneable handle that asks a session to stop after its current pass.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Material thumbnails keyed by material identity. Each entry keeps its material alive so the
/// address cannot be reused by another instance.
#[derive(Default)]
pub struct ThumbnailCache {
    entries: Mutex<HashMap<(usize, u32), (Arc<Material>, Image)>>,
}

impl ThumbnailCache {
    fn key(material: &Arc<Material>, size: u32) -> (usize, u32) {
        (Arc::as_ptr(material) as usize, size)
    }

    pub fn get(&self, material: &Arc<Material>, size: u32) -> Option<Image> {
        self.entries.lock().get(&Self::key(material, size)).map(|(_, image)| image.clone())
    }

    pub fn insert(&self, material: &Arc<Material>, size: u32, image: Image) {
        self.entries.lock().insert(Self::key(material, size), (material.clone(), image));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

pub struct RenderSession {
    settings: RenderSettings,
    bundle: RwLock<Option<Arc<CompiledScene>>>,
    accumulator: RwLock<Accumulator>,
    executor: Mutex<Box<dyn PassExecutor>>,
    /// Source of pass seeds; never reset, so no two passes share a random stream.
    pass_counter: AtomicU64,
    stop: StopHandle,
    observers: RwLock<Vec<Arc<dyn RenderObserver>>>,
    thumbnails: ThumbnailCache,
}

impl RenderSession {
    /// Opens the backend named by `settings`. A device that cannot be opened falls back to the
    /// CPU or fails, according to `settings.fallback`.
    pub fn new(settings: RenderSettings) -> Result<Self, RenderError> {
        let executor: Box<dyn PassExecutor> = match settings.backend {
            Backend::Cpu => Box::new(CpuExecutor::new(settings.threads)?),
            Backend::Device => match DeviceExecutor::open(&settings.device) {
                Ok(executor) => Box::new(executor),
                Err(err) if settings.fallback == FallbackPolicy::Cpu => {
                    tracing::warn!(device = %settings.device, error = %err, "device unavailable, rendering on the cpu");
                    Box::new(CpuExecutor::new(settings.threads)?)
                }
                Err(err) => return Err(err.into()),
            },
        };
        Ok(Self::with_executor(settings, executor))
    }

    /// A session rendering on `device`.
    pub fn with_device(settings: RenderSettings, device: Box<dyn ComputeDevice>) -> Self {
        Self::with_executor(settings, Box::new(DeviceExecutor::new(device)))
    }

    fn with_executor(settings: RenderSettings, executor: Box<dyn PassExecutor>) -> Self {
        tracing::info!(backend = executor.name(), "render session created");
        Self {
            settings,
            bundle: RwLock::new(None),
            accumulator: RwLock::new(Accumulator::new(0, 0)),
            executor: Mutex::new(executor),
            pass_counter: AtomicU64::new(0),
            stop: StopHandle::default(),
            observers: RwLock::new(Vec::new()),
            thumbnails: ThumbnailCache::default(),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Backend the next pass will run on.
    pub fn backend(&self) -> Backend {
        self.executor.lock().backend()
    }

    /// The published compiled scene, if any.
    pub fn current_scene(&self) -> Option<Arc<CompiledScene>> {
        self.bundle.read().clone()
    }

    pub fn add_observer(&self, observer: Arc<dyn RenderObserver>) {
        self.observers.write().push(observer);
    }

    /// Snapshot of the registered observers, taken so callbacks run without the list locked.
    fn observers(&self) -> Vec<Arc<dyn RenderObserver>> {
        self.observers.read().clone()
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Compiles `scene` and publishes it, resetting the accumulation.
    #[tracing::instrument(skip_all, fields(scene = scene.id(), revision = scene.revision()))]
    pub fn set_scene(&self, scene: &Scene) -> Result<Arc<CompiledScene>, RenderError> {
        let compiled = Arc::new(CompiledScene::compile(scene, &self.settings.compile)?);
        let (width, height) = compiled.resolution();

        // the accumulator lock spans the swap so the bundle and accumulation always agree
        let mut accumulator = self.accumulator.write();
        *self.bundle.write() = Some(compiled.clone());
        accumulator.reset_for(compiled.generation(), width, height);
        drop(accumulator);
        self.thumbnails.clear();

        tracing::info!(generation = compiled.generation(), width, height, "published scene");
        Ok(compiled)
    }

    /// Recompiles only when `scene` changed since it was last published. Returns whether it did.
    pub fn sync(&self, scene: &Scene) -> Result<bool, RenderError> {
        if let Some(current) = self.current_scene() {
            if current.is_current_for(scene) {
                return Ok(false);
            }
        }
        self.set_scene(scene)?;
        Ok(true)
    }

    /// Renders one pass against the published scene and merges it.
    pub fn render_pass(&self) -> Result<PassOutcome, RenderError> {
        let bundle = self.current_scene().ok_or(RenderError::NoScene)?;
        let (width, height) = bundle.resolution();
        let params = PassParams {
            integrator: self.settings.integrator,
            samples_per_pixel: self.settings.samples_per_pass.max(1),
            seed: self.settings.seed,
            pass_index: self.pass_counter.fetch_add(1, Ordering::Relaxed),
        };
        let mut pass = PassBuffer::new(width, height, params.samples_per_pixel);

        // held until the merge, so passes land in the order they were rendered
        let mut executor = self.executor.lock();
        self.execute(&mut executor, &bundle, &params, &mut pass)?;

        let progress = {
            let mut accumulator = self.accumulator.write();
            if accumulator.generation() != Some(bundle.generation()) {
                tracing::debug!(generation = bundle.generation(), "discarding pass rendered against a replaced scene");
                return Ok(PassOutcome::Discarded);
            }
            accumulator.add_pass(&pass)?;
            PassProgress {
                passes: accumulator.passes(),
                samples_per_pixel: accumulator.samples_per_pixel(),
                generation: bundle.generation(),
            }
        };
        drop(executor);

        let observers = self.observers();
        if !observers.is_empty() {
            let image = self.image();
            for observer in observers.iter() {
                observer.pass_completed(&progress, &image);
            }
        }
        Ok(PassOutcome::Merged(progress))
    }

    fn execute(
        &self,
        executor: &mut Box<dyn PassExecutor>,
        bundle: &CompiledScene,
        params: &PassParams,
        pass: &mut PassBuffer,
    ) -> Result<(), RenderError> {
        match executor.render_pass(bundle, params, pass) {
            Ok(()) => Ok(()),
            Err(err) if executor.backend() == Backend::Device && self.settings.fallback == FallbackPolicy::Cpu => {
                tracing::warn!(device = executor.name(), error = %err, "device pass failed, switching to the cpu");
                *executor = Box::new(CpuExecutor::new(self.settings.threads)?);
                executor.render_pass(bundle, params, pass)?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Renders up to `passes` passes, stopping early if a stop was requested. Clears any earlier
    /// stop request first.
    pub fn render(&self, passes: u32) -> Result<Image, RenderError> {
        self.stop.clear();
        let start = Instant::now();
        let mut merged = 0;
        for _ in 0..passes {
            if self.stop.is_stop_requested() {
                tracing::info!(merged, "render stopped");
                break;
            }
            if let PassOutcome::Merged(_) = self.render_pass()? {
                merged += 1;
            }
        }

        let image = self.image();
        tracing::info!(merged, elapsed = ?start.elapsed(), "render finished");
        for observer in self.observers() {
            observer.render_completed(&image);
        }
        Ok(image)
    }

    /// Renders the number of passes given in the settings.
    pub fn render_all(&self) -> Result<Image, RenderError> {
        self.render(self.settings.passes)
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Snapshot of the current running mean.
    pub fn image(&self) -> Image {
        self.accumulator.read().image()
    }

    pub fn progress(&self) -> Option<PassProgress> {
        let accumulator = self.accumulator.read();
        accumulator.generation().map(|generation| PassProgress {
            passes: accumulator.passes(),
            samples_per_pixel: accumulator.samples_per_pixel(),
            generation,
        })
    }

    /// Quick low-sample render of `scene` into a private accumulator. The published scene and
    /// its accumulation are untouched.
    #[tracing::instrument(skip_all, fields(scene = scene.id()))]
    pub fn preview(&self, scene: &Scene) -> Result<Image, RenderError> {
        let compiled = CompiledScene::compile(scene, &self.settings.compile)?;
        let (width, height) = compiled.resolution();
        let preview = self.settings.preview;
        let mut accumulator = Accumulator::new(width, height);
        accumulator.reset_for(compiled.generation(), width, height);

        let integrator = IntegratorSettings {
            max_depth: preview.max_depth,
            ..self.settings.integrator
        };
        let mut executor = self.executor.lock();
        for _ in 0..preview.passes.max(1) {
            let params = PassParams {
                integrator,
                samples_per_pixel: preview.samples_per_pass.max(1),
                seed: self.settings.seed,
                pass_index: self.pass_counter.fetch_add(1, Ordering::Relaxed),
            };
            let mut pass = PassBuffer::new(width, height, params.samples_per_pixel);
            self.execute(&mut executor, &compiled, &params, &mut pass)?;
            accumulator.add_pass(&pass)?;
        }
        Ok(accumulator.image())
    }

    /// Preview of `material` on the standard material ball, cached per material instance.
    pub fn material_thumbnail(&self, material: &Arc<Material>, size: u32) -> Result<Image, RenderError> {
        if let Some(image) = self.thumbnails.get(material, size) {
            return Ok(image);
        }
        let image = self.preview(&material_preview(material.clone(), size))?;
        self.thumbnails.insert(material, size, image.clone());
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_scenes;
    use crate::spectrum::Spectrum;

    fn session() -> RenderSession {
        let settings = RenderSettings {
            threads: Some(2),
            preview: PreviewSettings { passes: 1, samples_per_pass: 1, max_depth: 1 },
            ..Default::default()
        };
        RenderSession::new(settings).unwrap()
    }

    #[test]
    fn test_render_without_scene_fails() {
        let session = session();
        assert!(matches!(session.render_pass(), Err(RenderError::NoScene)));
    }

    #[test]
    fn test_sync_recompiles_only_after_edits() {
        let session = session();
        let mut scene = test_scenes::furnace(0.5, 4, 4);
        assert!(session.sync(&scene).unwrap());
        assert!(!session.sync(&scene).unwrap());

        session.render(2).unwrap();
        assert_eq!(session.progress().unwrap().passes, 2);

        scene.set_camera(scene.camera().clone().with_resolution(6, 2));
        assert!(session.sync(&scene).unwrap());
        assert_eq!(session.progress().unwrap().passes, 0);
        assert_eq!(session.image().resolution(), (6, 2));
    }

    #[test]
    fn test_thumbnails_cached_by_identity() {
        let session = session();
        let a = Material::matte(Spectrum::uniform(0.5));
        let b = Material::matte(Spectrum::uniform(0.5));

        let first = session.material_thumbnail(&a, 4).unwrap();
        assert_eq!(session.thumbnails().len(), 1);
        assert_eq!(session.material_thumbnail(&a, 4).unwrap(), first);
        assert_eq!(session.thumbnails().len(), 1);
        session.material_thumbnail(&b, 4).unwrap();
        assert_eq!(session.thumbnails().len(), 2);

        session.set_scene(&test_scenes::furnace(0.5, 2, 2)).unwrap();
        assert!(session.thumbnails().is_empty());
    }
}
