use rayon::prelude::*;

use crate::compiler::CompiledScene;
use crate::error::BackendError;
use crate::film::PassBuffer;
use crate::integrator::{path, Backend, PassExecutor, PassParams};
use crate::math::mix_seed;
use crate::sampler::RandomSampler;

/// Rows rendered by one worker task.
const BAND_ROWS: usize = 4;

/// Renders passes on a bounded rayon pool, one band of rows per task.
pub struct CpuExecutor {
    pool: rayon::ThreadPool,
}

impl CpuExecutor {
    /// `threads` of `None` uses rayon's default pool size.
    pub fn new(threads: Option<usize>) -> Result<Self, BackendError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("lumen-cpu-{}", i));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        Ok(Self { pool: builder.build()? })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl PassExecutor for CpuExecutor {
    fn name(&self) -> &str {
        "cpu"
    }

    fn backend(&self) -> Backend {
        Backend::Cpu
    }

    #[tracing::instrument(skip_all, fields(pass = params.pass_index, threads = self.threads()))]
    fn render_pass(&mut self, scene: &CompiledScene, params: &PassParams, out: &mut PassBuffer) -> Result<(), BackendError> {
        if out.is_empty() {
            return Ok(());
        }
        let view = scene.view();
        let width = out.width() as usize;
        let band_len = BAND_ROWS * width;
        let pass_seed = params.pass_seed();

        self.pool.install(|| {
            out.pixels_mut()
                .par_chunks_mut(band_len)
                .enumerate()
                .for_each(|(band, pixels)| {
                    let mut sampler = RandomSampler::new_with_seed(mix_seed(pass_seed, band as u64));
                    for (i, pixel) in pixels.iter_mut().enumerate() {
                        let index = band * band_len + i;
                        let (x, y) = ((index % width) as u32, (index / width) as u32);
                        *pixel = path::render_pixel(&view, &params.integrator, x, y, params.samples_per_pixel, &mut sampler);
                    }
                });
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOptions;
    use crate::integrator::IntegratorSettings;
    use crate::scene::test_scenes;

    #[test]
    fn test_same_seed_same_pass() {
        let scene = test_scenes::cornell_box(12, 9);
        let compiled = CompiledScene::compile(&scene, &CompileOptions::default()).unwrap();
        let params = PassParams {
            integrator: IntegratorSettings::default(),
            samples_per_pixel: 1,
            seed: 11,
            pass_index: 0,
        };

        let mut executor = CpuExecutor::new(Some(2)).unwrap();
        let mut a = PassBuffer::new(12, 9, 1);
        let mut b = PassBuffer::new(12, 9, 1);
        executor.render_pass(&compiled, &params, &mut a).unwrap();
        executor.render_pass(&compiled, &params, &mut b).unwrap();
        assert_eq!(a.pixels(), b.pixels());
        assert!(a.pixels().iter().any(|p| !p.is_black()));

        let mut c = PassBuffer::new(12, 9, 1);
        executor.render_pass(&compiled, &PassParams { pass_index: 1, ..params }, &mut c).unwrap();
        assert_ne!(a.pixels(), c.pixels());
    }
}
