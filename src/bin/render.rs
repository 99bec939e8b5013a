use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_tree::HierarchicalLayer;

use lumen::compiler::{AreaLightPolicy, CompileOptions};
use lumen::film::Image;
use lumen::imageio::{load_environment, write_image};
use lumen::integrator::{Backend, FallbackPolicy, IntegratorSettings};
use lumen::renderer::{PassProgress, RenderObserver, RenderSession, RenderSettings};
use lumen::scene::{test_scenes, Light, Scene};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SceneChoice {
    Cornell,
    Furnace,
    Spheres,
    Sky,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Cpu,
    Device,
}

/// Progressive path tracer over the built-in scenes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scene to render.
    #[arg(long, value_enum, default_value_t = SceneChoice::Cornell)]
    scene: SceneChoice,

    /// Output image; `.png` is tone mapped to sRGB, `.hdr` stays linear.
    #[arg(short, long, value_name = "FILE", default_value = "render.png")]
    output: PathBuf,

    #[arg(long, default_value_t = 512)]
    width: u32,

    #[arg(long, default_value_t = 384)]
    height: u32,

    /// Progressive passes to accumulate.
    #[arg(short, long, default_value_t = 64)]
    passes: u32,

    /// Samples per pixel in each pass.
    #[arg(short, long, default_value_t = 1)]
    spp: u32,

    #[arg(long, default_value_t = 8)]
    max_depth: u32,

    /// Disable Russian roulette path termination.
    #[arg(long)]
    no_roulette: bool,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = BackendChoice::Cpu)]
    backend: BackendChoice,

    /// Compute device used by the device backend.
    #[arg(long, default_value = "host")]
    device: String,

    /// Fail instead of falling back to the cpu when the device cannot render.
    #[arg(long)]
    no_fallback: bool,

    /// Worker threads; one per core when omitted.
    #[arg(short = 't', long, value_name = "NUM")]
    threads: Option<usize>,

    /// Fail when an area light cannot be sampled instead of skipping it.
    #[arg(long)]
    strict_lights: bool,

    /// Equirectangular environment map lighting the spheres scene.
    #[arg(long, value_name = "FILE")]
    environment: Option<PathBuf>,

    #[arg(long, default_value_t = 1.0)]
    environment_scale: f32,

    /// Rotation of the environment map about the up axis, in degrees.
    #[arg(long, default_value_t = 0.0)]
    environment_rotation: f32,
}

impl Cli {
    fn settings(&self) -> RenderSettings {
        RenderSettings {
            integrator: IntegratorSettings {
                max_depth: self.max_depth,
                russian_roulette: !self.no_roulette,
                ..Default::default()
            },
            samples_per_pass: self.spp,
            passes: self.passes,
            backend: match self.backend {
                BackendChoice::Cpu => Backend::Cpu,
                BackendChoice::Device => Backend::Device,
            },
            device: self.device.clone(),
            fallback: if self.no_fallback { FallbackPolicy::Abort } else { FallbackPolicy::Cpu },
            threads: self.threads,
            seed: self.seed,
            compile: CompileOptions {
                area_light_policy: if self.strict_lights { AreaLightPolicy::Strict } else { AreaLightPolicy::Skip },
            },
            ..Default::default()
        }
    }

    fn scene(&self) -> anyhow::Result<Scene> {
        let environment = match &self.environment {
            Some(path) => {
                let env = load_environment(path, self.environment_scale, self.environment_rotation)
                    .with_context(|| format!("loading environment {}", path.display()))?;
                Some(Arc::new(Light::Environment(env)))
            }
            None => None,
        };
        if environment.is_some() && !matches!(self.scene, SceneChoice::Spheres) {
            tracing::warn!(scene = ?self.scene, "environment map only applies to the spheres scene");
        }

        let (w, h) = (self.width, self.height);
        Ok(match self.scene {
            SceneChoice::Cornell => test_scenes::cornell_box(w, h),
            SceneChoice::Furnace => test_scenes::furnace(0.5, w, h),
            SceneChoice::Spheres => test_scenes::spheres(w, h, environment),
            SceneChoice::Sky => test_scenes::sky(w, h),
        })
    }
}

struct ProgressObserver {
    bar: ProgressBar,
}

impl RenderObserver for ProgressObserver {
    fn pass_completed(&self, progress: &PassProgress, _image: &Image) {
        self.bar.set_position(progress.passes);
        self.bar.set_message(format!("{} spp", progress.samples_per_pixel));
    }

    fn render_completed(&self, _image: &Image) {
        self.bar.finish();
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(HierarchicalLayer::new(2).with_targets(true))
        .init();

    let cli = Cli::parse();
    let scene = cli.scene()?;
    let session = RenderSession::new(cli.settings())?;

    let bar = ProgressBar::new(cli.passes as u64);
    bar.set_style(ProgressStyle::with_template("{elapsed_precise} [{wide_bar}] {pos}/{len} passes, {msg}")?);
    session.add_observer(Arc::new(ProgressObserver { bar }));

    session.set_scene(&scene)?;
    let image = session.render_all()?;

    write_image(&cli.output, &image)?;
    tracing::info!(output = %cli.output.display(), "wrote image");
    Ok(())
}
