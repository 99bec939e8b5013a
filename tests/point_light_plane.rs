//! A Lambertian plane under a point light against its closed-form radiance.

use approx::assert_relative_eq;

use lumen::consts::PI;
use lumen::renderer::{RenderSession, RenderSettings};
use lumen::scene::test_scenes;
use lumen::Float;

fn render_plane(albedo: Float, intensity: Float, height: Float, passes: u32, spp: u32) -> anyhow::Result<[Float; 3]> {
    let session = RenderSession::new(RenderSettings {
        samples_per_pass: spp,
        threads: Some(2),
        seed: 3,
        ..Default::default()
    })?;
    session.set_scene(&test_scenes::lit_plane(albedo, intensity, height, 8, 8))?;
    let mean = session.render(passes)?.mean();
    Ok([mean[0], mean[1], mean[2]])
}

#[test]
fn plane_matches_analytic_radiance() -> anyhow::Result<()> {
    let (albedo, intensity, height) = (0.5, 10.0, 2.0);
    let expected = albedo / PI * intensity / (height * height);

    let mean = render_plane(albedo, intensity, height, 16, 64)?;
    for c in mean {
        assert_relative_eq!(c, expected, max_relative = 0.05);
    }
    Ok(())
}

#[test]
fn radiance_falls_off_with_squared_distance() -> anyhow::Result<()> {
    let near = render_plane(0.8, 20.0, 1.0, 4, 16)?;
    let far = render_plane(0.8, 20.0, 2.0, 4, 16)?;
    for c in 0..3 {
        assert_relative_eq!(near[c] / far[c], 4.0, max_relative = 0.05);
    }
    Ok(())
}
