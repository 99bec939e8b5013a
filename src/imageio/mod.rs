//! Conversion of rendered images to displayable bitmaps, and image file IO.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Context};
use image::codecs::hdr::HdrEncoder;
use image::io::Reader;
use image::{DynamicImage, Rgb};

use crate::film::Image;
use crate::scene::{EnvironmentLight, ImageTexture};
use crate::spectrum::{spectrum_from_rgb8, spectrum_into_rgb8, Spectrum};
use crate::Float;

pub fn gamma_correct(v: Float) -> Float {
    if v <= 0.0031308 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

pub fn inverse_gamma_correct(v: Float) -> Float {
    if v <= 0.04045 {
        v * 1.0 / 12.92
    } else {
        ((v + 0.055) * 1.0 / 1.055).powf(2.4)
    }
}

/// sRGB-encoded 8-bit copy of a linear radiance image.
pub fn to_rgb8(image: &Image) -> image::RgbImage {
    let (w, h) = image.resolution();
    image::RgbImage::from_fn(w, h, |x, y| {
        let s = image.get(x, y).unwrap_or_default();
        Rgb(spectrum_into_rgb8(s.sanitized().map(gamma_correct)))
    })
}

/// Writes `image` as an sRGB PNG or a linear Radiance HDR, chosen by the file extension.
pub fn write_image(path: impl AsRef<Path>, image: &Image) -> anyhow::Result<()> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => to_rgb8(image)
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?,
        "hdr" => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let pixels: Vec<Rgb<f32>> = image.pixels().iter().map(|s| Rgb(s.sanitized().into_array())).collect();
            HdrEncoder::new(BufWriter::new(file)).encode(&pixels, image.width() as usize, image.height() as usize)?;
        }
        other => bail!("unsupported output format `{}`", other),
    }
    Ok(())
}

/// Loads an image as linear RGB, row-major with the top row first. 8-bit images are assumed to
/// be sRGB encoded; floating point images are taken as linear.
pub fn load_rgb_image(path: impl AsRef<Path>) -> anyhow::Result<(Vec<Spectrum>, (u32, u32))> {
    let path = path.as_ref();
    let image = Reader::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("decoding {}", path.display()))?;
    let dims = (image.width(), image.height());

    let pixels = match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => image
            .into_rgb32f()
            .pixels()
            .map(|p| Spectrum::from(p.0))
            .collect(),
        _ => image
            .into_rgb8()
            .pixels()
            .map(|p| spectrum_from_rgb8(p.0).map(inverse_gamma_correct))
            .collect(),
    };
    Ok((pixels, dims))
}

pub fn load_texture(path: impl AsRef<Path>, scale: Float) -> anyhow::Result<ImageTexture> {
    let (pixels, (width, height)) = load_rgb_image(path)?;
    Ok(ImageTexture { width, height, pixels, scale })
}

/// Loads an equirectangular environment map.
pub fn load_environment(path: impl AsRef<Path>, scale: Float, rotation_deg: Float) -> anyhow::Result<EnvironmentLight> {
    let (pixels, (width, height)) = load_rgb_image(path)?;
    Ok(EnvironmentLight { width, height, pixels, scale, rotation_deg })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gamma_round_trip() {
        for v in [0.0, 0.002, 0.2, 0.5, 1.0] {
            assert_abs_diff_eq!(inverse_gamma_correct(gamma_correct(v)), v, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_png_round_trip() -> anyhow::Result<()> {
        let mut pixels = vec![Spectrum::black(); 4];
        pixels[1] = Spectrum::uniform(1.0);
        pixels[2] = Spectrum::rgb(0.5, 0.25, 0.0);
        let image = Image::from_pixels(2, 2, pixels).context("pixel count")?;

        let path = std::env::temp_dir().join(format!("lumen-imageio-{}.png", std::process::id()));
        write_image(&path, &image)?;
        let (loaded, dims) = load_rgb_image(&path)?;
        std::fs::remove_file(&path)?;

        assert_eq!(dims, (2, 2));
        assert_abs_diff_eq!(loaded[1][0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(loaded[2][0], 0.5, epsilon = 1e-2);
        assert_abs_diff_eq!(loaded[2][1], 0.25, epsilon = 1e-2);
        assert_abs_diff_eq!(loaded[3][2], 0.0, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let image = Image::new(1, 1);
        assert!(write_image(std::env::temp_dir().join("lumen.bmp2"), &image).is_err());
    }
}
