//! Per-pass radiance buffers and the progressive running mean over them.

use rayon::prelude::*;

use crate::error::RenderError;
use crate::spectrum::Spectrum;
use crate::Float;

/// Radiance estimates of one pass, row-major with row 0 at the top.
#[derive(Clone, Debug)]
pub struct PassBuffer {
    width: u32,
    height: u32,
    samples_per_pixel: u32,
    pixels: Vec<Spectrum>,
}

impl PassBuffer {
    pub fn new(width: u32, height: u32, samples_per_pixel: u32) -> Self {
        Self {
            width,
            height,
            samples_per_pixel: samples_per_pixel.max(1),
            pixels: vec![Spectrum::black(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Samples behind each pixel's estimate.
    pub fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    pub fn pixels(&self) -> &[Spectrum] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Spectrum] {
        &mut self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// An RGB radiance image, row-major with row 0 at the top.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<Spectrum>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Spectrum::black(); width as usize * height as usize],
        }
    }

    /// `None` unless there is exactly one pixel per grid cell.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Spectrum>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize).then_some(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[Spectrum] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Spectrum> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Average over every pixel.
    pub fn mean(&self) -> Spectrum {
        if self.pixels.is_empty() {
            return Spectrum::black();
        }
        self.pixels.iter().copied().sum::<Spectrum>() / self.pixels.len() as Float
    }
}

/// Running per-pixel mean over the passes of one compiled scene.
#[derive(Clone, Debug)]
pub struct Accumulator {
    width: u32,
    height: u32,
    /// Compiled scene the merged passes were rendered from.
    generation: Option<u64>,
    passes: u64,
    samples_per_pixel: u64,
    mean: Vec<Spectrum>,
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            generation: None,
            passes: 0,
            samples_per_pixel: 0,
            mean: vec![Spectrum::black(); width as usize * height as usize],
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn samples_per_pixel(&self) -> u64 {
        self.samples_per_pixel
    }

    /// Merges a pass whose pixels each average `k` samples: `mean += (s - mean) * k / (n + k)`.
    /// Non-finite channels count as zero and negative ones are clamped.
    pub fn add_pass(&mut self, pass: &PassBuffer) -> Result<(), RenderError> {
        if pass.resolution() != self.resolution() {
            return Err(RenderError::ResolutionMismatch {
                expected: self.resolution(),
                actual: pass.resolution(),
            });
        }
        let k = pass.samples_per_pixel() as u64;
        let weight = k as Float / (self.samples_per_pixel + k) as Float;
        self.mean
            .par_iter_mut()
            .zip(pass.pixels().par_iter())
            .for_each(|(mean, sample)| {
                *mean += (sample.sanitized() - *mean) * weight;
            });
        self.passes += 1;
        self.samples_per_pixel += k;
        Ok(())
    }

    /// Drops every merged pass.
    pub fn reset(&mut self) {
        self.passes = 0;
        self.samples_per_pixel = 0;
        self.mean.iter_mut().for_each(|m| *m = Spectrum::black());
    }

    /// Drops every merged pass and binds the accumulator to a new scene and resolution.
    pub fn reset_for(&mut self, generation: u64, width: u32, height: u32) {
        if (width, height) != self.resolution() {
            self.width = width;
            self.height = height;
            self.mean = vec![Spectrum::black(); width as usize * height as usize];
        }
        self.reset();
        self.generation = Some(generation);
    }

    /// Snapshot of the current mean.
    pub fn image(&self) -> Image {
        Image {
            width: self.width,
            height: self.height,
            pixels: self.mean.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn filled(value: Float, spp: u32) -> PassBuffer {
        let mut pass = PassBuffer::new(2, 2, spp);
        pass.pixels_mut().iter_mut().for_each(|p| *p = Spectrum::uniform(value));
        pass
    }

    #[test]
    fn test_running_mean_matches_average() {
        let mut acc = Accumulator::new(2, 2);
        for v in [1.0, 2.0, 6.0] {
            acc.add_pass(&filled(v, 1)).unwrap();
        }
        assert_eq!(acc.passes(), 3);
        assert_abs_diff_eq!(acc.image().get(1, 1).unwrap()[0], 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_passes_weighted_by_sample_count() {
        let mut acc = Accumulator::new(2, 2);
        acc.add_pass(&filled(1.0, 1)).unwrap();
        acc.add_pass(&filled(4.0, 3)).unwrap();
        assert_eq!(acc.samples_per_pixel(), 4);
        assert_abs_diff_eq!(acc.image().mean()[2], 3.25, epsilon = 1e-5);
    }

    #[test]
    fn test_non_finite_samples_contribute_black() {
        let mut acc = Accumulator::new(2, 2);
        acc.add_pass(&filled(2.0, 1)).unwrap();
        let mut bad = filled(2.0, 1);
        bad.pixels_mut()[0] = Spectrum::rgb(Float::NAN, Float::INFINITY, -1.0);
        acc.add_pass(&bad).unwrap();

        let image = acc.image();
        let first = image.get(0, 0).unwrap();
        for c in 0..3 {
            assert!(first[c].is_finite());
            assert_abs_diff_eq!(first[c], 1.0, epsilon = 1e-5);
        }
        assert_abs_diff_eq!(image.get(1, 0).unwrap()[0], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_resolution_mismatch_and_reset() {
        let mut acc = Accumulator::new(2, 2);
        let err = acc.add_pass(&PassBuffer::new(3, 2, 1)).unwrap_err();
        assert!(matches!(err, RenderError::ResolutionMismatch { expected: (2, 2), actual: (3, 2) }));

        acc.add_pass(&filled(5.0, 1)).unwrap();
        acc.reset_for(7, 4, 1);
        assert_eq!(acc.generation(), Some(7));
        assert_eq!(acc.passes(), 0);
        assert_eq!(acc.image().resolution(), (4, 1));
        assert!(acc.image().mean().is_black());
    }
}
