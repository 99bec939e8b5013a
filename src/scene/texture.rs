use std::sync::Arc;

use crate::spectrum::Spectrum;
use crate::Float;

/// RGB image addressed by UV with repeat wrapping.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageTexture {
    pub width: u32,
    pub height: u32,
    /// Row-major, top row first.
    pub pixels: Vec<Spectrum>,
    pub scale: Float,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Texture {
    Constant(Spectrum),
    Checkerboard { scale: Float, a: Spectrum, b: Spectrum },
    Image(ImageTexture),
}

impl Texture {
    pub fn constant(value: Spectrum) -> Arc<Self> {
        Arc::new(Texture::Constant(value))
    }

    pub fn checkerboard(scale: Float, a: Spectrum, b: Spectrum) -> Arc<Self> {
        Arc::new(Texture::Checkerboard { scale, a, b })
    }

    pub fn image(image: ImageTexture) -> Arc<Self> {
        Arc::new(Texture::Image(image))
    }
}

impl From<Spectrum> for Texture {
    fn from(s: Spectrum) -> Self {
        Texture::Constant(s)
    }
}
