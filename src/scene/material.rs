use std::sync::Arc;

use smallvec::SmallVec;

use crate::scene::Texture;
use crate::spectrum::Spectrum;
use crate::Float;

/// Coloured parameters are textures, scalar ones are plain numbers.
#[derive(Clone, Debug, PartialEq)]
pub enum Material {
    /// Lambertian when `sigma` is zero, Oren-Nayar otherwise. `sigma` is in degrees.
    Matte { kd: Arc<Texture>, sigma: Float },
    /// Smooth when `roughness` is zero.
    Glass { kr: Arc<Texture>, kt: Arc<Texture>, eta: Float, roughness: Float },
    Metal { eta: Spectrum, k: Spectrum, roughness: Float },
    Plastic { kd: Arc<Texture>, ks: Arc<Texture>, roughness: Float },
    Substrate { kd: Arc<Texture>, ks: Arc<Texture>, u_roughness: Float, v_roughness: Float },
    ClearCoat { base: Arc<Texture>, eta: Float, roughness: Float },
    Disney {
        base_color: Arc<Texture>,
        metallic: Float,
        roughness: Float,
        specular: Float,
        clearcoat: Float,
        clearcoat_gloss: Float,
    },
    Mirror { kr: Arc<Texture> },
    Glossy { ks: Arc<Texture>, roughness: Float },
}

impl Material {
    pub fn matte(kd: Spectrum) -> Arc<Self> {
        Arc::new(Material::Matte { kd: Texture::constant(kd), sigma: 0.0 })
    }

    pub fn matte_textured(kd: Arc<Texture>) -> Arc<Self> {
        Arc::new(Material::Matte { kd, sigma: 0.0 })
    }

    pub fn glass(eta: Float) -> Arc<Self> {
        Arc::new(Material::Glass {
            kr: Texture::constant(Spectrum::uniform(1.0)),
            kt: Texture::constant(Spectrum::uniform(1.0)),
            eta,
            roughness: 0.0,
        })
    }

    /// Gold-like conductor.
    pub fn gold(roughness: Float) -> Arc<Self> {
        Arc::new(Material::Metal {
            eta: Spectrum::rgb(0.143, 0.374, 1.442),
            k: Spectrum::rgb(3.983, 2.385, 1.603),
            roughness,
        })
    }

    pub fn plastic(kd: Spectrum, ks: Spectrum, roughness: Float) -> Arc<Self> {
        Arc::new(Material::Plastic { kd: Texture::constant(kd), ks: Texture::constant(ks), roughness })
    }

    pub fn mirror() -> Arc<Self> {
        Arc::new(Material::Mirror { kr: Texture::constant(Spectrum::uniform(1.0)) })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Material::Matte { .. } => "matte",
            Material::Glass { .. } => "glass",
            Material::Metal { .. } => "metal",
            Material::Plastic { .. } => "plastic",
            Material::Substrate { .. } => "substrate",
            Material::ClearCoat { .. } => "clear_coat",
            Material::Disney { .. } => "disney",
            Material::Mirror { .. } => "mirror",
            Material::Glossy { .. } => "glossy",
        }
    }

    /// Texture references in record order.
    pub fn textures(&self) -> SmallVec<[&Arc<Texture>; 2]> {
        let mut out = SmallVec::new();
        match self {
            Material::Matte { kd, .. } => out.push(kd),
            Material::Glass { kr, kt, .. } => {
                out.push(kr);
                out.push(kt);
            }
            Material::Metal { .. } => {}
            Material::Plastic { kd, ks, .. } | Material::Substrate { kd, ks, .. } => {
                out.push(kd);
                out.push(ks);
            }
            Material::ClearCoat { base, .. } => out.push(base),
            Material::Disney { base_color, .. } => out.push(base_color),
            Material::Mirror { kr } => out.push(kr),
            Material::Glossy { ks, .. } => out.push(ks),
        }
        out
    }
}
