//! BSDF construction from material records.

use cgmath::Deg;

use crate::compiler::layout::{self, read3, MaterialKind, PackedRef};
use crate::compiler::NodeKind;
use crate::fresnel::{schlick_r0, Fresnel};
use crate::kernel::intersect::SurfaceInteraction;
use crate::kernel::{texture, SceneView};
use crate::math::lerp;
use crate::reflection::microfacet::TrowbridgeReitzDistribution;
use crate::reflection::{Bsdf, Lobe};
use crate::spectrum::Spectrum;
use crate::Float;

struct Record<'v, 'a> {
    view: &'v SceneView<'a>,
    words: &'a [Float],
    si: &'v SurfaceInteraction,
}

impl<'v, 'a> Record<'v, 'a> {
    fn scalar(&self, at: usize) -> Float {
        self.words[at]
    }

    /// Reflectance-like texture, clamped to [0, 1].
    fn texture(&self, at: usize) -> Spectrum {
        texture::evaluate(self.view, PackedRef::from_word(self.words[at]), self.si.uv).clamp(0.0, 1.0)
    }

    fn spectrum(&self, at: usize) -> Spectrum {
        Spectrum::from(read3(self.words, at))
    }
}

fn dielectric(eta: Float) -> Fresnel {
    Fresnel::Dielectric { eta_i: 1.0, eta_t: eta }
}

/// Builds the BSDF of `material` at `si`, or `None` when the primitive has no material.
pub fn bsdf(view: &SceneView<'_>, material: PackedRef, si: &SurfaceInteraction) -> Option<Bsdf> {
    if material.is_none() {
        return None;
    }
    let kind = MaterialKind::from_id(material.kind())?;
    let array: &[Float] = view.materials[kind.id() as usize];
    let words = array.get(material.offset()..)?;
    let rec = Record { view, words, si };
    let mut bsdf = Bsdf::new(si.ns, si.ng, si.dpdu, 1.0);

    match kind {
        MaterialKind::Matte => {
            use layout::matte::*;
            let kd = rec.texture(KD);
            let sigma = rec.scalar(SIGMA);
            if sigma == 0.0 {
                bsdf.add(Lobe::Lambertian { r: kd });
            } else {
                bsdf.add(Lobe::oren_nayar(kd, Deg(sigma)));
            }
        }
        MaterialKind::Glass => {
            use layout::glass::*;
            let kr = rec.texture(KR);
            let kt = rec.texture(KT);
            let eta = rec.scalar(ETA);
            let roughness = rec.scalar(ROUGHNESS);
            bsdf.eta = eta;
            if roughness == 0.0 {
                bsdf.add(Lobe::FresnelSpecular { r: kr, t: kt, eta_a: 1.0, eta_b: eta });
            } else {
                let distribution = TrowbridgeReitzDistribution::isotropic(roughness);
                if !kr.is_black() {
                    bsdf.add(Lobe::MicrofacetReflection { r: kr, distribution, fresnel: dielectric(eta) });
                }
                if !kt.is_black() {
                    bsdf.add(Lobe::MicrofacetTransmission { t: kt, distribution, eta_a: 1.0, eta_b: eta });
                }
            }
        }
        MaterialKind::Metal => {
            use layout::metal::*;
            let fresnel = Fresnel::Conductor {
                eta_i: Spectrum::uniform(1.0),
                eta_t: rec.spectrum(ETA),
                k: rec.spectrum(K),
            };
            let roughness = rec.scalar(ROUGHNESS);
            let r = Spectrum::uniform(1.0);
            if roughness == 0.0 {
                bsdf.add(Lobe::SpecularReflection { r, fresnel });
            } else {
                let distribution = TrowbridgeReitzDistribution::isotropic(roughness);
                bsdf.add(Lobe::MicrofacetReflection { r, distribution, fresnel });
            }
        }
        MaterialKind::Plastic => {
            use layout::plastic::*;
            let kd = rec.texture(KD);
            let ks = rec.texture(KS);
            if !kd.is_black() {
                bsdf.add(Lobe::Lambertian { r: kd });
            }
            if !ks.is_black() {
                let distribution = TrowbridgeReitzDistribution::isotropic(rec.scalar(ROUGHNESS));
                bsdf.add(Lobe::MicrofacetReflection { r: ks, distribution, fresnel: dielectric(1.5) });
            }
        }
        MaterialKind::Substrate => {
            use layout::substrate::*;
            let distribution = TrowbridgeReitzDistribution::from_roughness(rec.scalar(U_ROUGHNESS), rec.scalar(V_ROUGHNESS));
            bsdf.add(Lobe::FresnelBlend { rd: rec.texture(KD), rs: rec.texture(KS), distribution });
        }
        MaterialKind::ClearCoat => {
            use layout::clear_coat::*;
            let rs = Spectrum::uniform(schlick_r0(rec.scalar(ETA)));
            let distribution = TrowbridgeReitzDistribution::isotropic(rec.scalar(ROUGHNESS));
            bsdf.add(Lobe::FresnelBlend { rd: rec.texture(BASE), rs, distribution });
        }
        MaterialKind::Disney => {
            use layout::disney::*;
            let base = rec.texture(BASE_COLOR);
            let metallic = rec.scalar(METALLIC).clamp(0.0, 1.0);
            let roughness = rec.scalar(ROUGHNESS);
            let specular = rec.scalar(SPECULAR).max(0.0);
            let clearcoat = rec.scalar(CLEARCOAT).max(0.0);
            let gloss = rec.scalar(CLEARCOAT_GLOSS).clamp(0.0, 1.0);

            let diffuse = base * (1.0 - metallic);
            if !diffuse.is_black() {
                bsdf.add(Lobe::Lambertian { r: diffuse });
            }
            let r0 = Spectrum::lerp(metallic, Spectrum::uniform(0.08 * specular), base);
            bsdf.add(Lobe::MicrofacetReflection {
                r: Spectrum::uniform(1.0),
                distribution: TrowbridgeReitzDistribution::isotropic(roughness),
                fresnel: Fresnel::Schlick { r0 },
            });
            if clearcoat > 0.0 {
                let alpha = lerp(gloss, 0.1, 0.001);
                bsdf.add(Lobe::MicrofacetReflection {
                    r: Spectrum::uniform(0.25 * clearcoat),
                    distribution: TrowbridgeReitzDistribution::new(alpha, alpha),
                    fresnel: Fresnel::Schlick { r0: Spectrum::uniform(0.04) },
                });
            }
        }
        MaterialKind::Mirror => {
            bsdf.add(Lobe::SpecularReflection { r: rec.texture(layout::mirror::KR), fresnel: Fresnel::NoOp });
        }
        MaterialKind::Glossy => {
            use layout::glossy::*;
            let distribution = TrowbridgeReitzDistribution::isotropic(rec.scalar(ROUGHNESS));
            bsdf.add(Lobe::MicrofacetReflection {
                r: Spectrum::uniform(1.0),
                distribution,
                fresnel: Fresnel::Schlick { r0: rec.texture(KS) },
            });
        }
    }
    Some(bsdf)
}
