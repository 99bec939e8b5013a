use crate::compiler::layout::{self, int_word, MaterialKind, TextureKind};
use crate::compiler::node_cache::{NodeCache, RecordLength};
use crate::compiler::table::{push3, KindTable};
use crate::error::CompileError;
use crate::scene::{Material, Texture};
use crate::Float;

pub type TextureCompiler = KindTable<Texture, TextureKind>;
pub type MaterialCompiler = KindTable<Material, MaterialKind>;

pub fn texture_kind(texture: &Texture) -> TextureKind {
    match texture {
        Texture::Constant(_) => TextureKind::Constant,
        Texture::Checkerboard { .. } => TextureKind::Checkerboard,
        Texture::Image(_) => TextureKind::Image,
    }
}

fn texture_len(texture: &Texture) -> usize {
    match texture {
        Texture::Constant(_) => layout::constant::LEN,
        Texture::Checkerboard { .. } => layout::checkerboard::LEN,
        Texture::Image(img) => layout::image_texture::len(img.width as usize, img.height as usize),
    }
}

fn encode_texture(texture: &Texture, out: &mut Vec<Float>) -> Result<(), CompileError> {
    match texture {
        Texture::Constant(value) => push3(out, value.into_array()),
        Texture::Checkerboard { scale, a, b } => {
            out.push(*scale);
            push3(out, a.into_array());
            push3(out, b.into_array());
        }
        Texture::Image(img) => {
            let expected = img.width as usize * img.height as usize;
            if expected == 0 || img.pixels.len() != expected {
                return Err(CompileError::InvalidTexture(format!(
                    "{}x{} image has {} pixels",
                    img.width,
                    img.height,
                    img.pixels.len()
                )));
            }
            out.push(int_word(img.width));
            out.push(int_word(img.height));
            out.push(img.scale);
            for p in &img.pixels {
                push3(out, p.clamp_positive().into_array());
            }
        }
    }
    Ok(())
}

impl KindTable<Texture, TextureKind> {
    pub fn setup(&mut self, cache: &NodeCache) -> Result<(), CompileError> {
        self.clear(cache);
        for &kind in TextureKind::ALL {
            self.pack_kind(
                cache,
                kind,
                |t| texture_kind(t) == kind,
                RecordLength::PerInstance(&texture_len),
                |_, texture, out| encode_texture(texture, out),
            )?;
        }
        self.finish();
        Ok(())
    }
}

pub fn material_kind(material: &Material) -> MaterialKind {
    match material {
        Material::Matte { .. } => MaterialKind::Matte,
        Material::Glass { .. } => MaterialKind::Glass,
        Material::Metal { .. } => MaterialKind::Metal,
        Material::Plastic { .. } => MaterialKind::Plastic,
        Material::Substrate { .. } => MaterialKind::Substrate,
        Material::ClearCoat { .. } => MaterialKind::ClearCoat,
        Material::Disney { .. } => MaterialKind::Disney,
        Material::Mirror { .. } => MaterialKind::Mirror,
        Material::Glossy { .. } => MaterialKind::Glossy,
    }
}

fn material_len(material: &Material) -> usize {
    match material_kind(material) {
        MaterialKind::Matte => layout::matte::LEN,
        MaterialKind::Glass => layout::glass::LEN,
        MaterialKind::Metal => layout::metal::LEN,
        MaterialKind::Plastic => layout::plastic::LEN,
        MaterialKind::Substrate => layout::substrate::LEN,
        MaterialKind::ClearCoat => layout::clear_coat::LEN,
        MaterialKind::Disney => layout::disney::LEN,
        MaterialKind::Mirror => layout::mirror::LEN,
        MaterialKind::Glossy => layout::glossy::LEN,
    }
}

fn encode_material(
    material: &Material,
    cache: &NodeCache,
    textures: &TextureCompiler,
    out: &mut Vec<Float>,
) -> Result<(), CompileError> {
    // texture references in the order `Material::textures` lists them
    for tex in material.textures() {
        out.push(textures.find_offset_for(cache, tex)?.to_word());
    }
    match material {
        Material::Matte { sigma, .. } => out.push(*sigma),
        Material::Glass { eta, roughness, .. } => out.extend_from_slice(&[*eta, *roughness]),
        Material::Metal { eta, k, roughness } => {
            push3(out, eta.into_array());
            push3(out, k.into_array());
            out.push(*roughness);
        }
        Material::Plastic { roughness, .. } => out.push(*roughness),
        Material::Substrate { u_roughness, v_roughness, .. } => out.extend_from_slice(&[*u_roughness, *v_roughness]),
        Material::ClearCoat { eta, roughness, .. } => out.extend_from_slice(&[*eta, *roughness]),
        Material::Disney { metallic, roughness, specular, clearcoat, clearcoat_gloss, .. } => {
            out.extend_from_slice(&[*metallic, *roughness, *specular, *clearcoat, *clearcoat_gloss])
        }
        Material::Mirror { .. } => {}
        Material::Glossy { roughness, .. } => out.push(*roughness),
    }
    Ok(())
}

impl KindTable<Material, MaterialKind> {
    /// Rebuilds the material arrays. Runs after the texture compiler, whose offsets the records
    /// embed.
    pub fn setup(&mut self, cache: &NodeCache, textures: &TextureCompiler) -> Result<(), CompileError> {
        self.clear(cache);
        for &kind in MaterialKind::ALL {
            self.pack_kind(
                cache,
                kind,
                |m| material_kind(m) == kind,
                RecordLength::PerInstance(&material_len),
                |_, material, out| encode_material(material, cache, textures, out),
            )?;
        }
        self.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::layout::PackedRef;
    use crate::geometry::Transform;
    use crate::point3f;
    use crate::scene::{Camera, Primitive, Scene, Shape};
    use crate::spectrum::Spectrum;
    use std::sync::Arc;

    #[test]
    fn test_material_embeds_texture_offsets() {
        let mut scene = Scene::new(Camera::default());
        let checker = Texture::checkerboard(4.0, Spectrum::uniform(1.0), Spectrum::uniform(0.0));
        let plastic = Arc::new(Material::Plastic {
            kd: checker.clone(),
            ks: Texture::constant(Spectrum::uniform(0.04)),
            roughness: 0.2,
        });
        let matte = Material::matte_textured(checker.clone());
        let sphere = Shape::sphere(point3f!(0, 0, 0), 1.0);
        scene.add_primitive(Primitive::new(sphere.clone(), plastic.clone(), Transform::identity()));
        scene.add_primitive(Primitive::new(sphere, matte.clone(), Transform::identity()));

        let cache = NodeCache::build(&scene);
        let mut textures = TextureCompiler::new();
        textures.setup(&cache).unwrap();
        let mut materials = MaterialCompiler::new();
        materials.setup(&cache, &textures).unwrap();

        let checker_ref = textures.find_offset_for(&cache, &checker).unwrap();
        let r = materials.find_offset_for(&cache, &plastic).unwrap();
        let words = &materials.array(MaterialKind::Plastic)[r.offset()..];
        assert_eq!(PackedRef::from_word(words[layout::plastic::KD]), checker_ref);
        assert_eq!(words[layout::plastic::ROUGHNESS], 0.2);

        let r = materials.find_offset_for(&cache, &matte).unwrap();
        let words = &materials.array(MaterialKind::Matte)[r.offset()..];
        assert_eq!(PackedRef::from_word(words[layout::matte::KD]), checker_ref);

        // one checkerboard and one constant, shared checkerboard stored once
        assert_eq!(textures.array(TextureKind::Checkerboard).len(), layout::checkerboard::LEN);
        assert_eq!(textures.array(TextureKind::Constant).len(), layout::constant::LEN);
    }

    #[test]
    fn test_setup_clears_previous_state() {
        let mut scene = Scene::new(Camera::default());
        scene.add_primitive(Primitive::new(
            Shape::sphere(point3f!(0, 0, 0), 1.0),
            Material::matte(Spectrum::uniform(0.5)),
            Transform::identity(),
        ));
        let cache = NodeCache::build(&scene);
        let mut textures = TextureCompiler::new();
        textures.setup(&cache).unwrap();
        textures.setup(&cache).unwrap();
        assert_eq!(textures.array(TextureKind::Constant).len(), layout::constant::LEN);
        assert_eq!(textures.index().len(), 1);
    }
}
