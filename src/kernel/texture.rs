use crate::compiler::layout::{self, read3, word_int, PackedRef, TextureKind};
use crate::compiler::NodeKind;
use crate::kernel::SceneView;
use crate::spectrum::Spectrum;
use crate::{Float, Point2f};

fn texel(rec: &[Float], width: usize, x: isize, y: isize, height: usize) -> Spectrum {
    let x = x.rem_euclid(width as isize) as usize;
    let y = y.rem_euclid(height as isize) as usize;
    Spectrum::from(read3(rec, layout::image_texture::HEADER + 3 * (y * width + x)))
}

/// Bilinear lookup with repeat wrapping. `v = 0` is the bottom row of the image.
fn image_lookup(rec: &[Float], uv: Point2f) -> Spectrum {
    let width = word_int(rec[layout::image_texture::WIDTH]) as usize;
    let height = word_int(rec[layout::image_texture::HEIGHT]) as usize;
    let scale = rec[layout::image_texture::SCALE];

    let x = uv.x * scale * width as Float - 0.5;
    let y = (1.0 - uv.y * scale) * height as Float - 0.5;
    let (x0, y0) = (x.floor(), y.floor());
    let (dx, dy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as isize, y0 as isize);

    (1.0 - dx) * (1.0 - dy) * texel(rec, width, x0, y0, height)
        + dx * (1.0 - dy) * texel(rec, width, x0 + 1, y0, height)
        + (1.0 - dx) * dy * texel(rec, width, x0, y0 + 1, height)
        + dx * dy * texel(rec, width, x0 + 1, y0 + 1, height)
}

/// Value of a texture at `uv`. A missing texture reads as black.
pub fn evaluate(view: &SceneView<'_>, texture: PackedRef, uv: Point2f) -> Spectrum {
    if texture.is_none() {
        return Spectrum::black();
    }
    let Some(kind) = TextureKind::from_id(texture.kind()) else {
        return Spectrum::black();
    };
    let rec = &view.textures[kind.id() as usize][texture.offset()..];
    match kind {
        TextureKind::Constant => Spectrum::from(read3(rec, layout::constant::VALUE)),
        TextureKind::Checkerboard => {
            let scale = rec[layout::checkerboard::SCALE];
            let check = (uv.x * scale).floor() as i64 + (uv.y * scale).floor() as i64;
            if check.rem_euclid(2) == 0 {
                Spectrum::from(read3(rec, layout::checkerboard::COLOR_A))
            } else {
                Spectrum::from(read3(rec, layout::checkerboard::COLOR_B))
            }
        }
        TextureKind::Image => image_lookup(rec, uv),
    }
}
