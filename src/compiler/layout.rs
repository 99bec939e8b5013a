//! Record layouts, kind IDs and packed references shared by the compiler and the kernel.
//!
//! Every record is a run of `f32` words. Integer fields are stored bit-exactly with
//! [`f32::from_bits`] and read back with [`f32::to_bits`], so they survive any round trip through
//! a float buffer.

use bytemuck::{Pod, Zeroable};

use crate::Float;

/// A `(kind, offset)` pair in one word: kind in the top 4 bits, offset in the low 28.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct PackedRef(pub u32);

impl PackedRef {
    pub const NONE: PackedRef = PackedRef(u32::MAX);
    pub const OFFSET_BITS: u32 = 28;
    pub const MAX_OFFSET: usize = (1 << Self::OFFSET_BITS) - 1;

    /// `None` if the offset does not fit in 28 bits.
    pub fn new(kind: u32, offset: usize) -> Option<Self> {
        if offset > Self::MAX_OFFSET || kind >= 15 {
            return None;
        }
        Some(PackedRef((kind << Self::OFFSET_BITS) | offset as u32))
    }

    #[inline]
    pub fn kind(self) -> u32 {
        self.0 >> Self::OFFSET_BITS
    }

    #[inline]
    pub fn offset(self) -> usize {
        (self.0 & Self::MAX_OFFSET as u32) as usize
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    #[inline]
    pub fn to_word(self) -> Float {
        f32::from_bits(self.0)
    }

    #[inline]
    pub fn from_word(w: Float) -> Self {
        PackedRef(w.to_bits())
    }
}

impl std::fmt::Debug for PackedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "PackedRef(none)")
        } else {
            write!(f, "PackedRef({}:{})", self.kind(), self.offset())
        }
    }
}

#[inline]
pub fn int_word(v: u32) -> Float {
    f32::from_bits(v)
}

#[inline]
pub fn word_int(w: Float) -> u32 {
    w.to_bits()
}

#[inline]
pub fn read3(words: &[Float], at: usize) -> [Float; 3] {
    [words[at], words[at + 1], words[at + 2]]
}

/// A closed set of record kinds with dense IDs starting at zero.
pub trait NodeKind: Copy + Eq + std::fmt::Debug + 'static {
    const KINDS: &'static [Self];

    fn id(self) -> u32;
    fn name(self) -> &'static str;

    fn count() -> usize {
        Self::KINDS.len()
    }

    fn from_id(id: u32) -> Option<Self> {
        Self::KINDS.get(id as usize).copied()
    }
}

macro_rules! node_kinds {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const COUNT: usize = Self::ALL.len();
        }

        impl NodeKind for $name {
            const KINDS: &'static [Self] = Self::ALL;

            fn id(self) -> u32 {
                self as u32
            }

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }
    };
}

node_kinds!(ShapeKind {
    Sphere => "sphere",
    Triangle => "triangle",
    Plane => "plane",
    Mesh => "mesh",
});

node_kinds!(TextureKind {
    Constant => "constant",
    Checkerboard => "checkerboard",
    Image => "image",
});

node_kinds!(MaterialKind {
    Matte => "matte",
    Glass => "glass",
    Metal => "metal",
    Plastic => "plastic",
    Substrate => "substrate",
    ClearCoat => "clear_coat",
    Disney => "disney",
    Mirror => "mirror",
    Glossy => "glossy",
});

node_kinds!(LightKind {
    Point => "point",
    Spot => "spot",
    Directional => "directional",
    Area => "area",
    Environment => "environment",
    Sky => "sky",
});

pub mod sphere {
    pub const CENTER: usize = 0;
    pub const RADIUS: usize = 3;
    pub const LEN: usize = 4;
}

pub mod triangle {
    pub const P0: usize = 0;
    pub const P1: usize = 3;
    pub const P2: usize = 6;
    pub const N0: usize = 9;
    pub const N1: usize = 12;
    pub const N2: usize = 15;
    pub const UV0: usize = 18;
    pub const UV1: usize = 20;
    pub const UV2: usize = 22;
    pub const FLAGS: usize = 24;
    pub const LEN: usize = 25;

    pub const HAS_NORMALS: u32 = 1;
}

pub mod plane {
    pub const POINT: usize = 0;
    pub const NORMAL: usize = 3;
    pub const LEN: usize = 6;
}

/// Header, positions, then normals and uvs when flagged, then triangle indices.
pub mod mesh {
    pub const N_VERTICES: usize = 0;
    pub const N_TRIANGLES: usize = 1;
    pub const FLAGS: usize = 2;
    pub const HEADER: usize = 3;

    pub const HAS_NORMALS: u32 = 1;
    pub const HAS_UVS: u32 = 2;

    pub fn normals_at(n_vertices: usize) -> usize {
        HEADER + 3 * n_vertices
    }

    pub fn uvs_at(n_vertices: usize, flags: u32) -> usize {
        normals_at(n_vertices) + if flags & HAS_NORMALS != 0 { 3 * n_vertices } else { 0 }
    }

    pub fn indices_at(n_vertices: usize, flags: u32) -> usize {
        uvs_at(n_vertices, flags) + if flags & HAS_UVS != 0 { 2 * n_vertices } else { 0 }
    }

    pub fn len(n_vertices: usize, n_triangles: usize, flags: u32) -> usize {
        indices_at(n_vertices, flags) + 3 * n_triangles
    }
}

pub mod constant {
    pub const VALUE: usize = 0;
    pub const LEN: usize = 3;
}

pub mod checkerboard {
    pub const SCALE: usize = 0;
    pub const COLOR_A: usize = 1;
    pub const COLOR_B: usize = 4;
    pub const LEN: usize = 7;
}

pub mod image_texture {
    pub const WIDTH: usize = 0;
    pub const HEIGHT: usize = 1;
    pub const SCALE: usize = 2;
    pub const HEADER: usize = 3;

    pub fn len(width: usize, height: usize) -> usize {
        HEADER + 3 * width * height
    }
}

pub mod matte {
    pub const KD: usize = 0;
    pub const SIGMA: usize = 1;
    pub const LEN: usize = 2;
}

pub mod glass {
    pub const KR: usize = 0;
    pub const KT: usize = 1;
    pub const ETA: usize = 2;
    pub const ROUGHNESS: usize = 3;
    pub const LEN: usize = 4;
}

pub mod metal {
    pub const ETA: usize = 0;
    pub const K: usize = 3;
    pub const ROUGHNESS: usize = 6;
    pub const LEN: usize = 7;
}

pub mod plastic {
    pub const KD: usize = 0;
    pub const KS: usize = 1;
    pub const ROUGHNESS: usize = 2;
    pub const LEN: usize = 3;
}

pub mod substrate {
    pub const KD: usize = 0;
    pub const KS: usize = 1;
    pub const U_ROUGHNESS: usize = 2;
    pub const V_ROUGHNESS: usize = 3;
    pub const LEN: usize = 4;
}

pub mod clear_coat {
    pub const BASE: usize = 0;
    pub const ETA: usize = 1;
    pub const ROUGHNESS: usize = 2;
    pub const LEN: usize = 3;
}

pub mod disney {
    pub const BASE_COLOR: usize = 0;
    pub const METALLIC: usize = 1;
    pub const ROUGHNESS: usize = 2;
    pub const SPECULAR: usize = 3;
    pub const CLEARCOAT: usize = 4;
    pub const CLEARCOAT_GLOSS: usize = 5;
    pub const LEN: usize = 6;
}

pub mod mirror {
    pub const KR: usize = 0;
    pub const LEN: usize = 1;
}

pub mod glossy {
    pub const KS: usize = 0;
    pub const ROUGHNESS: usize = 1;
    pub const LEN: usize = 2;
}

pub mod point_light {
    pub const POSITION: usize = 0;
    pub const INTENSITY: usize = 3;
    pub const LEN: usize = 6;
}

pub mod spot_light {
    pub const POSITION: usize = 0;
    pub const DIRECTION: usize = 3;
    pub const INTENSITY: usize = 6;
    pub const COS_TOTAL: usize = 9;
    pub const COS_FALLOFF: usize = 10;
    pub const LEN: usize = 11;
}

pub mod directional_light {
    /// Normalized direction the light travels in.
    pub const DIRECTION: usize = 0;
    pub const RADIANCE: usize = 3;
    pub const LEN: usize = 6;
}

pub mod area_light {
    /// Packed shape reference.
    pub const SHAPE: usize = 0;
    /// Index of the owning primitive, which supplies the transform.
    pub const PRIMITIVE: usize = 1;
    pub const EMISSION: usize = 2;
    pub const TWO_SIDED: usize = 5;
    /// World-space surface area.
    pub const AREA: usize = 6;
    pub const LEN: usize = 7;
}

/// Header, `width * height` RGB pixels, then the stored sampling distribution.
pub mod environment_light {
    use crate::sampling::Distribution2D;

    pub const WIDTH: usize = 0;
    pub const HEIGHT: usize = 1;
    pub const SCALE: usize = 2;
    /// Rotation about +y in radians.
    pub const ROTATION: usize = 3;
    pub const HEADER: usize = 4;

    pub fn distribution_at(width: usize, height: usize) -> usize {
        HEADER + 3 * width * height
    }

    pub fn len(width: usize, height: usize) -> usize {
        distribution_at(width, height) + Distribution2D::stored_len(width, height)
    }
}

/// Perez sky coefficients are five words each for luminance and the two chromaticities.
pub mod sky_light {
    pub const SUN: usize = 0;
    pub const TURBIDITY: usize = 3;
    pub const SCALE: usize = 4;
    pub const PEREZ_Y: usize = 5;
    pub const PEREZ_X_CHROMA: usize = 10;
    pub const PEREZ_Y_CHROMA: usize = 15;
    /// Zenith `(Y, x, y)`.
    pub const ZENITH: usize = 20;
    /// Perez function at the zenith for each of `(Y, x, y)`.
    pub const NORMALIZER: usize = 23;
    pub const LEN: usize = 26;
}

pub mod primitive {
    use crate::geometry::AFFINE_WORDS;

    pub const SHAPE: usize = 0;
    pub const MATERIAL: usize = 1;
    pub const LIGHT: usize = 2;
    pub const OBJECT_TO_WORLD: usize = 3;
    pub const WORLD_TO_OBJECT: usize = OBJECT_TO_WORLD + AFFINE_WORDS;
    pub const LEN: usize = WORLD_TO_OBJECT + AFFINE_WORDS;
}

/// Camera parameters in a device-friendly form. `right` and `up` are pre-scaled by the tangent of
/// the half field of view along their axis.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CameraRecord {
    pub position: [f32; 3],
    pub width: u32,
    pub right: [f32; 3],
    pub height: u32,
    pub up: [f32; 3],
    /// 0 jittered, 1 pixel center.
    pub sampling: u32,
    pub forward: [f32; 3],
    pub lens_radius: f32,
    pub focal_distance: f32,
    pub _pad: [u32; 3],
}

pub const CAMERA_WORDS: usize = std::mem::size_of::<CameraRecord>() / 4;
