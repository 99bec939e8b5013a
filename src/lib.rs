#[macro_use] pub mod macros; // must stay at the top
pub mod math;
pub mod geometry;
pub mod spectrum;
pub mod sampling;
pub mod sampler;
pub mod fresnel;
pub mod reflection;
pub mod id_arena;
pub mod error;
pub mod scene;
pub mod compiler;
pub mod bvh;
pub mod kernel;
pub mod integrator;
pub mod film;
pub mod renderer;
pub mod imageio;

pub use geometry::*;
pub use std::f32::consts;

use cgmath::{Point2, Point3, Vector2, Vector3};

pub type Float = f32;

pub type Point2f = Point2<Float>;
pub type Point3f = Point3<Float>;
pub type Vec2f = Vector2<Float>;
pub type Vec3f = Vector3<Float>;
