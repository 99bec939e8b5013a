use crate::{Float, Point2f};

pub mod random;

pub use random::RandomSampler;

/// Source of canonical sample values in `[0, 1)`.
pub trait Sampler: Send {
    fn get_1d(&mut self) -> Float;

    fn get_2d(&mut self) -> Point2f;

    fn clone_with_seed(&self, seed: u64) -> Self where Self: Sized;
}
