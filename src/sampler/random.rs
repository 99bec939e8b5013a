use crate::{Point2f, Float};
use crate::math::ONE_MINUS_EPSILON;
use crate::sampler::Sampler;
use rand_xoshiro::Xoshiro256Plus;
use rand::{SeedableRng, Rng};

/// Independent uniform samples from a xoshiro256+ stream.
#[derive(Clone, Debug)]
pub struct RandomSampler {
    rng: Xoshiro256Plus,
}

impl RandomSampler {
    pub fn new_with_seed(seed: u64) -> Self {
        Self {
            rng: Xoshiro256Plus::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn get_1d(&mut self) -> Float {
        self.rng.gen::<Float>().min(ONE_MINUS_EPSILON)
    }

    fn get_2d(&mut self) -> Point2f {
        Point2f::new(self.get_1d(), self.get_1d())
    }

    fn clone_with_seed(&self, seed: u64) -> Self {
        Self::new_with_seed(seed)
    }
}
