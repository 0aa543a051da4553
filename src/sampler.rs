//! Seed pool sampling.
//!
//! A [`SeedSampler`] draws a pool of standard-normal values once, then serves
//! every later request by picking pool elements uniformly at random with
//! replacement. The pool is read-only after construction, so one sampler can
//! back every factor of an experiment.

use rand::Rng;
use rand_distr::StandardNormal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::round_to;

/// Cached pool of standard-normal draws.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeedSampler {
    pool: Vec<f64>,
}

impl SeedSampler {
    /// Draw a fresh pool of `pool_size` standard-normal values.
    ///
    /// A zero-sized pool is accepted here; every later draw from it fails
    /// with [`Error::EmptySeedPool`].
    ///
    /// # Example
    ///
    /// ```
    /// use nested_synth::SeedSampler;
    /// use rand::SeedableRng;
    ///
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    /// let sampler = SeedSampler::new(1000, &mut rng);
    /// assert_eq!(sampler.len(), 1000);
    /// ```
    pub fn new<R: Rng>(pool_size: usize, rng: &mut R) -> Self {
        let pool = (0..pool_size)
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect();
        Self { pool }
    }

    /// Wrap an explicit pool of values.
    #[must_use]
    pub fn from_pool(pool: Vec<f64>) -> Self {
        Self { pool }
    }

    /// Number of values in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether the pool has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// The pool contents, in generation order.
    #[must_use]
    pub fn pool(&self) -> &[f64] {
        &self.pool
    }

    /// One pool element chosen uniformly at random.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySeedPool`] if the pool is empty.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Result<f64> {
        if self.pool.is_empty() {
            return Err(Error::EmptySeedPool);
        }
        Ok(self.pool[rng.random_range(0..self.pool.len())])
    }

    /// `size` independent draws with replacement.
    ///
    /// A request for zero values returns an empty vector without touching
    /// the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySeedPool`] if `size > 0` and the pool is empty.
    pub fn sample<R: Rng>(&self, size: usize, rng: &mut R) -> Result<Vec<f64>> {
        (0..size).map(|_| self.draw(&mut *rng)).collect()
    }

    /// `mean + stddev * draw` for one uniformly chosen pool element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySeedPool`] if the pool is empty.
    pub fn scaled_draw<R: Rng>(&self, mean: f64, stddev: f64, rng: &mut R) -> Result<f64> {
        Ok(mean + stddev * self.draw(rng)?)
    }

    /// `len` scaled draws, each rounded to `digits` fractional digits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySeedPool`] if `len > 0` and the pool is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use nested_synth::SeedSampler;
    ///
    /// let sampler = SeedSampler::from_pool(vec![1.0]);
    /// let mut rng = rand::rng();
    /// let vals = sampler.generate(3, 10.0, 0.5, 2, &mut rng).unwrap();
    /// assert_eq!(vals, vec![10.5, 10.5, 10.5]);
    /// ```
    pub fn generate<R: Rng>(
        &self,
        len: usize,
        mean: f64,
        stddev: f64,
        digits: u32,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        (0..len)
            .map(|_| {
                self.scaled_draw(mean, stddev, &mut *rng)
                    .map(|v| round_to(v, digits))
            })
            .collect()
    }
}
