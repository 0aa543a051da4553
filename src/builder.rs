//! Builder and build procedure for synthetic experiments.
//!
//! # Example
//!
//! ```
//! use nested_synth::{ExperimentBuilder, Factor};
//!
//! let experiment = ExperimentBuilder::new()
//!     .seed_pool_size(10_000)
//!     .grand_mean(1.10)
//!     .factor(
//!         Factor::new("batch-to-batch", 2, 0.01)
//!             .with_level_names(["Batch A", "Batch B"])
//!             .with_level_effects([-0.08, 0.08]),
//!     )
//!     .factor(Factor::new("within batch", 3, 0.005))
//!     .factor(Factor::new("lab", 2, 0.02))
//!     .digits(4)
//!     .measurement_name("thickness")
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let table = experiment.run().unwrap();
//! assert_eq!(table.rows(), 12);
//! assert_eq!(table.measurement_name(), "thickness");
//! ```
//!
//! # Build procedure
//!
//! [`Experiment::create_experiment`] runs a fixed sequence of stages, each
//! producing the input of the next:
//!
//! 1. [`Experiment::cumulative_levels`]: running product of level counts
//! 2. [`Experiment::factor_tables`]: one sampled [`FactorTable`] per factor,
//!    with level names and effects attached where the factor defines them
//! 3. [`assemble`]: block expansion into the full table
//! 4. [`combine`]: rounded measurement column, renamed if requested

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::factor::{Factor, FactorTable};
use crate::plan::{plan, CumulativeLevels};
use crate::sampler::SeedSampler;
use crate::table::{assemble, combine, ExperimentTable, DEFAULT_MEASUREMENT_NAME};

/// Seed pool size used when none is given.
pub const DEFAULT_SEED_POOL_SIZE: usize = 10_000;

/// Measurement rounding digits used when none are given.
pub const DEFAULT_DIGITS: u32 = 4;

/// Builder for [`Experiment`].
///
/// Only the grand mean and at least one factor are required.
#[derive(Debug, Clone, Default)]
pub struct ExperimentBuilder {
    seed_pool_size: Option<usize>,
    grand_mean: Option<f64>,
    factors: Vec<Factor>,
    digits: Option<u32>,
    measurement_name: Option<String>,
    seed: Option<u64>,
}

impl ExperimentBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of standard-normal values in the seed pool.
    #[must_use]
    pub fn seed_pool_size(mut self, size: usize) -> Self {
        self.seed_pool_size = Some(size);
        self
    }

    /// Grand mean of the measurement.
    #[must_use]
    pub fn grand_mean(mut self, grand_mean: f64) -> Self {
        self.grand_mean = Some(grand_mean);
        self
    }

    /// Append a factor. Factors nest in the order they are added, coarsest first.
    #[must_use]
    pub fn factor(mut self, factor: Factor) -> Self {
        self.factors.push(factor);
        self
    }

    /// Append several factors in order.
    #[must_use]
    pub fn factors(mut self, factors: impl IntoIterator<Item = Factor>) -> Self {
        self.factors.extend(factors);
        self
    }

    /// Fractional digits of the measurement column.
    #[must_use]
    pub fn digits(mut self, digits: u32) -> Self {
        self.digits = Some(digits);
        self
    }

    /// Name for the measurement column (default `sim_meas`).
    #[must_use]
    pub fn measurement_name(mut self, name: impl Into<String>) -> Self {
        self.measurement_name = Some(name.into());
        self
    }

    /// Seed the pool and the draws so that [`Experiment::run`] is reproducible.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the definition and draw the seed pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if:
    /// - the grand mean is missing or not finite
    /// - no factors were added, or a factor is invalid
    /// - factor names repeat or the cumulative level count overflows
    /// - the measurement name is empty
    pub fn build(self) -> Result<Experiment> {
        let grand_mean = self
            .grand_mean
            .ok_or_else(|| Error::invalid_configuration("grand mean must be specified"))?;
        if !grand_mean.is_finite() {
            return Err(Error::invalid_configuration(format!(
                "grand mean must be finite, got {}",
                grand_mean
            )));
        }

        for factor in &self.factors {
            factor.validate()?;
        }
        // Rejects empty, duplicate, zero-level and overflowing factor lists.
        plan(&self.factors)?;

        let measurement_name = self
            .measurement_name
            .unwrap_or_else(|| DEFAULT_MEASUREMENT_NAME.to_owned());
        if measurement_name.is_empty() {
            return Err(Error::invalid_configuration(
                "measurement name must not be empty",
            ));
        }

        let pool_size = self.seed_pool_size.unwrap_or(DEFAULT_SEED_POOL_SIZE);
        let (sampler, draw_seed) = match self.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                let sampler = SeedSampler::new(pool_size, &mut rng);
                (sampler, Some(rng.random::<u64>()))
            }
            None => (SeedSampler::new(pool_size, &mut rand::rng()), None),
        };

        debug!(
            factors = self.factors.len(),
            pool_size,
            seeded = draw_seed.is_some(),
            "built experiment definition"
        );

        Ok(Experiment {
            sampler,
            grand_mean,
            factors: self.factors,
            digits: self.digits.unwrap_or(DEFAULT_DIGITS),
            measurement_name,
            draw_seed,
        })
    }
}

/// An immutable experiment definition together with its seed pool.
#[derive(Debug, Clone)]
pub struct Experiment {
    sampler: SeedSampler,
    grand_mean: f64,
    factors: Vec<Factor>,
    digits: u32,
    measurement_name: String,
    draw_seed: Option<u64>,
}

impl Experiment {
    /// The seed pool shared by every factor.
    #[must_use]
    pub fn sampler(&self) -> &SeedSampler {
        &self.sampler
    }

    /// Grand mean of the measurement.
    #[must_use]
    pub fn grand_mean(&self) -> f64 {
        self.grand_mean
    }

    /// Factors in nesting order.
    #[must_use]
    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Look up a factor by name.
    #[must_use]
    pub fn factor(&self, name: &str) -> Option<&Factor> {
        self.factors.iter().find(|f| f.name() == name)
    }

    /// Measurement rounding digits.
    #[must_use]
    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Name of the measurement column.
    #[must_use]
    pub fn measurement_name(&self) -> &str {
        &self.measurement_name
    }

    /// Whether [`run`](Self::run) is reproducible.
    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.draw_seed.is_some()
    }

    /// Stage 1: cumulative level counts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for malformed level counts.
    pub fn cumulative_levels(&self) -> Result<CumulativeLevels> {
        plan(&self.factors)
    }

    /// Stage 2: one factor table per factor, sized by its cumulative level count.
    ///
    /// Factors are sampled in order from the same `rng`.
    ///
    /// # Errors
    ///
    /// Propagates [`FactorTable::build`] errors.
    pub fn factor_tables<R: Rng>(
        &self,
        cumulative: &CumulativeLevels,
        rng: &mut R,
    ) -> Result<Vec<FactorTable>> {
        self.factors
            .iter()
            .zip(cumulative.iter())
            .map(|(factor, (_, rows))| {
                FactorTable::build(factor, self.grand_mean, &self.sampler, rows, &mut *rng)
            })
            .collect()
    }

    /// Stages 3 and 4: assemble factor tables and fill the measurement column.
    ///
    /// # Errors
    ///
    /// Propagates [`assemble`] errors.
    pub fn finish(
        &self,
        tables: &[FactorTable],
        cumulative: &CumulativeLevels,
    ) -> Result<ExperimentTable> {
        let mut table = assemble(tables, cumulative)?;
        combine(&mut table, self.grand_mean, self.digits);
        table.rename_measurement(self.measurement_name.clone());

        info!(
            rows = table.rows(),
            factors = table.factor_count(),
            measurement = table.measurement_name(),
            "created experiment table"
        );
        Ok(table)
    }

    /// Run the full build procedure with draws from `rng`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`] for malformed factor definitions
    /// - [`Error::EmptySeedPool`] if the seed pool has no values
    pub fn create_experiment<R: Rng>(&self, rng: &mut R) -> Result<ExperimentTable> {
        let cumulative = self.cumulative_levels()?;
        let tables = self.factor_tables(&cumulative, rng)?;
        self.finish(&tables, &cumulative)
    }

    /// Run the full build procedure.
    ///
    /// Seeded experiments draw from a fixed sequence and return the same
    /// table on every call; unseeded ones use the thread RNG.
    ///
    /// # Errors
    ///
    /// Same as [`create_experiment`](Self::create_experiment).
    pub fn run(&self) -> Result<ExperimentTable> {
        match self.draw_seed {
            Some(seed) => self.create_experiment(&mut StdRng::seed_from_u64(seed)),
            None => self.create_experiment(&mut rand::rng()),
        }
    }

    #[cfg(feature = "parallel")]
    pub(crate) fn draw_seed(&self) -> Option<u64> {
        self.draw_seed
    }
}
