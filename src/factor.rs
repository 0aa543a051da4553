//! Factor definitions and per-factor deviation tables.
//!
//! A [`Factor`] is one nested source of random variation (a "degree of
//! freedom" such as batch or lab). [`FactorTable::build`] turns a factor into
//! its small table of sampled deviations, one row per level repetition, before
//! the assembler stretches it over the whole experiment.

use rand::Rng;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sampler::SeedSampler;

/// Fractional digits kept on each sampled value before the deviation is taken.
///
/// This is separate from the measurement rounding chosen by the caller.
pub const DEVIATION_DIGITS: u32 = 4;

/// One nested source of variation in an experiment.
///
/// # Example
///
/// ```
/// use nested_synth::Factor;
///
/// let batch = Factor::new("batch-to-batch", 2, 0.01)
///     .with_level_names(["Batch A", "Batch B"])
///     .with_level_effects([-0.08, 0.08]);
///
/// assert_eq!(batch.level_count(), 2);
/// assert!(batch.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Factor {
    name: String,
    level_count: u32,
    variability_fraction: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    level_names: Option<Vec<String>>,
    #[cfg_attr(feature = "serde", serde(default))]
    level_effects: Option<Vec<f64>>,
}

impl Factor {
    /// Create a factor with `level_count` levels whose sampling standard
    /// deviation is `variability_fraction` of the grand mean.
    #[must_use]
    pub fn new(name: impl Into<String>, level_count: u32, variability_fraction: f64) -> Self {
        Self {
            name: name.into(),
            level_count,
            variability_fraction,
            level_names: None,
            level_effects: None,
        }
    }

    /// Attach display names for each level, in level order.
    #[must_use]
    pub fn with_level_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.level_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Attach a fixed effect for each level, as a fraction of the grand mean.
    #[must_use]
    pub fn with_level_effects<I>(mut self, effects: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.level_effects = Some(effects.into_iter().collect());
        self
    }

    /// Factor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of levels.
    #[must_use]
    pub fn level_count(&self) -> u32 {
        self.level_count
    }

    /// Sampling standard deviation as a fraction of the grand mean.
    #[must_use]
    pub fn variability_fraction(&self) -> f64 {
        self.variability_fraction
    }

    /// Level names, if any.
    #[must_use]
    pub fn level_names(&self) -> Option<&[String]> {
        self.level_names.as_deref()
    }

    /// Level effects as fractions of the grand mean, if any.
    #[must_use]
    pub fn level_effects(&self) -> Option<&[f64]> {
        self.level_effects.as_deref()
    }

    /// Check the definition is self-consistent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the name is empty, the level
    /// count is zero, the variability fraction is negative or not finite, or
    /// the names/effects lengths differ from the level count.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_configuration("factor name must not be empty"));
        }
        if self.level_count == 0 {
            return Err(Error::invalid_configuration(format!(
                "level_count for factor {:?} must be positive",
                self.name
            )));
        }
        if !self.variability_fraction.is_finite() || self.variability_fraction < 0.0 {
            return Err(Error::invalid_configuration(format!(
                "variability_fraction for factor {:?} must be a finite non-negative number, got {}",
                self.name, self.variability_fraction
            )));
        }
        if let Some(names) = &self.level_names {
            if names.len() != self.level_count as usize {
                return Err(Error::invalid_configuration(format!(
                    "factor {:?} has {} levels but {} level names",
                    self.name,
                    self.level_count,
                    names.len()
                )));
            }
        }
        if let Some(effects) = &self.level_effects {
            if effects.len() != self.level_count as usize {
                return Err(Error::invalid_configuration(format!(
                    "factor {:?} has {} levels but {} level effects",
                    self.name,
                    self.level_count,
                    effects.len()
                )));
            }
            if let Some(bad) = effects.iter().find(|e| !e.is_finite()) {
                return Err(Error::invalid_configuration(format!(
                    "level effect {} for factor {:?} is not finite",
                    bad, self.name
                )));
            }
        }
        Ok(())
    }
}

/// Sampled deviations for one factor before expansion to the full experiment.
///
/// Row count equals the factor's cumulative level count. The `level` column
/// repeats `1..=level_count` once per block.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTable {
    name: String,
    level: Vec<u32>,
    deviation: Vec<f64>,
    level_name: Option<Vec<String>>,
    level_effect: Option<Vec<f64>>,
}

impl FactorTable {
    /// Build the deviation table for `factor` with `row_count` rows.
    ///
    /// Each row draws `grand_mean + grand_mean * variability_fraction * z`
    /// from the sampler, rounds it to [`DEVIATION_DIGITS`], and keeps the
    /// difference from the grand mean.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`] if the factor is invalid or
    ///   `row_count` is not a multiple of its level count.
    /// - [`Error::EmptySeedPool`] if the sampler has no values.
    pub fn build<R: Rng>(
        factor: &Factor,
        grand_mean: f64,
        sampler: &SeedSampler,
        row_count: usize,
        rng: &mut R,
    ) -> Result<Self> {
        factor.validate()?;

        let n_levels = factor.level_count() as usize;
        if row_count % n_levels != 0 {
            return Err(Error::invalid_configuration(format!(
                "row count {} for factor {:?} is not a multiple of its {} levels",
                row_count,
                factor.name(),
                n_levels
            )));
        }

        let stddev = grand_mean * factor.variability_fraction();
        let deviation: Vec<f64> = sampler
            .generate(row_count, grand_mean, stddev, DEVIATION_DIGITS, rng)?
            .into_iter()
            .map(|v| v - grand_mean)
            .collect();

        let repeats = row_count / n_levels;
        let level: Vec<u32> = (0..repeats)
            .flat_map(|_| 1..=factor.level_count())
            .collect();

        let level_name = factor.level_names().map(|names| {
            level
                .iter()
                .map(|&l| names[(l - 1) as usize].clone())
                .collect()
        });

        let level_effect = factor.level_effects().map(|effects| {
            level
                .iter()
                .map(|&l| effects[(l - 1) as usize] * grand_mean)
                .collect()
        });

        debug!(
            factor = factor.name(),
            rows = row_count,
            named = level_name.is_some(),
            with_effects = level_effect.is_some(),
            "built factor table"
        );

        Ok(Self {
            name: factor.name().to_owned(),
            level,
            deviation,
            level_name,
            level_effect,
        })
    }

    /// Name of the factor this table belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.level.len()
    }

    /// Level id per row (1-based).
    #[must_use]
    pub fn level(&self) -> &[u32] {
        &self.level
    }

    /// Deviation from the grand mean per row, in measurement units.
    #[must_use]
    pub fn deviation(&self) -> &[f64] {
        &self.deviation
    }

    /// Level name per row, when the factor has named levels.
    #[must_use]
    pub fn level_name(&self) -> Option<&[String]> {
        self.level_name.as_deref()
    }

    /// Level effect per row in measurement units, when the factor has effects.
    #[must_use]
    pub fn level_effect(&self) -> Option<&[f64]> {
        self.level_effect.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn batch() -> Factor {
        Factor::new("batch-to-batch", 2, 0.01)
            .with_level_names(["Batch A", "Batch B"])
            .with_level_effects([-0.08, 0.08])
    }

    fn within_batch() -> Factor {
        Factor::new("within batch", 3, 0.005)
            .with_level_names(["Top", "Middle", "Bottom"])
            .with_level_effects([-0.04, 0.0, 0.03])
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_validate() {
        assert!(batch().validate().is_ok());
        assert!(Factor::new("lab", 2, 0.02).validate().is_ok());

        assert!(Factor::new("lab", 0, 0.02).validate().is_err());
        assert!(Factor::new("", 2, 0.02).validate().is_err());
        assert!(Factor::new("lab", 2, -0.1).validate().is_err());
        assert!(Factor::new("lab", 2, f64::NAN).validate().is_err());
        assert!(Factor::new("lab", 2, 0.02)
            .with_level_names(["only one"])
            .validate()
            .is_err());
        assert!(Factor::new("lab", 2, 0.02)
            .with_level_effects([0.1, 0.2, 0.3])
            .validate()
            .is_err());
    }

    #[test]
    fn test_build_first_factor() {
        let sampler = SeedSampler::new(10_000, &mut StdRng::seed_from_u64(11));
        let mut rng = StdRng::seed_from_u64(12);
        let table = FactorTable::build(&batch(), 1.10, &sampler, 2, &mut rng).unwrap();

        assert_eq!(table.name(), "batch-to-batch");
        assert_eq!(table.rows(), 2);
        assert_eq!(table.level(), &[1, 2]);
        assert_eq!(table.level_name().unwrap(), &["Batch A", "Batch B"]);
        assert_close(table.level_effect().unwrap(), &[-0.088, 0.088]);
    }

    #[test]
    fn test_build_repeats_levels() {
        let sampler = SeedSampler::new(10_000, &mut StdRng::seed_from_u64(13));
        let mut rng = StdRng::seed_from_u64(14);
        let table = FactorTable::build(&within_batch(), 1.10, &sampler, 6, &mut rng).unwrap();

        assert_eq!(table.level(), &[1, 2, 3, 1, 2, 3]);
        assert_eq!(
            table.level_name().unwrap(),
            &["Top", "Middle", "Bottom", "Top", "Middle", "Bottom"]
        );
        assert_close(
            table.level_effect().unwrap(),
            &[-0.044, 0.0, 0.033, -0.044, 0.0, 0.033],
        );
    }

    #[test]
    fn test_build_without_names_or_effects() {
        let sampler = SeedSampler::new(100, &mut StdRng::seed_from_u64(15));
        let mut rng = StdRng::seed_from_u64(16);
        let lab = Factor::new("lab", 2, 0.02);
        let table = FactorTable::build(&lab, 1.10, &sampler, 12, &mut rng).unwrap();

        assert_eq!(table.rows(), 12);
        assert!(table.level_name().is_none());
        assert!(table.level_effect().is_none());
    }

    #[test]
    fn test_deviation_is_rounded_draw_minus_mean() {
        // z = 1.23456 -> 1.10 + 0.011 * 1.23456 = 1.11358016 -> 1.1136
        let sampler = SeedSampler::from_pool(vec![1.234_56]);
        let mut rng = StdRng::seed_from_u64(17);
        let table = FactorTable::build(&batch(), 1.10, &sampler, 2, &mut rng).unwrap();
        for d in table.deviation() {
            assert!((d - 0.0136).abs() < 1e-12, "deviation {d}");
        }
    }

    #[test]
    fn test_deviation_spread_tracks_variability() {
        let sampler = SeedSampler::new(10_000, &mut StdRng::seed_from_u64(18));
        let mut rng = StdRng::seed_from_u64(19);
        let wide = Factor::new("wide", 1000, 0.10);
        let table = FactorTable::build(&wide, 50.0, &sampler, 1000, &mut rng).unwrap();

        let n = table.rows() as f64;
        let mean = table.deviation().iter().sum::<f64>() / n;
        let sd = (table
            .deviation()
            .iter()
            .map(|d| (d - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0))
            .sqrt();
        // expected sd = 50 * 0.10 = 5
        assert!((sd - 5.0).abs() < 0.6, "sd {sd}");
        assert!(mean.abs() < 0.8, "mean {mean}");
    }

    #[test]
    fn test_build_rejects_bad_row_count() {
        let sampler = SeedSampler::from_pool(vec![0.0]);
        let mut rng = StdRng::seed_from_u64(20);
        let err = FactorTable::build(&within_batch(), 1.10, &sampler, 4, &mut rng).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_build_rejects_mismatched_names() {
        let sampler = SeedSampler::from_pool(vec![0.0]);
        let mut rng = StdRng::seed_from_u64(21);
        let factor = Factor::new("within batch", 3, 0.005).with_level_names(["Top", "Bottom"]);
        let err = FactorTable::build(&factor, 1.10, &sampler, 3, &mut rng).unwrap_err();
        assert!(err.to_string().contains("level names"));
    }

    #[test]
    fn test_build_empty_pool() {
        let sampler = SeedSampler::from_pool(Vec::new());
        let mut rng = StdRng::seed_from_u64(22);
        let err = FactorTable::build(&batch(), 1.10, &sampler, 2, &mut rng).unwrap_err();
        assert_eq!(err, Error::EmptySeedPool);
    }
}
