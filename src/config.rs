//! Map-based experiment configuration.
//!
//! [`ExperimentConfig`] describes an experiment the way a caller typically
//! writes it down: an ordered list of factor names plus lookups keyed by
//! name for level counts, variability fractions and the optional level names
//! and effects. With the `serde` feature it can be read from any serde format.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::builder::{Experiment, ExperimentBuilder, DEFAULT_DIGITS, DEFAULT_SEED_POOL_SIZE};
use crate::error::{Error, Result};
use crate::factor::Factor;

/// Experiment inputs keyed by factor name.
///
/// # Example
///
/// ```
/// use nested_synth::ExperimentConfig;
///
/// let names = vec!["batch".to_string(), "lab".to_string()];
/// let config = ExperimentConfig {
///     grand_mean: 20.0,
///     level_counts: names.iter().cloned().zip([3, 2]).collect(),
///     variability_fractions: names.iter().cloned().zip([0.01, 0.02]).collect(),
///     factor_names: names,
///     seed: Some(1),
///     ..Default::default()
/// };
///
/// let table = config.build().unwrap().run().unwrap();
/// assert_eq!(table.rows(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExperimentConfig {
    /// Number of standard-normal values in the seed pool.
    pub seed_pool_size: usize,
    /// Grand mean of the measurement.
    pub grand_mean: f64,
    /// Factor names, coarsest first.
    pub factor_names: Vec<String>,
    /// Level count for every named factor.
    pub level_counts: HashMap<String, u32>,
    /// Variability fraction for every named factor.
    pub variability_fractions: HashMap<String, f64>,
    /// Level names for the factors that have them.
    pub level_names: HashMap<String, Vec<String>>,
    /// Level effects (fractions of the grand mean) for the factors that have them.
    pub level_effects: HashMap<String, Vec<f64>>,
    /// Fractional digits of the measurement column.
    pub digits: u32,
    /// Name of the measurement column (default `sim_meas`).
    pub measurement_name: Option<String>,
    /// Seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed_pool_size: DEFAULT_SEED_POOL_SIZE,
            grand_mean: 0.0,
            factor_names: Vec::new(),
            level_counts: HashMap::new(),
            variability_fractions: HashMap::new(),
            level_names: HashMap::new(),
            level_effects: HashMap::new(),
            digits: DEFAULT_DIGITS,
            measurement_name: None,
            seed: None,
        }
    }
}

impl ExperimentConfig {
    /// Resolve the maps into ordered [`Factor`] values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if a listed factor has no level
    /// count or variability fraction, or if a map refers to a factor that is
    /// not listed.
    pub fn factors(&self) -> Result<Vec<Factor>> {
        self.check_known_keys("level_counts", self.level_counts.keys())?;
        self.check_known_keys("variability_fractions", self.variability_fractions.keys())?;
        self.check_known_keys("level_names", self.level_names.keys())?;
        self.check_known_keys("level_effects", self.level_effects.keys())?;

        self.factor_names
            .iter()
            .map(|name| -> Result<Factor> {
                let levels = *self.level_counts.get(name).ok_or_else(|| {
                    Error::invalid_configuration(format!("no level count for factor {:?}", name))
                })?;
                let fraction = *self.variability_fractions.get(name).ok_or_else(|| {
                    Error::invalid_configuration(format!(
                        "no variability fraction for factor {:?}",
                        name
                    ))
                })?;

                let mut factor = Factor::new(name.clone(), levels, fraction);
                if let Some(names) = self.level_names.get(name) {
                    factor = factor.with_level_names(names.iter().cloned());
                }
                if let Some(effects) = self.level_effects.get(name) {
                    factor = factor.with_level_effects(effects.iter().copied());
                }
                Ok(factor)
            })
            .collect()
    }

    /// Convert into an [`ExperimentBuilder`].
    ///
    /// # Errors
    ///
    /// Same as [`factors`](Self::factors).
    pub fn into_builder(self) -> Result<ExperimentBuilder> {
        let factors = self.factors()?;
        let mut builder = ExperimentBuilder::new()
            .seed_pool_size(self.seed_pool_size)
            .grand_mean(self.grand_mean)
            .factors(factors)
            .digits(self.digits);
        if let Some(name) = self.measurement_name {
            builder = builder.measurement_name(name);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        Ok(builder)
    }

    /// Validate and build the experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for any malformed input.
    pub fn build(self) -> Result<Experiment> {
        self.into_builder()?.build()
    }

    fn check_known_keys<'a>(
        &self,
        map: &str,
        mut keys: impl Iterator<Item = &'a String>,
    ) -> Result<()> {
        match keys.find(|k| !self.factor_names.contains(k)) {
            Some(unknown) => Err(Error::invalid_configuration(format!(
                "{} refers to unknown factor {:?}",
                map, unknown
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ["batch-to-batch", "within batch", "lab"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn fixture() -> ExperimentConfig {
        let names = names();
        ExperimentConfig {
            seed_pool_size: 10_000,
            grand_mean: 1.10,
            level_counts: names.iter().cloned().zip([2, 3, 2]).collect(),
            variability_fractions: names.iter().cloned().zip([0.01, 0.005, 0.02]).collect(),
            level_names: HashMap::from([
                (
                    "batch-to-batch".to_string(),
                    vec!["Batch A".to_string(), "Batch B".to_string()],
                ),
                (
                    "within batch".to_string(),
                    vec!["Top".to_string(), "Middle".to_string(), "Bottom".to_string()],
                ),
            ]),
            level_effects: HashMap::from([
                ("batch-to-batch".to_string(), vec![-0.08, 0.08]),
                ("within batch".to_string(), vec![-0.04, 0.0, 0.03]),
            ]),
            factor_names: names,
            digits: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_factors_follow_name_order() {
        let factors = fixture().factors().unwrap();
        let names: Vec<&str> = factors.iter().map(Factor::name).collect();
        assert_eq!(names, vec!["batch-to-batch", "within batch", "lab"]);

        assert_eq!(factors[1].level_count(), 3);
        assert_eq!(factors[1].variability_fraction(), 0.005);
        assert_eq!(factors[0].level_names().unwrap(), &["Batch A", "Batch B"]);
        assert_eq!(factors[1].level_effects().unwrap(), &[-0.04, 0.0, 0.03]);
        assert!(factors[2].level_names().is_none());
        assert!(factors[2].level_effects().is_none());
    }

    #[test]
    fn test_build_and_run() {
        let mut config = fixture();
        config.seed = Some(12);
        config.measurement_name = Some("thickness".into());
        let table = config.build().unwrap().run().unwrap();

        assert_eq!(table.rows(), 12);
        assert_eq!(table.measurement_name(), "thickness");
        assert_eq!(table.name_column(0).unwrap()[11], "Batch B");
    }

    #[test]
    fn test_missing_entries() {
        let mut config = fixture();
        config.level_counts.remove("lab");
        assert!(config.factors().unwrap_err().to_string().contains("level count"));

        let mut config = fixture();
        config.variability_fractions.remove("within batch");
        assert!(config
            .factors()
            .unwrap_err()
            .to_string()
            .contains("variability fraction"));
    }

    #[test]
    fn test_unknown_factor_in_map() {
        let mut config = fixture();
        config
            .level_effects
            .insert("operator".to_string(), vec![0.1, 0.2]);
        let err = config.factors().unwrap_err();
        assert!(err.to_string().contains("operator"));
    }

    #[test]
    fn test_mismatched_lengths_fail_at_build() {
        let mut config = fixture();
        config
            .level_names
            .insert("lab".to_string(), vec!["Lab 1".to_string()]);
        assert!(matches!(
            config.build(),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_default_is_incomplete() {
        assert!(ExperimentConfig::default().build().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "grand_mean": 1.10,
            "factor_names": ["batch", "lab"],
            "level_counts": {"batch": 2, "lab": 2},
            "variability_fractions": {"batch": 0.01, "lab": 0.02},
            "level_effects": {"batch": [-0.08, 0.08]}
        }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed_pool_size, DEFAULT_SEED_POOL_SIZE);
        assert_eq!(config.digits, DEFAULT_DIGITS);
        assert!(config.level_names.is_empty());

        let table = config.build().unwrap().run().unwrap();
        assert_eq!(table.rows(), 4);
    }
}
