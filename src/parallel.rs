//! Parallel factor table construction.
//!
//! Enable with the `parallel` feature flag.
//!
//! Factor tables are independent of each other, so they can be sampled on
//! the rayon pool. Assembly and combination still run afterwards on the
//! calling thread. Each factor gets its own [`StdRng`] seeded from the
//! caller's RNG in factor order, which keeps seeded runs reproducible no
//! matter how rayon schedules the work. The draws differ from the sequential
//! [`Experiment::create_experiment`] for the same seed.
//!
//! # Usage
//!
//! ```ignore
//! use nested_synth::{ExperimentBuilder, Factor};
//! use nested_synth::parallel::par_run;
//!
//! let experiment = ExperimentBuilder::new()
//!     .grand_mean(1.10)
//!     .factor(Factor::new("batch", 20, 0.01))
//!     .factor(Factor::new("lab", 50, 0.02))
//!     .seed(7)
//!     .build()
//!     .unwrap();
//! let table = par_run(&experiment).unwrap();
//! assert_eq!(table.rows(), 1000);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::builder::Experiment;
use crate::error::Result;
use crate::factor::FactorTable;
use crate::plan::CumulativeLevels;
use crate::table::ExperimentTable;

/// Build every factor table of `experiment` in parallel.
///
/// # Errors
///
/// Propagates [`FactorTable::build`] errors. When several factors fail, the
/// error of the earliest one in factor order is returned.
pub fn par_factor_tables<R: Rng>(
    experiment: &Experiment,
    cumulative: &CumulativeLevels,
    rng: &mut R,
) -> Result<Vec<FactorTable>> {
    let factors = experiment.factors();
    let seeds: Vec<u64> = factors.iter().map(|_| rng.random()).collect();
    let rows: Vec<usize> = cumulative.iter().map(|(_, c)| c).collect();

    let built: Vec<Result<FactorTable>> = (0..factors.len().min(rows.len()))
        .into_par_iter()
        .map(|i| {
            let mut factor_rng = StdRng::seed_from_u64(seeds[i]);
            FactorTable::build(
                &factors[i],
                experiment.grand_mean(),
                experiment.sampler(),
                rows[i],
                &mut factor_rng,
            )
        })
        .collect();
    built.into_iter().collect()
}

/// Parallel counterpart of [`Experiment::create_experiment`].
///
/// # Errors
///
/// Same as [`Experiment::create_experiment`].
pub fn par_create_experiment<R: Rng>(
    experiment: &Experiment,
    rng: &mut R,
) -> Result<ExperimentTable> {
    let cumulative = experiment.cumulative_levels()?;
    let tables = par_factor_tables(experiment, &cumulative, rng)?;
    experiment.finish(&tables, &cumulative)
}

/// Parallel counterpart of [`Experiment::run`].
///
/// # Errors
///
/// Same as [`Experiment::create_experiment`].
pub fn par_run(experiment: &Experiment) -> Result<ExperimentTable> {
    match experiment.draw_seed() {
        Some(seed) => par_create_experiment(experiment, &mut StdRng::seed_from_u64(seed)),
        None => par_create_experiment(experiment, &mut rand::rng()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ExperimentBuilder;
    use crate::factor::Factor;
    use crate::plan::plan;
    use crate::table::verify_table;

    fn experiment(seed: u64) -> Experiment {
        ExperimentBuilder::new()
            .grand_mean(1.10)
            .factor(
                Factor::new("batch-to-batch", 2, 0.01)
                    .with_level_names(["Batch A", "Batch B"])
                    .with_level_effects([-0.08, 0.08]),
            )
            .factor(Factor::new("within batch", 3, 0.005))
            .factor(Factor::new("lab", 4, 0.02))
            .seed(seed)
            .build()
            .unwrap()
    }

    #[test]
    fn test_par_run_matches_invariants() {
        let exp = experiment(1);
        let table = par_run(&exp).unwrap();
        assert_eq!(table.rows(), 24);
        let result = verify_table(&table, exp.grand_mean(), exp.digits());
        assert!(result.is_valid, "{:?}", result.issues);
    }

    #[test]
    fn test_par_run_is_reproducible() {
        let exp = experiment(2);
        assert_eq!(par_run(&exp).unwrap(), par_run(&exp).unwrap());
    }

    #[test]
    fn test_par_factor_tables_shapes() {
        let exp = experiment(3);
        let cum = exp.cumulative_levels().unwrap();
        let tables = par_factor_tables(&exp, &cum, &mut StdRng::seed_from_u64(4)).unwrap();
        let rows: Vec<usize> = tables.iter().map(FactorTable::rows).collect();
        assert_eq!(rows, vec![2, 6, 24]);
        let names: Vec<&str> = tables.iter().map(FactorTable::name).collect();
        assert_eq!(names, vec!["batch-to-batch", "within batch", "lab"]);
    }

    #[test]
    fn test_par_factor_tables_reports_earliest_failure() {
        let exp = ExperimentBuilder::new()
            .grand_mean(1.0)
            .factor(Factor::new("a", 2, 0.01))
            .factor(Factor::new("b", 4, 0.01))
            .seed(5)
            .build()
            .unwrap();
        // 3 rows do not fit 2 levels, 9 rows do not fit 4 levels
        let cum = plan(&[Factor::new("x", 3, 0.01), Factor::new("y", 3, 0.01)]).unwrap();

        for seed in 0..20 {
            let err = par_factor_tables(&exp, &cum, &mut StdRng::seed_from_u64(seed)).unwrap_err();
            assert!(err.to_string().contains("\"a\""), "{err}");
        }
    }
}
