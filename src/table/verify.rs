//! Structural checks on a finished experiment table.
//!
//! These re-derive what the assembler and combiner promise: the row count
//! matches the plan, every column has one entry per row, each factor's values are constant over its blocks with
//! levels cycling `1..=level_count`, and the measurement column equals the
//! rounded sum of grand mean, deviations and effects.

use crate::utils::{approx_eq, round_to};

use super::combine::unrounded_measurement;
use super::ExperimentTable;

/// Absolute tolerance used when comparing measurement values.
pub const MEASUREMENT_TOLERANCE: f64 = 1e-4;

/// Result of verifying an experiment table.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Whether the table passes every check.
    pub is_valid: bool,
    /// Details about any issues found.
    pub issues: Vec<VerificationIssue>,
}

/// A specific issue found during verification.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationIssue {
    /// Row count differs from the last cumulative level count.
    RowCountMismatch { expected: usize, actual: usize },
    /// Columns or cumulative levels are inconsistent with each other, so the
    /// per-row checks cannot run.
    ShapeMismatch { message: String },
    /// A level id is not the one the nesting pattern puts at this row.
    UnexpectedLevel {
        factor: String,
        row: usize,
        expected: u32,
        actual: u32,
    },
    /// A block of rows does not share a single deviation, effect or name.
    BrokenBlock {
        factor: String,
        column: &'static str,
        row: usize,
    },
    /// The measurement differs from the rounded sum of its parts.
    MeasurementMismatch { row: usize, expected: f64, actual: f64 },
}

/// Verify `table` against the invariants of the build procedure.
///
/// # Example
///
/// ```
/// use nested_synth::{ExperimentBuilder, Factor};
/// use nested_synth::table::verify_table;
///
/// let experiment = ExperimentBuilder::new()
///     .grand_mean(5.0)
///     .factor(Factor::new("batch", 3, 0.02))
///     .factor(Factor::new("lab", 2, 0.01))
///     .seed(1)
///     .build()
///     .unwrap();
/// let table = experiment.run().unwrap();
///
/// let result = verify_table(&table, 5.0, 4);
/// assert!(result.is_valid, "{:?}", result.issues);
/// ```
#[must_use]
pub fn verify_table(table: &ExperimentTable, grand_mean: f64, digits: u32) -> VerificationResult {
    let mut issues = Vec::new();
    let cumulative = table.cumulative_levels();
    let rows = table.rows();

    if cumulative.total_rows() != rows {
        issues.push(VerificationIssue::RowCountMismatch {
            expected: cumulative.total_rows(),
            actual: rows,
        });
        return VerificationResult {
            is_valid: false,
            issues,
        };
    }
    if let Some(message) = table.shape_error() {
        issues.push(VerificationIssue::ShapeMismatch { message });
        return VerificationResult {
            is_valid: false,
            issues,
        };
    }

    let mut previous = 1;
    for (j, (factor, cum)) in cumulative.iter().enumerate() {
        // shape_error guarantees cum is a non-zero multiple of previous
        let ratio = cum / previous;
        previous = cum;
        let Ok(n_levels) = u32::try_from(ratio) else {
            issues.push(VerificationIssue::ShapeMismatch {
                message: format!("factor {:?} has too many levels", factor),
            });
            continue;
        };
        let block = rows / cum;

        let levels = table.level_column(j);
        let deviations = table.deviation_column(j);
        let effects = table.effect_column(j);
        let names = table.name_column(j);

        let mut expected = 0;
        for row in 0..rows {
            if row % block == 0 {
                expected = expected % n_levels + 1;
            }
            if levels[row] != expected {
                issues.push(VerificationIssue::UnexpectedLevel {
                    factor: factor.to_owned(),
                    row,
                    expected,
                    actual: levels[row],
                });
            }

            if row % block == 0 {
                continue;
            }
            let start = row - row % block;
            let broken = if deviations[row] != deviations[start] {
                Some("deviation")
            } else if effects[row] != effects[start] {
                Some("effect")
            } else if names.is_some_and(|n| n[row] != n[start]) {
                Some("name")
            } else {
                None
            };
            if let Some(column) = broken {
                issues.push(VerificationIssue::BrokenBlock {
                    factor: factor.to_owned(),
                    column,
                    row,
                });
            }
        }
    }

    for (row, &actual) in table.measurement().iter().enumerate() {
        let raw = unrounded_measurement(
            grand_mean,
            table.deviations().row(row),
            table.effects().row(row),
        );
        let expected = round_to(raw, digits);
        if !approx_eq(expected, actual, MEASUREMENT_TOLERANCE) {
            issues.push(VerificationIssue::MeasurementMismatch {
                row,
                expected,
                actual,
            });
        }
    }

    VerificationResult {
        is_valid: issues.is_empty(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::{Factor, FactorTable};
    use crate::plan::plan;
    use crate::sampler::SeedSampler;
    use crate::table::{assemble, combine};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table(seed: u64) -> ExperimentTable {
        let factors = vec![
            Factor::new("batch", 2, 0.01).with_level_names(["A", "B"]),
            Factor::new("within", 3, 0.005).with_level_effects([-0.04, 0.0, 0.03]),
            Factor::new("lab", 2, 0.02),
        ];
        let cum = plan(&factors).unwrap();
        let sampler = SeedSampler::new(1000, &mut StdRng::seed_from_u64(seed));
        let mut rng = StdRng::seed_from_u64(seed + 1);
        let tables: Vec<FactorTable> = factors
            .iter()
            .enumerate()
            .map(|(i, f)| FactorTable::build(f, 1.10, &sampler, cum.at(i).unwrap(), &mut rng).unwrap())
            .collect();
        let mut table = assemble(&tables, &cum).unwrap();
        combine(&mut table, 1.10, 4);
        table
    }

    #[test]
    fn test_valid_table() {
        let result = verify_table(&table(1), 1.10, 4);
        assert!(result.is_valid, "{:?}", result.issues);
    }

    #[test]
    fn test_detects_wrong_grand_mean() {
        let result = verify_table(&table(2), 2.0, 4);
        assert!(!result.is_valid);
        assert!(result
            .issues
            .iter()
            .all(|i| matches!(i, VerificationIssue::MeasurementMismatch { .. })));
        assert_eq!(result.issues.len(), 12);
    }

    #[test]
    fn test_detects_tampered_level() {
        let mut t = table(3);
        t.levels[[4, 1]] = 1;
        let result = verify_table(&t, 1.10, 4);
        assert!(!result.is_valid);
        assert_eq!(
            result.issues,
            vec![VerificationIssue::UnexpectedLevel {
                factor: "within".into(),
                row: 4,
                expected: 3,
                actual: 1,
            }]
        );
    }

    #[test]
    fn test_detects_broken_block() {
        let mut t = table(4);
        t.deviations[[1, 0]] += 0.5;
        let result = verify_table(&t, 1.10, 4);
        assert!(!result.is_valid);
        assert!(result.issues.contains(&VerificationIssue::BrokenBlock {
            factor: "batch".into(),
            column: "deviation",
            row: 1,
        }));
    }

    #[test]
    fn test_reports_short_name_column() {
        let mut t = table(5);
        t.level_names[0].as_mut().unwrap().pop();
        let result = verify_table(&t, 1.10, 4);
        assert!(!result.is_valid);
        assert_eq!(result.issues.len(), 1);
        assert!(matches!(
            &result.issues[0],
            VerificationIssue::ShapeMismatch { message } if message.contains("level names")
        ));
    }

    #[test]
    fn test_reports_mismatched_column_shape() {
        let mut t = table(6);
        t.deviations = ndarray::Array2::zeros((12, 2));
        let result = verify_table(&t, 1.10, 4);
        assert!(!result.is_valid);
        assert!(matches!(
            &result.issues[0],
            VerificationIssue::ShapeMismatch { message } if message.contains("deviations")
        ));
    }

    #[test]
    fn test_level_cycle_restarts_each_outer_block() {
        // within has 3 levels in blocks of 2: 1 1 2 2 3 3 1 1 2 2 3 3
        let t = table(7);
        let expected: Vec<u32> = [1, 1, 2, 2, 3, 3].repeat(2);
        assert_eq!(t.level_column(1).to_vec(), expected);
        assert!(verify_table(&t, 1.10, 4).is_valid);
    }
}
