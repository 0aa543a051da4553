//! Measurement column computation.

use ndarray::ArrayView1;
use tracing::debug;

use crate::utils::round_to;

use super::ExperimentTable;

/// Fill the measurement column of `table`.
///
/// Every row becomes `grand_mean + Σ deviations + Σ effects`, rounded to
/// `digits` fractional digits. Deviations are added in factor order before
/// effects. No randomness is involved, so calling it twice gives the same
/// column.
pub fn combine(table: &mut ExperimentTable, grand_mean: f64, digits: u32) {
    let ExperimentTable {
        deviations,
        effects,
        measurement,
        ..
    } = table;

    for ((value, devs), effs) in measurement
        .iter_mut()
        .zip(deviations.rows())
        .zip(effects.rows())
    {
        *value = round_to(unrounded_measurement(grand_mean, devs, effs), digits);
    }

    debug!(rows = measurement.len(), digits, "combined measurement column");
}

/// Grand mean plus one row's deviations, then its effects, before rounding.
pub(super) fn unrounded_measurement(
    grand_mean: f64,
    deviations: ArrayView1<'_, f64>,
    effects: ArrayView1<'_, f64>,
) -> f64 {
    let with_deviations = deviations.iter().fold(grand_mean, |acc, d| acc + d);
    effects.iter().fold(with_deviations, |acc, e| acc + e)
}
