//! Expansion of per-factor tables to the full experiment length.

use ndarray::{s, Array1, Array2};
use tracing::debug;

use crate::error::{Error, Result};
use crate::factor::FactorTable;
use crate::plan::CumulativeLevels;

use super::{ExperimentTable, DEFAULT_MEASUREMENT_NAME};

/// Merge factor tables into one experiment table.
///
/// For the factor at position `j` the block length is
/// `total_rows / cumulative[j]`, and row `i` of its table fills experiment
/// rows `[i * block, (i + 1) * block)`. Coarse factors therefore span long
/// contiguous blocks while the last factor maps one-to-one onto rows.
/// Factors without effects get a column of `0.0`. The measurement column is
/// left at zero for [`combine`](super::combine) to fill.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if the tables do not line up with
/// `cumulative` (count, order or row counts) or a cumulative count does not
/// divide the total row count.
pub fn assemble(tables: &[FactorTable], cumulative: &CumulativeLevels) -> Result<ExperimentTable> {
    if tables.len() != cumulative.len() {
        return Err(Error::invalid_configuration(format!(
            "{} factor tables given for {} planned factors",
            tables.len(),
            cumulative.len()
        )));
    }
    if tables.is_empty() {
        return Err(Error::invalid_configuration(
            "at least one factor table is required",
        ));
    }

    let n_rows = cumulative.total_rows();
    let n_factors = tables.len();

    let mut levels = Array2::<u32>::zeros((n_rows, n_factors));
    let mut deviations = Array2::<f64>::zeros((n_rows, n_factors));
    let mut effects = Array2::<f64>::zeros((n_rows, n_factors));
    let mut level_names = Vec::with_capacity(n_factors);

    for (j, (table, (planned, cum))) in tables.iter().zip(cumulative.iter()).enumerate() {
        if table.name() != planned {
            return Err(Error::invalid_configuration(format!(
                "factor table {:?} is out of order, expected {:?} at position {}",
                table.name(),
                planned,
                j
            )));
        }
        if table.rows() != cum {
            return Err(Error::invalid_configuration(format!(
                "factor table {:?} has {} rows, expected its cumulative level count {}",
                table.name(),
                table.rows(),
                cum
            )));
        }

        let block = cumulative.block_length(j)?;
        let mut names = table.level_name().map(|_| Vec::with_capacity(n_rows));

        for i in 0..table.rows() {
            let rows = i * block..(i + 1) * block;
            levels
                .slice_mut(s![rows.clone(), j])
                .fill(table.level()[i]);
            deviations
                .slice_mut(s![rows.clone(), j])
                .fill(table.deviation()[i]);
            if let Some(effect) = table.level_effect() {
                effects.slice_mut(s![rows, j]).fill(effect[i]);
            }
            if let (Some(names), Some(source)) = (names.as_mut(), table.level_name()) {
                names.extend(std::iter::repeat(source[i].clone()).take(block));
            }
        }

        debug!(
            factor = table.name(),
            block_length = block,
            blocks = table.rows(),
            "expanded factor"
        );
        level_names.push(names);
    }

    Ok(ExperimentTable {
        factors: tables.iter().map(|t| t.name().to_owned()).collect(),
        cumulative: cumulative.clone(),
        levels,
        deviations,
        effects,
        level_names,
        measurement: Array1::zeros(n_rows),
        measurement_name: DEFAULT_MEASUREMENT_NAME.to_owned(),
    })
}
