//! The assembled experiment table.
//!
//! ## Overview
//!
//! - [`ExperimentTable`]: one row per experimental run, with per-factor level,
//!   deviation, optional level name and effect columns, and a final
//!   measurement column
//! - [`assemble`]: expands per-factor tables to full length by block slicing
//! - [`combine`]: fills the measurement column
//! - [`verify_table`]: re-checks the structural invariants of a finished table
//!
//! ## Layout
//!
//! For factors `[A, B, C]` the columns are, in order,
//! `level_A, deviation_A, A (if named), effect_A, level_B, ...` followed by
//! the measurement column.

mod assemble;
mod combine;
mod verify;

pub use assemble::assemble;
pub use combine::combine;
pub use verify::{verify_table, VerificationIssue, VerificationResult};

use std::fmt;

use ndarray::{Array1, Array2, ArrayView1};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plan::CumulativeLevels;

/// Default name of the measurement column.
pub const DEFAULT_MEASUREMENT_NAME: &str = "sim_meas";

/// Column names derived for one factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    /// `level_<factor>`
    pub level: String,
    /// `deviation_<factor>`
    pub deviation: String,
    /// `<factor>`, holding level names when the factor has them.
    pub level_name: String,
    /// `effect_<factor>`
    pub effect: String,
}

impl ColumnNames {
    /// Derive the column names for the factor called `factor`.
    ///
    /// ```
    /// use nested_synth::table::ColumnNames;
    ///
    /// let cols = ColumnNames::for_factor("lab");
    /// assert_eq!(cols.level, "level_lab");
    /// assert_eq!(cols.deviation, "deviation_lab");
    /// assert_eq!(cols.level_name, "lab");
    /// assert_eq!(cols.effect, "effect_lab");
    /// ```
    #[must_use]
    pub fn for_factor(factor: &str) -> Self {
        Self {
            level: format!("level_{factor}"),
            deviation: format!("deviation_{factor}"),
            level_name: factor.to_owned(),
            effect: format!("effect_{factor}"),
        }
    }
}

/// A borrowed view of one table column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column<'a> {
    /// Integer level ids.
    Level(ArrayView1<'a, u32>),
    /// Real valued deviations, effects or measurements.
    Real(ArrayView1<'a, f64>),
    /// Level names.
    Text(&'a [String]),
}

impl Column<'_> {
    /// Number of rows in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Level(v) => v.len(),
            Self::Real(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Whether the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, row: usize) -> String {
        match self {
            Self::Level(v) => v[row].to_string(),
            Self::Real(v) => v[row].to_string(),
            Self::Text(v) => v[row].clone(),
        }
    }
}

/// Simulated measurements for a nested experiment.
///
/// Level ids, deviations and effects are stored as `(rows, factors)` arrays;
/// column `j` of each belongs to the `j`-th factor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "RawExperimentTable")
)]
pub struct ExperimentTable {
    factors: Vec<String>,
    cumulative: CumulativeLevels,
    levels: Array2<u32>,
    deviations: Array2<f64>,
    effects: Array2<f64>,
    level_names: Vec<Option<Vec<String>>>,
    measurement: Array1<f64>,
    measurement_name: String,
}

/// Deserialized fields, checked by [`ExperimentTable::shape_error`] before use.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawExperimentTable {
    factors: Vec<String>,
    cumulative: CumulativeLevels,
    levels: Array2<u32>,
    deviations: Array2<f64>,
    effects: Array2<f64>,
    level_names: Vec<Option<Vec<String>>>,
    measurement: Array1<f64>,
    measurement_name: String,
}

#[cfg(feature = "serde")]
impl TryFrom<RawExperimentTable> for ExperimentTable {
    type Error = Error;

    fn try_from(raw: RawExperimentTable) -> std::result::Result<Self, Self::Error> {
        let table = Self {
            factors: raw.factors,
            cumulative: raw.cumulative,
            levels: raw.levels,
            deviations: raw.deviations,
            effects: raw.effects,
            level_names: raw.level_names,
            measurement: raw.measurement,
            measurement_name: raw.measurement_name,
        };
        match table.shape_error() {
            Some(message) => Err(Error::InvalidConfiguration { message }),
            None => Ok(table),
        }
    }
}

impl ExperimentTable {
    /// First inconsistency between the stored columns and the cumulative
    /// levels, if any.
    ///
    /// Every cumulative entry must be non-zero, a multiple of the one before
    /// it and a divisor of the total row count. Every column must have one
    /// entry per row and per factor.
    pub(crate) fn shape_error(&self) -> Option<String> {
        let rows = self.cumulative.total_rows();
        let width = self.factors.len();

        if self.cumulative.len() != width {
            return Some(format!(
                "{} factors but {} cumulative level entries",
                width,
                self.cumulative.len()
            ));
        }

        let mut previous = 1;
        for ((name, cum), factor) in self.cumulative.iter().zip(&self.factors) {
            if name != factor.as_str() {
                return Some(format!(
                    "cumulative entry {:?} does not match factor {:?}",
                    name, factor
                ));
            }
            if cum == 0 || cum % previous != 0 || rows % cum != 0 {
                return Some(format!(
                    "cumulative levels {} of factor {:?} do not nest in {} total rows",
                    cum, factor, rows
                ));
            }
            if u32::try_from(cum / previous).is_err() {
                return Some(format!("factor {:?} has too many levels", factor));
            }
            previous = cum;
        }

        for (column, dim) in [
            ("levels", self.levels.dim()),
            ("deviations", self.deviations.dim()),
            ("effects", self.effects.dim()),
        ] {
            if dim != (rows, width) {
                return Some(format!(
                    "{} has shape {:?}, expected {:?}",
                    column,
                    dim,
                    (rows, width)
                ));
            }
        }

        if self.measurement.len() != rows {
            return Some(format!(
                "measurement has {} rows, expected {}",
                self.measurement.len(),
                rows
            ));
        }

        if self.level_names.len() != width {
            return Some(format!(
                "{} level name columns for {} factors",
                self.level_names.len(),
                width
            ));
        }
        self.factors
            .iter()
            .zip(&self.level_names)
            .find_map(|(factor, names)| match names {
                Some(names) if names.len() != rows => Some(format!(
                    "level names of factor {:?} have {} rows, expected {}",
                    factor,
                    names.len(),
                    rows
                )),
                _ => None,
            })
    }

    /// Number of rows (experimental runs).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.levels.nrows()
    }

    /// Number of factors.
    #[must_use]
    pub fn factor_count(&self) -> usize {
        self.factors.len()
    }

    /// Factor names in order.
    #[must_use]
    pub fn factors(&self) -> &[String] {
        &self.factors
    }

    /// The cumulative levels this table was assembled from.
    #[must_use]
    pub fn cumulative_levels(&self) -> &CumulativeLevels {
        &self.cumulative
    }

    /// Level ids, shape `(rows, factors)`.
    #[must_use]
    pub fn levels(&self) -> &Array2<u32> {
        &self.levels
    }

    /// Deviations, shape `(rows, factors)`.
    #[must_use]
    pub fn deviations(&self) -> &Array2<f64> {
        &self.deviations
    }

    /// Level effects, shape `(rows, factors)`. Zero for factors without effects.
    #[must_use]
    pub fn effects(&self) -> &Array2<f64> {
        &self.effects
    }

    /// The measurement column.
    #[must_use]
    pub fn measurement(&self) -> ArrayView1<'_, f64> {
        self.measurement.view()
    }

    /// Name of the measurement column.
    #[must_use]
    pub fn measurement_name(&self) -> &str {
        &self.measurement_name
    }

    /// Rename the measurement column.
    pub fn rename_measurement(&mut self, name: impl Into<String>) {
        self.measurement_name = name.into();
    }

    /// Position of the named factor.
    #[must_use]
    pub fn factor_index(&self, factor: &str) -> Option<usize> {
        self.factors.iter().position(|f| f == factor)
    }

    /// Level id column of the factor at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[must_use]
    pub fn level_column(&self, idx: usize) -> ArrayView1<'_, u32> {
        self.levels.column(idx)
    }

    /// Deviation column of the factor at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[must_use]
    pub fn deviation_column(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.deviations.column(idx)
    }

    /// Effect column of the factor at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[must_use]
    pub fn effect_column(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.effects.column(idx)
    }

    /// Level name column of the factor at `idx`, if the factor has names.
    #[must_use]
    pub fn name_column(&self, idx: usize) -> Option<&[String]> {
        self.level_names.get(idx).and_then(|n| n.as_deref())
    }

    /// All columns in output order, paired with their names.
    #[must_use]
    pub fn columns(&self) -> Vec<(String, Column<'_>)> {
        let mut out = Vec::with_capacity(self.factors.len() * 4 + 1);
        for (j, factor) in self.factors.iter().enumerate() {
            let names = ColumnNames::for_factor(factor);
            out.push((names.level, Column::Level(self.level_column(j))));
            out.push((names.deviation, Column::Real(self.deviation_column(j))));
            if let Some(level_names) = self.name_column(j) {
                out.push((names.level_name, Column::Text(level_names)));
            }
            out.push((names.effect, Column::Real(self.effect_column(j))));
        }
        out.push((
            self.measurement_name.clone(),
            Column::Real(self.measurement.view()),
        ));
        out
    }

    /// Column names in output order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns().into_iter().map(|(name, _)| name).collect()
    }

    /// Look up a column by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if no column has that name.
    pub fn column(&self, name: &str) -> Result<Column<'_>> {
        self.columns()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| Error::UnknownColumn(name.to_owned()))
    }
}

impl fmt::Display for ExperimentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.columns();
        writeln!(
            f,
            "ExperimentTable({} rows, {} factors)",
            self.rows(),
            self.factor_count()
        )?;
        let header: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
        writeln!(f, "  {}", header.join("\t"))?;
        for row in 0..self.rows() {
            let cells: Vec<String> = columns.iter().map(|(_, c)| c.cell(row)).collect();
            writeln!(f, "  {}", cells.join("\t"))?;
        }
        Ok(())
    }
}
