//! Cumulative level planning.
//!
//! The cumulative level count of a factor is the product of the level counts
//! of every factor up to and including it. It fixes how many rows the
//! factor's own table has, and dividing the experiment size by it gives the
//! block length that factor occupies in the final table.

use std::fmt;

use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::factor::Factor;
use crate::utils::running_product;

/// Ordered mapping of factor name to cumulative level count.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CumulativeLevels {
    entries: Vec<(String, usize)>,
}

impl CumulativeLevels {
    /// Cumulative level count for the named factor.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, c)| c)
    }

    /// Cumulative level count at a factor position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<usize> {
        self.entries.get(index).map(|&(_, c)| c)
    }

    /// Total experiment row count (the last cumulative value).
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.entries.last().map_or(0, |&(_, c)| c)
    }

    /// Number of factors planned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no factors were planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, cumulative)` pairs in factor order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), *c))
    }

    /// Rows each level block of the factor at `index` spans in the full table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `index` is out of range or
    /// the cumulative count does not divide the total row count.
    pub fn block_length(&self, index: usize) -> Result<usize> {
        let (name, cumulative) = self.entries.get(index).ok_or_else(|| {
            Error::invalid_configuration(format!(
                "factor index {} out of range for {} planned factors",
                index,
                self.entries.len()
            ))
        })?;
        let total = self.total_rows();
        if *cumulative == 0 || total % cumulative != 0 {
            return Err(Error::invalid_configuration(format!(
                "cumulative levels {} of factor {:?} do not divide {} total rows",
                cumulative, name, total
            )));
        }
        Ok(total / cumulative)
    }
}

impl fmt::Display for CumulativeLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(n, c)| format!("{}={}", n, c))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Compute cumulative level counts for `factors`, in order.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if there are no factors, a factor
/// name repeats, any level count is zero, or the product overflows.
///
/// # Example
///
/// ```
/// use nested_synth::{plan, Factor};
///
/// let factors = vec![
///     Factor::new("batch-to-batch", 2, 0.01),
///     Factor::new("within batch", 3, 0.005),
///     Factor::new("lab", 2, 0.02),
/// ];
/// let cum = plan(&factors).unwrap();
/// assert_eq!(cum.get("within batch"), Some(6));
/// assert_eq!(cum.total_rows(), 12);
/// ```
pub fn plan(factors: &[Factor]) -> Result<CumulativeLevels> {
    if factors.is_empty() {
        return Err(Error::invalid_configuration(
            "at least one factor is required",
        ));
    }

    for (i, factor) in factors.iter().enumerate() {
        if factor.level_count() == 0 {
            return Err(Error::invalid_configuration(format!(
                "level_count for factor {:?} must be positive",
                factor.name()
            )));
        }
        if factors[..i].iter().any(|f| f.name() == factor.name()) {
            return Err(Error::invalid_configuration(format!(
                "factor name {:?} is used more than once",
                factor.name()
            )));
        }
    }

    let counts: Vec<u32> = factors.iter().map(Factor::level_count).collect();
    let products = running_product(&counts).ok_or_else(|| {
        Error::invalid_configuration(format!(
            "product of level counts {:?} overflows",
            counts
        ))
    })?;

    let levels = CumulativeLevels {
        entries: factors
            .iter()
            .map(|f| f.name().to_owned())
            .zip(products)
            .collect(),
    };
    debug!(%levels, "planned cumulative levels");
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors() -> Vec<Factor> {
        vec![
            Factor::new("batch-to-batch", 2, 0.01),
            Factor::new("within batch", 3, 0.005),
            Factor::new("lab", 2, 0.02),
        ]
    }

    #[test]
    fn test_plan() {
        let cum = plan(&factors()).unwrap();
        let pairs: Vec<_> = cum.iter().collect();
        assert_eq!(
            pairs,
            vec![("batch-to-batch", 2), ("within batch", 6), ("lab", 12)]
        );
        assert_eq!(cum.total_rows(), 12);
        assert_eq!(cum.len(), 3);
        assert_eq!(cum.at(1), Some(6));
        assert_eq!(cum.get("missing"), None);
    }

    #[test]
    fn test_block_length() {
        let cum = plan(&factors()).unwrap();
        assert_eq!(cum.block_length(0).unwrap(), 6);
        assert_eq!(cum.block_length(1).unwrap(), 2);
        assert_eq!(cum.block_length(2).unwrap(), 1);
        assert!(cum.block_length(3).is_err());
    }

    #[test]
    fn test_monotone() {
        let fs = vec![
            Factor::new("a", 1, 0.1),
            Factor::new("b", 4, 0.1),
            Factor::new("c", 1, 0.1),
            Factor::new("d", 5, 0.1),
        ];
        let cum = plan(&fs).unwrap();
        let values: Vec<usize> = cum.iter().map(|(_, c)| c).collect();
        assert_eq!(values, vec![1, 4, 4, 20]);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_plan_rejects_zero_levels() {
        let fs = vec![Factor::new("a", 2, 0.1), Factor::new("b", 0, 0.1)];
        let err = plan(&fs).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_plan_rejects_empty_and_duplicates() {
        assert!(plan(&[]).is_err());

        let fs = vec![Factor::new("a", 2, 0.1), Factor::new("a", 3, 0.1)];
        assert!(plan(&fs).unwrap_err().to_string().contains("more than once"));
    }

    #[test]
    fn test_plan_rejects_overflow() {
        let fs: Vec<Factor> = (0..8)
            .map(|i| Factor::new(format!("f{i}"), u32::MAX, 0.1))
            .collect();
        assert!(plan(&fs).unwrap_err().to_string().contains("overflows"));
    }

    #[test]
    fn test_display() {
        let cum = plan(&factors()).unwrap();
        assert_eq!(
            cum.to_string(),
            "{batch-to-batch=2, within batch=6, lab=12}"
        );
    }
}
