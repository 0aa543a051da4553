//! # nested-synth
//!
//! Synthetic measurement data for nested random-effects experiments.
//!
//! ## Overview
//!
//! A nested experiment has several sources of random variation stacked
//! inside each other: batches, positions within a batch, labs measuring each
//! sample. This library builds a table of simulated measurements with a known
//! generative structure so that variance-component estimators and similar
//! methods can be checked against it.
//!
//! Each factor contributes:
//! - a random deviation per level block, sampled from a shared standard-normal
//!   seed pool and scaled by a fraction of the grand mean
//! - optionally, a name for each level
//! - optionally, a fixed effect for each level (a fraction of the grand mean)
//!
//! The measurement of a row is the grand mean plus every factor's deviation
//! and effect for that row, rounded to the requested digits.
//!
//! ## Quick Start
//!
//! ```rust
//! use nested_synth::{ExperimentBuilder, Factor};
//!
//! let experiment = ExperimentBuilder::new()
//!     .grand_mean(1.10)
//!     .factor(
//!         Factor::new("batch-to-batch", 2, 0.01)
//!             .with_level_names(["Batch A", "Batch B"])
//!             .with_level_effects([-0.08, 0.08]),
//!     )
//!     .factor(
//!         Factor::new("within batch", 3, 0.005)
//!             .with_level_names(["Top", "Middle", "Bottom"]),
//!     )
//!     .factor(Factor::new("lab", 2, 0.02))
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let table = experiment.run().unwrap();
//! assert_eq!(table.rows(), 12);              // 2 * 3 * 2
//! assert_eq!(table.column_names()[0], "level_batch-to-batch");
//! ```
//!
//! ## Block layout
//!
//! With cumulative level counts `c_j` (the product of level counts up to
//! factor `j`) and `N` total rows, factor `j` is sampled `c_j` times and each
//! sample covers a block of `N / c_j` consecutive rows. For the example above
//! the batch factor spans blocks of 6, positions blocks of 2, and labs single
//! rows.
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization of definitions and tables
//! - `parallel`: Sample factor tables in parallel using rayon
//! - `python`: Enable Python bindings via PyO3

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod config;
pub mod error;
pub mod factor;
pub mod plan;
pub mod sampler;
pub mod table;
pub mod utils;

#[cfg(feature = "parallel")]
pub mod parallel;
#[cfg(feature = "python")]
pub mod python;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builder::{Experiment, ExperimentBuilder};
    pub use crate::config::ExperimentConfig;
    pub use crate::error::{Error, Result};
    pub use crate::factor::{Factor, FactorTable, DEVIATION_DIGITS};
    pub use crate::plan::{plan, CumulativeLevels};
    pub use crate::sampler::SeedSampler;
    pub use crate::table::{
        assemble, combine, verify_table, Column, ColumnNames, ExperimentTable,
        VerificationResult,
    };

    #[cfg(feature = "parallel")]
    pub use crate::parallel::{par_create_experiment, par_factor_tables, par_run};
}

// Re-export commonly used items at crate root
pub use builder::{Experiment, ExperimentBuilder};
pub use config::ExperimentConfig;
pub use error::{Error, Result};
pub use factor::{Factor, FactorTable};
pub use plan::{plan, CumulativeLevels};
pub use sampler::SeedSampler;
pub use table::ExperimentTable;
