//! Error types for the nested-synth library.
//!
//! All failures are caller configuration mistakes surfaced synchronously:
//! malformed factor definitions, an empty seed pool, or a lookup of a
//! column that the table does not carry.

use thiserror::Error;

/// The main error type for the nested-synth library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ============ Configuration Errors ============
    /// Factor definitions or experiment parameters are malformed.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of what is invalid.
        message: String,
    },

    // ============ Sampling Errors ============
    /// A draw was requested from a seed pool with no elements.
    #[error("seed pool is empty, at least one element is required to draw")]
    EmptySeedPool,

    // ============ Table Errors ============
    /// The experiment table has no column with this name.
    #[error("no column named {0:?} in experiment table")]
    UnknownColumn(String),
}

/// A specialized `Result` type for nested-synth operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Create a new `InvalidConfiguration` error.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }
}
