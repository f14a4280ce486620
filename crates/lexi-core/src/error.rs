//! The unified error type for the lexi workspace.

use thiserror::Error;

/// Errors surfaced by the concept-embedding learner.
///
/// Configuration errors are fatal and surfaced before any training step
/// runs. [`LexiError::ConsistencyViolation`] indicates the embedding-table
/// restore invariant has already been broken and is never recoverable.
#[derive(Debug, Error)]
pub enum LexiError {
    /// Invalid or unusable configuration: missing files, malformed word
    /// lists, unrecognized denoiser parameterizations, bad sizes.
    #[error("configuration error: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
    },

    /// A tensor or backend operation failed unexpectedly.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },

    /// A row index does not exist in the embedding table.
    #[error("row index {index} out of range (table has {rows} rows)")]
    RowOutOfRange {
        /// The offending row index.
        index: u32,
        /// Number of rows in the table.
        rows: usize,
    },

    /// A vector's length does not match the expected dimensionality.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        got: usize,
    },

    /// A non-placeholder embedding row differs from the frozen reference
    /// snapshot. This means gradient leakage escaped a step boundary;
    /// a programming-logic error, not a runtime condition.
    #[error("embedding table row {row} differs from the reference snapshot")]
    ConsistencyViolation {
        /// First row found to differ.
        row: u32,
    },

    /// Writing or serializing a checkpoint failed.
    #[error("checkpoint error: {message}")]
    Checkpoint {
        /// Description of the failure.
        message: String,
    },
}
