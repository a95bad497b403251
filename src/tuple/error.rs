//! Error types for the tuple module.

use thiserror::Error;

/// Errors from schema lookups and tuple comparison.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TupleError {
    /// Field index outside `[0, num_fields)`.
    #[error("field index {index} out of range for {num_fields} fields")]
    FieldIndex {
        /// Requested index.
        index: usize,
        /// Number of fields in the descriptor.
        num_fields: usize,
    },
    /// No field with the given name.
    #[error("no field named {0:?}")]
    NoSuchField(String),
    /// A descriptor must have at least one field.
    #[error("tuple descriptor must have at least one field")]
    Empty,
    /// Type and name lists of different length.
    #[error("{types} types but {names} names")]
    LengthMismatch {
        /// Number of types.
        types: usize,
        /// Number of names.
        names: usize,
    },
    /// Tuple compared before it was assigned a record id.
    #[error("tuple has no record id")]
    MissingRecordId,
}
