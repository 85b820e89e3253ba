//! Domain errors raised by the row filter and the rate engine.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcsError {
    /// A raw record is too short to project onto the filtered columns.
    #[error("malformed record: {fields} fields, at least {required} required")]
    MalformedRecord { fields: usize, required: usize },

    /// Same as `MalformedRecord`, with the source and row that produced it.
    #[error("malformed record in {source_name} at row {row}: {fields} fields, at least {required} required")]
    MalformedRow {
        source_name: String,
        row: u64,
        fields: usize,
        required: usize,
    },

    /// A subset predicate needs a membership list that was never loaded.
    #[error("membership list '{0}' was not configured")]
    MissingMembership(&'static str),
}
