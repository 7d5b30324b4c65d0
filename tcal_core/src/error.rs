//! Errors surfaced by extraction, normalization and fetching.
//!
//! None of these are recovered from inside the crate. Callers decide how to
//! present them; the web front end renders them as a message next to the form.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The structural marker (container element) is absent or empty.
    #[error("schedule table not found: no element matches `{0}`")]
    NotFound(String),

    #[error("invalid container selector `{0}`")]
    InvalidSelector(String),

    /// The table markup was rejected by the strict parse, even after normalization.
    #[error("malformed table markup: {0}")]
    MalformedInput(String),

    /// A data row does not have as many cells as the header row.
    #[error("row {row} has {found} cells, header has {expected}")]
    RowShape {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown month `{0}`")]
    UnknownMonth(String),

    #[error("invalid period `{0}`, expected \"<MONTH> <YEAR>\"")]
    InvalidPeriod(String),

    #[error("invalid day `{day}` in category `{category}`")]
    InvalidDay { category: String, day: String },

    /// The period column is missing from a record.
    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("invalid link `{0}`")]
    InvalidLink(String),

    #[error("timeout while fetching from {0}")]
    Timeout(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
