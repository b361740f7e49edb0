//! Load failures.
//!
//! A load either yields the whole dataset or one of these. Everything
//! downstream of loading is total and never errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    /// A required header is absent.
    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    /// `row` is the 1-based data row; the header line is not counted.
    #[error("row {row}, column '{column}': cannot parse timestamp '{value}'")]
    InvalidTimestamp {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}, column '{column}': expected an integer, got '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("cannot read header row: {0}")]
    MalformedHeader(#[source] csv::Error),

    #[error("row {row}: malformed record: {source}")]
    MalformedRow {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// Data row the error points at, if it is row-specific.
    pub fn row(&self) -> Option<usize> {
        match self {
            Self::InvalidTimestamp { row, .. }
            | Self::InvalidNumber { row, .. }
            | Self::MalformedRow { row, .. } => Some(*row),
            Self::MissingColumn { .. } | Self::MalformedHeader(_) | Self::Io(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_cause() {
        let err = LoadError::MissingColumn {
            column: "travel_end_ts".into(),
        };
        assert_eq!(err.to_string(), "missing required column 'travel_end_ts'");
        assert_eq!(err.row(), None);

        let err = LoadError::InvalidTimestamp {
            row: 2,
            column: "travel_end_ts".into(),
            value: "not-a-date".into(),
        };
        assert_eq!(
            err.to_string(),
            "row 2, column 'travel_end_ts': cannot parse timestamp 'not-a-date'"
        );
        assert_eq!(err.row(), Some(2));
    }
}
