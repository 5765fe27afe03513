//! Error types for the htmodel-estimate crate.

use std::backtrace::Backtrace;
use std::fmt;

use htmodel_schemas::LengthMismatch;

/// Error type for estimation and export.
///
/// Every failure is fatal for the invocation that raised it; no partial
/// results are produced. Uses the canonical struct pattern with backtrace
/// capture and `is_xxx()` helper methods.
#[derive(Debug)]
pub struct EstimateError {
    kind: EstimateErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use `is_xxx()` methods.
#[derive(Debug)]
pub(crate) enum EstimateErrorKind {
    /// A counter or run column the computation needs is absent.
    MissingColumn { column: String },
    /// Two series combined in one step have different lengths.
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    /// The run window selects an interval past the end of the data.
    WindowOutOfRange { interval: usize, intervals: usize },
    /// Failed to deserialize input JSON.
    Deserialization(serde_json::Error),
    /// Failed to serialize output JSON.
    Serialization(serde_json::Error),
    /// I/O error when reading input or writing the report.
    Io(std::io::Error),
}

impl EstimateError {
    /// Creates an error from an error kind, capturing a backtrace.
    pub(crate) fn new(kind: EstimateErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn missing_column(column: impl Into<String>) -> Self {
        Self::new(EstimateErrorKind::MissingColumn {
            column: column.into(),
        })
    }

    pub(crate) fn length_mismatch(
        column: impl Into<String>,
        mismatch: LengthMismatch,
    ) -> Self {
        Self::new(EstimateErrorKind::LengthMismatch {
            column: column.into(),
            expected: mismatch.expected,
            found: mismatch.found,
        })
    }

    /// Returns true if a required column was missing.
    pub fn is_missing_column(&self) -> bool {
        matches!(self.kind, EstimateErrorKind::MissingColumn { .. })
    }

    /// Returns true if series lengths did not line up.
    pub fn is_length_mismatch(&self) -> bool {
        matches!(self.kind, EstimateErrorKind::LengthMismatch { .. })
    }

    /// Returns true if the run window reached past the data.
    pub fn is_window_out_of_range(&self) -> bool {
        matches!(self.kind, EstimateErrorKind::WindowOutOfRange { .. })
    }

    /// Returns true if this error is due to deserialization failure.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, EstimateErrorKind::Deserialization(_))
    }

    /// Returns true if this error is due to serialization failure.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, EstimateErrorKind::Serialization(_))
    }

    /// Returns true if this error is due to I/O failure.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, EstimateErrorKind::Io(_))
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for EstimateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimateErrorKind::MissingColumn { column } => {
                write!(f, "missing column `{column}`")
            }
            EstimateErrorKind::LengthMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "column `{column}` has {found} samples, expected {expected}"
            ),
            EstimateErrorKind::WindowOutOfRange {
                interval,
                intervals,
            } => write!(
                f,
                "run window selects interval {interval} but the dataset has \
                 {intervals} intervals"
            ),
            EstimateErrorKind::Deserialization(err) => {
                write!(f, "failed to deserialize input: {err}")
            }
            EstimateErrorKind::Serialization(err) => {
                write!(f, "failed to serialize output: {err}")
            }
            EstimateErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl fmt::Display for EstimateError {
    /// Formats the error with a summary and captured backtrace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;

        // Empty unless RUST_BACKTRACE is set.
        write!(f, "{}", self.backtrace)
    }
}

impl std::error::Error for EstimateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            EstimateErrorKind::Deserialization(err)
            | EstimateErrorKind::Serialization(err) => Some(err),
            EstimateErrorKind::Io(err) => Some(err),
            EstimateErrorKind::MissingColumn { .. }
            | EstimateErrorKind::LengthMismatch { .. }
            | EstimateErrorKind::WindowOutOfRange { .. } => None,
        }
    }
}

impl From<std::io::Error> for EstimateError {
    fn from(err: std::io::Error) -> Self {
        Self::new(EstimateErrorKind::Io(err))
    }
}
