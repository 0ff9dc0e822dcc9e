use std::error;
use std::fmt;
use std::io;
use std::result;

use ndarray::ShapeError;

/// Broad classes of failure, for callers that only care what went wrong, not where.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Range,
    SourceNotFound,
    Io,
    Engine,
}

#[derive(Debug)]
pub enum Error {
    IO(io::Error),

    /// A field name that isn't one of the dataset's data variables
    BadName(String),

    /// A field the engine couldn't produce. `level` is set when reading above the coarsest
    /// level.
    MissingField {
        field: String,
        level: Option<usize>,
        cause: Option<Box<Error>>,
    },

    /// Axis name other than `x`, `y` or `z`, or beyond the dataset's dimensionality
    BadAxis(String),

    TooManyIndices {
        max: usize,
        given: usize,
    },

    IndexOutOfBounds {
        index: isize,
        len: usize,
    },

    /// A key element that can't be applied, e.g. `NewAxis` or a zero step
    BadKey(String),

    BadLevel {
        level: i64,
        max_level: usize,
    },

    /// A glob pattern that didn't match any file
    NoSourceMatch(String),

    NoSources,

    /// A malformed snapshot document
    Format(String),

    Shape(ShapeError),

    Engine(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IO(_) => ErrorKind::Io,
            Self::BadName(_) | Self::MissingField { .. } => ErrorKind::NotFound,
            Self::BadAxis(_)
            | Self::TooManyIndices { .. }
            | Self::IndexOutOfBounds { .. }
            | Self::BadKey(_)
            | Self::Shape(_) => ErrorKind::InvalidArgument,
            Self::BadLevel { .. } => ErrorKind::Range,
            Self::NoSourceMatch(_) | Self::NoSources => ErrorKind::SourceNotFound,
            Self::Format(_) | Self::Engine(_) => ErrorKind::Engine,
        }
    }

    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
            level: None,
            cause: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> result::Result<(), fmt::Error> {
        use Error::*;

        match self {
            IO(err) => write!(fmt, "i/o error: {}", err),
            BadName(name) => write!(fmt, "field '{}' not found", name),
            MissingField {
                field,
                level: Some(level),
                ..
            } => write!(fmt, "field '{}' not available at level {}", field, level),
            MissingField {
                field,
                level: None,
                cause: Some(cause),
            } => write!(fmt, "field '{}' not found: {}", field, cause),
            MissingField { field, .. } => write!(fmt, "field '{}' not found", field),
            BadAxis(axis) => write!(fmt, "invalid dimension: {}", axis),
            TooManyIndices { max, given } => write!(
                fmt,
                "too many indices: expected at most {}, got {}",
                max, given
            ),
            IndexOutOfBounds { index, len } => write!(
                fmt,
                "index {} is out of bounds for axis with length {}",
                index, len
            ),
            BadKey(msg) => write!(fmt, "bad key: {}", msg),
            BadLevel { level, max_level } => write!(
                fmt,
                "level {} is out of range, must be between 0 and {}",
                level, max_level
            ),
            NoSourceMatch(pattern) => write!(fmt, "no files found matching pattern: {}", pattern),
            NoSources => write!(fmt, "no source files given"),
            Format(msg) => write!(fmt, "malformed snapshot: {}", msg),
            Shape(err) => write!(fmt, "shape error: {}", err),
            Engine(msg) => write!(fmt, "engine error: {}", msg),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::IO(err) => Some(err),
            Self::Shape(err) => Some(err),
            Self::MissingField {
                cause: Some(cause), ..
            } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::IO(err)
    }
}

impl From<ShapeError> for Error {
    fn from(err: ShapeError) -> Self {
        Self::Shape(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;
