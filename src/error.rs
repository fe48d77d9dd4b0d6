use std::{error, fmt, io, result};

/// The specific type of an error.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Wrap a [std::io::Error] raised by the underlying source.
    Io(io::Error),

    /// Indicate that a record does not fit into the line buffer, even after
    /// sliding it to the front. The reader must be rebuilt with a larger
    /// [`buffer_capacity`](crate::ReaderBuilder::buffer_capacity).
    BufferTooSmall {
        /// Configured capacity, in code units
        capacity: usize,
        /// Index of the offending record (1-based)
        record: u64,
    },

    /// Indicate that a record has more fields than the configured
    /// [`max_field_count`](crate::ReaderBuilder::max_field_count).
    TooManyFields {
        /// Configured maximum number of fields
        max: usize,
        /// Index of the offending record (1-based)
        record: u64,
    },

    /// Indicate that a field was requested with an index greater or equal to
    /// the current field count.
    FieldOutOfRange {
        /// Requested field index
        index: usize,
        /// Number of fields of the current record
        count: usize,
    },

    /// Indicate that a field could not be decoded as UTF-8.
    InvalidUtf8 {
        /// Field index
        field: usize,
    },

    /// Indicate that a field could not be decoded as UTF-16.
    InvalidUtf16 {
        /// Field index
        field: usize,
    },

    /// Indicate that the slice given to
    /// [`write_to_span`](crate::Reader::write_to_span) is too short.
    DestinationTooSmall {
        /// Number of code units required in the worst case
        needed: usize,
        /// Length of the provided slice
        available: usize,
    },

    /// Indicate that a field could not be parsed into the requested type.
    Parse {
        /// Field index
        field: usize,
        /// Message of the underlying parsing error
        message: String,
    },

    /// Indicate that a [`ReaderBuilder`](crate::ReaderBuilder) was given
    /// nonsensical settings.
    InvalidConfig(&'static str),
}

/// An error occurring when reading CSV data.
#[derive(Debug)]
pub struct Error(ErrorKind);

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self(kind)
    }

    /// Return whether the wrapped error is a [`std::io::Error`].
    pub fn is_io_error(&self) -> bool {
        matches!(self.0, ErrorKind::Io(_))
    }

    /// Return whether the error is fatal for the reader that raised it, i.e.
    /// whether the reader must be rebuilt with a different configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.0,
            ErrorKind::BufferTooSmall { .. }
                | ErrorKind::TooManyFields { .. }
                | ErrorKind::InvalidConfig(_)
        )
    }

    /// Return a reference to the underlying [`ErrorKind`].
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwraps the error into its underlying [`ErrorKind`].
    pub fn into_kind(self) -> ErrorKind {
        self.0
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self(ErrorKind::Io(err))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error(ErrorKind::Io(inner)) => inner,
            err => Self::new(io::ErrorKind::Other, err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.0 {
            ErrorKind::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::BufferTooSmall { capacity, record } => write!(
                f,
                "CSV error: record {} does not fit into a buffer of {} units, use a larger buffer capacity",
                record, capacity
            ),
            ErrorKind::TooManyFields { max, record } => write!(
                f,
                "CSV error: record {} has more than {} fields, use a larger max field count",
                record, max
            ),
            ErrorKind::FieldOutOfRange { index, count } => write!(
                f,
                "field index {} is out of range (record has {} fields)",
                index, count
            ),
            ErrorKind::InvalidUtf8 { field } => {
                write!(f, "field {} is not valid UTF-8", field)
            }
            ErrorKind::InvalidUtf16 { field } => {
                write!(f, "field {} is not valid UTF-16", field)
            }
            ErrorKind::DestinationTooSmall { needed, available } => write!(
                f,
                "destination holds {} units but up to {} may be written",
                available, needed
            ),
            ErrorKind::Parse { field, ref message } => {
                write!(f, "could not parse field {}: {}", field, message)
            }
            ErrorKind::InvalidConfig(msg) => write!(f, "invalid reader configuration: {}", msg),
        }
    }
}

/// A type alias for `Result<T, span_csv::Error>`.
pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err = Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "odd byte"));
        assert!(err.is_io_error());
        assert!(!err.is_config_error());

        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);

        let err = Error::new(ErrorKind::BufferTooSmall {
            capacity: 16,
            record: 3,
        });
        assert!(err.is_config_error());
        assert_eq!(
            err.to_string(),
            "CSV error: record 3 does not fit into a buffer of 16 units, use a larger buffer capacity"
        );

        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_display_out_of_range() {
        let err = Error::new(ErrorKind::FieldOutOfRange { index: 3, count: 3 });
        assert_eq!(
            err.to_string(),
            "field index 3 is out of range (record has 3 fields)"
        );
        assert!(matches!(
            err.into_kind(),
            ErrorKind::FieldOutOfRange { index: 3, count: 3 }
        ));
    }
}
