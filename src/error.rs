use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `SetupError` and maps to other errors to
/// convert to a `SetupError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SetupError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// A missing or invalid configuration key, column, or value.
    ConfigError(String),
    /// An array or matrix whose dimensions do not match what is required.
    ShapeError {
        what: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// Input data that is individually well-formed but mutually inconsistent.
    ConsistencyError(String),
    RangeError(String),
    /// A reference to a node or date that does not exist in the setup.
    LookupError(String),
    UnsupportedMethod(String),
    ParseError(String),
}

impl SetupError {
    pub(crate) fn shape(what: impl Into<String>, expected: (usize, usize), actual: (usize, usize)) -> Self {
        SetupError::ShapeError {
            what: what.into(),
            expected,
            actual,
        }
    }
}

impl From<io::Error> for SetupError {
    fn from(error: io::Error) -> Self {
        SetupError::IoError(error)
    }
}

impl From<serde_json::Error> for SetupError {
    fn from(error: serde_json::Error) -> Self {
        SetupError::JsonError(error)
    }
}

impl From<csv::Error> for SetupError {
    fn from(error: csv::Error) -> Self {
        SetupError::CSVError(error)
    }
}

impl From<String> for SetupError {
    fn from(error: String) -> Self {
        SetupError::ConfigError(error)
    }
}

impl From<&str> for SetupError {
    fn from(error: &str) -> Self {
        SetupError::ConfigError(error.to_string())
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::IoError(e) => Some(e),
            SetupError::JsonError(e) => Some(e),
            SetupError::CSVError(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SetupError::IoError(e) => write!(f, "I/O error: {e}"),
            SetupError::JsonError(e) => write!(f, "JSON error: {e}"),
            SetupError::CSVError(e) => write!(f, "CSV error: {e}"),
            SetupError::ConfigError(msg) => write!(f, "configuration error: {msg}"),
            SetupError::ShapeError {
                what,
                expected,
                actual,
            } => write!(
                f,
                "{what} must have dimensions ({}, {}). Actual: ({}, {})",
                expected.0, expected.1, actual.0, actual.1
            ),
            SetupError::ConsistencyError(msg) => write!(f, "inconsistent input: {msg}"),
            SetupError::RangeError(msg) => write!(f, "out of range: {msg}"),
            SetupError::LookupError(msg) => write!(f, "lookup failed: {msg}"),
            SetupError::UnsupportedMethod(method) => {
                write!(f, "unknown seeding method [got: {method}]")
            }
            SetupError::ParseError(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SetupError;

    #[test]
    fn shape_error_names_both_shapes() {
        let err = SetupError::shape("filter", (10, 3), (9, 3));
        assert_eq!(
            err.to_string(),
            "filter must have dimensions (10, 3). Actual: (9, 3)"
        );
    }

    #[test]
    fn str_converts_to_config_error() {
        let err: SetupError = "missing key".into();
        assert!(matches!(err, SetupError::ConfigError(ref m) if m == "missing key"));
    }

    #[test]
    fn io_error_keeps_source() {
        use std::error::Error;
        let err: SetupError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
    }
}
