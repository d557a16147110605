//! Error type for the coordinate and chemical-shift readers.
//!
//! Reader failures are reported with the textual format, the source path when one is known,
//! and the line that could not be interpreted, so the driver can print a single actionable
//! message.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading mmCIF or NMR-STAR input.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper around operating-system level I/O failures.
    #[error(
        "I/O error for {path_desc}: {source}",
        path_desc = PathDisplay(path)
    )]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// A line could not be parsed into the expected record.
    #[error(
        "failed to parse {format} {path_desc}: {details} (line {line_number})",
        path_desc = PathDisplay(path)
    )]
    Parse {
        /// Name of the textual format (`"mmCIF"` or `"NMR-STAR"`).
        format: &'static str,
        path: Option<PathBuf>,
        /// One-based line number where parsing failed.
        line_number: usize,
        details: String,
    },

    /// The file parsed but its tables disagree with each other.
    #[error(
        "inconsistent data in {format} {path_desc}: {details}",
        path_desc = PathDisplay(path)
    )]
    InconsistentData {
        format: &'static str,
        path: Option<PathBuf>,
        details: String,
    },
}

impl Error {
    /// Constructs an [`Error::Io`] variant from a standard I/O error.
    ///
    /// # Arguments
    ///
    /// * `source` - The original `std::io::Error`.
    /// * `path` - Optional file path associated with the operation.
    pub fn from_io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { path, source }
    }

    /// Builds an [`Error::Parse`] variant with consistent messaging.
    ///
    /// # Arguments
    ///
    /// * `format` - Name of the textual format being parsed.
    /// * `path` - Optional path pointing to the input file.
    /// * `line_number` - Line where the failure occurred (1-indexed).
    /// * `details` - Additional context about the parsing problem.
    pub fn parse(
        format: &'static str,
        path: Option<PathBuf>,
        line_number: usize,
        details: impl Into<String>,
    ) -> Self {
        Self::Parse {
            format,
            path,
            line_number,
            details: details.into(),
        }
    }

    pub fn inconsistent_data(
        format: &'static str,
        path: Option<PathBuf>,
        details: impl Into<String>,
    ) -> Self {
        Self::InconsistentData {
            format,
            path,
            details: details.into(),
        }
    }

    /// Attaches a file path to an error raised while reading a stream.
    pub fn with_path(self, new_path: PathBuf) -> Self {
        match self {
            Self::Io { source, .. } => Self::Io {
                path: Some(new_path),
                source,
            },
            Self::Parse {
                format,
                line_number,
                details,
                ..
            } => Self::Parse {
                format,
                path: Some(new_path),
                line_number,
                details,
            },
            Self::InconsistentData {
                format, details, ..
            } => Self::InconsistentData {
                format,
                path: Some(new_path),
                details,
            },
        }
    }
}

/// Prints `file '<path>'` when a path is present and `stream source` otherwise.
struct PathDisplay<'a>(&'a Option<PathBuf>);

impl<'a> fmt::Display for PathDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(p) => write!(f, "file '{}'", p.display()),
            None => write!(f, "stream source"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_format_line_and_path() {
        let err = Error::parse("mmCIF", None, 12, "loop row is truncated")
            .with_path(PathBuf::from("model.cif"));
        assert_eq!(
            err.to_string(),
            "failed to parse mmCIF file 'model.cif': loop row is truncated (line 12)"
        );
    }

    #[test]
    fn stream_errors_name_the_stream() {
        let err = Error::inconsistent_data("NMR-STAR", None, "Val column missing");
        assert_eq!(
            err.to_string(),
            "inconsistent data in NMR-STAR stream source: Val column missing"
        );
    }
}
