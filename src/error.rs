#![allow(non_shorthand_field_patterns)]
#![doc = "Error handling primitives shared across the scaffold generator."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.
//!
//! Only whole-run failures are represented here. Panels and variables that
//! cannot be translated are never errors: they degrade to raw fallbacks.

use std::path::{Path, PathBuf};

/// Unified error type returned by the loader, the writer and the CLI.
#[derive(Debug, masterror::Error)]
pub enum Error {
    /// Wraps I/O errors that occur while reading the dashboard export.
    #[error("failed to read dashboard from {path:?}: {source}")]
    Io {
        /// Location of the dashboard export.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error
    },
    /// Wraps JSON decoding errors of the dashboard export.
    #[error("failed to parse dashboard {path:?}: {source}")]
    Parse {
        /// Location of the dashboard export.
        path:   PathBuf,
        /// Source decoding error from serde_json.
        source: serde_json::Error
    },
    /// Wraps I/O errors that occur while reading the generator configuration.
    #[error("failed to read configuration from {path:?}: {source}")]
    ConfigIo {
        /// Location of the configuration file.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error
    },
    /// Wraps YAML decoding errors of the generator configuration.
    #[error("failed to parse generator configuration: {source}")]
    Config {
        /// Source decoding error from serde_yaml.
        source: serde_yaml::Error
    },
    /// Returned when inputs violate invariants.
    #[error("invalid input: {message}")]
    Validation {
        /// Human readable message describing the validation problem.
        message: String
    },
    /// Wraps I/O errors that occur while writing scaffold files.
    #[error("failed to write scaffold file at {path:?}: {source}")]
    Write {
        /// Location of the file or directory being produced.
        path:   PathBuf,
        /// Underlying I/O error reported by the operating system.
        source: std::io::Error
    },
    /// Wraps serialization errors when encoding raw side-car files.
    #[error("failed to serialize scaffold data: {source}")]
    Serialize {
        /// Underlying serialization error.
        source: serde_json::Error
    }
}

impl Error {
    /// Constructs a validation error from the provided displayable value.
    ///
    /// # Parameters
    ///
    /// * `message` - Human-readable description of the validation failure.
    pub fn validation<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Validation {
            message: message.into()
        }
    }

    /// Formats the error for diagnostics without the variant name.
    ///
    /// The returned string matches the [`std::fmt::Display`] implementation.
    pub fn to_display_string(&self) -> String {
        format!("{self}")
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Config {
            source
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialize {
            source
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
pub fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source
    }
}

/// Creates an [`Error::ConfigIo`] variant capturing the failing path and
/// source.
pub fn config_io_error(path: &Path, source: std::io::Error) -> Error {
    Error::ConfigIo {
        path: path.to_path_buf(),
        source
    }
}

/// Creates an [`Error::Parse`] variant capturing the failing path and source.
pub fn parse_error(path: &Path, source: serde_json::Error) -> Error {
    Error::Parse {
        path: path.to_path_buf(),
        source
    }
}

/// Creates an [`Error::Write`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location of the scaffold artifact that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn write_error(path: &Path, source: std::io::Error) -> Error {
    Error::Write {
        path: path.to_path_buf(),
        source
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn validation_constructor_populates_message() {
        let error = Error::validation("something went wrong");
        match error {
            Error::Validation {
                ref message
            } => {
                assert_eq!(message, "something went wrong");
            }
            other => panic!("expected validation error, got {other:?}")
        }
    }

    #[test]
    fn to_display_string_matches_display() {
        let error = Error::validation("display me");
        assert_eq!(error.to_string(), error.to_display_string());
        assert_eq!(error.to_string(), "invalid input: display me");
    }

    #[test]
    fn io_error_helper_wraps_path_and_source() {
        let path = std::path::Path::new("/tmp/dashboard.json");
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error = super::io_error(path, io_error);

        match error {
            Error::Io {
                path: ref stored_path,
                ref source
            } => {
                assert_eq!(stored_path, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected io error, got {other:?}")
        }
    }

    #[test]
    fn config_io_error_names_the_configuration() {
        let path = std::path::Path::new("/etc/scaffold.yaml");
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error = super::config_io_error(path, source);

        assert!(matches!(error, Error::ConfigIo { ref path, .. } if path.ends_with("scaffold.yaml")));
        let message = error.to_display_string();
        assert!(message.starts_with("failed to read configuration from"));
        assert!(!message.contains("dashboard"));
    }

    #[test]
    fn parse_error_helper_keeps_path() {
        let path = std::path::Path::new("/tmp/broken.json");
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = super::parse_error(path, source);

        assert!(matches!(error, Error::Parse { ref path, .. } if path.ends_with("broken.json")));
        assert!(error.to_string().contains("failed to parse dashboard"));
    }

    #[test]
    fn serde_yaml_conversion_maps_to_config_variant() {
        let error = serde_yaml::from_str::<usize>("not-a-number").unwrap_err();
        let mapped: Error = error.into();
        assert!(matches!(mapped, Error::Config { .. }));
    }

    #[test]
    fn serde_json_conversion_maps_to_serialize_variant() {
        let invalid = serde_json::from_str::<serde_json::Value>("not-json").unwrap_err();
        let mapped: Error = invalid.into();
        assert!(matches!(mapped, Error::Serialize { .. }));
    }

    #[test]
    fn write_error_helper_wraps_path_and_source() {
        let path = std::path::Path::new("/tmp/out/lib");
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = super::write_error(path, io_error);

        match error {
            Error::Write {
                path: ref stored_path,
                ref source
            } => {
                assert_eq!(stored_path, path);
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected write error, got {other:?}")
        }
    }
}
