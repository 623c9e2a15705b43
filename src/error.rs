#![allow(non_shorthand_field_patterns)]
#![doc = "Error handling primitives shared across the gha-tools crate."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.

use std::path::{Path, PathBuf};

use crate::parameters::ParameterKind;

/// Unified error type returned by the resolver, the GitHub client and the CLI.
///
/// Lookup failures are fatal and carry the full query so the CI log points at
/// the offending workflow. API failures wrap the transport error untouched;
/// nothing in the crate retries.
#[derive(Debug, masterror::Error)]
pub enum Error {
    /// Wraps I/O errors on parameter tables and downloaded artifacts.
    #[error("I/O failure at {path:?}: {source}")]
    Io {
        /// Location of the file being read or written.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error
    },
    /// Wraps YAML decoding errors of parameter tables.
    #[error("failed to parse parameter table: {source}")]
    Parse {
        /// Source decoding error from serde_yaml.
        source: serde_yaml::Error
    },
    /// Returned when a parameter table or CLI input violates invariants.
    #[error("invalid input: {message}")]
    Validation {
        /// Human readable message describing the validation problem.
        message: String
    },
    /// Wraps serialization errors when writing JSON output.
    #[error("failed to serialize value: {source}")]
    Serialize {
        /// Underlying serialization error.
        source: serde_json::Error
    },
    /// Returned when a key is absent from every block of the fallback chain.
    #[error(
        "parameter key '{key}' of type '{kind}' not found for workflow '{workflow}' (expanded = {expanded})"
    )]
    ParameterNotFound {
        /// Requested parameter key.
        key:      String,
        /// Block kind that was searched.
        kind:     ParameterKind,
        /// Workflow the lookup started from.
        workflow: String,
        /// Whether expanded blocks were part of the chain.
        expanded: bool
    },
    /// Returned when a device id is not present in the registry.
    #[error("unknown test device '{id}'")]
    UnknownDevice {
        /// Device identifier supplied by the caller.
        id: String
    },
    /// Returned when an operation needs a token and the client has none.
    #[error("{operation} requires a GitHub token")]
    Unauthorized {
        /// Name of the client operation.
        operation: String
    },
    /// Wraps failures reported by the GitHub API client.
    #[error("{operation} failed: {source}")]
    Github {
        /// Name of the client operation.
        operation: String,
        /// Underlying octocrab error.
        source:    octocrab::Error
    },
    /// Service errors raised by external tooling such as git.
    #[error("service error: {message}")]
    Service {
        /// Human readable message describing the service error.
        message: String
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

    /// Constructs a service error from the provided displayable value.
    pub fn service<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Service {
            message: message.into()
        }
    }

    /// Wraps an octocrab failure with the name of the operation that issued it.
    pub fn github<O>(operation: O, source: octocrab::Error) -> Self
    where
        O: Into<String>
    {
        Self::Github {
            operation: operation.into(),
            source
        }
    }

    /// Formats the error for diagnostics without the variant name.
    ///
    /// The returned string matches the [`std::fmt::Display`] implementation
    /// and is what the CLI prints before exiting with a failure status.
    pub fn to_display_string(&self) -> String {
        format!("{self}")
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Parse {
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

impl From<masterror::AppError> for Error {
    fn from(error: masterror::AppError) -> Self {
        Self::Service {
            message: error.to_string()
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location of the file that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source
    }
}
