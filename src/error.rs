//! Configuration errors.
//!
//! Errors raised while talking to the scripting engine live in
//! [`crate::client::error`].

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read wb-bridge config {path}")]
    ReadError {
        /// Config file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or has unknown keys.
    #[error("malformed wb-bridge config {path}")]
    ParseError {
        /// Config file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An explicitly requested file does not exist.
    #[error("wb-bridge config not found at {path}")]
    NotFound {
        /// Requested location.
        path: PathBuf,
    },

    /// A setting has a value the client cannot work with.
    #[error("invalid {field}: {message}")]
    ValidationError {
        /// Dotted key of the offending setting, e.g. `server.port`.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// Creates a read error for `path`.
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a parse error for `path`.
    pub fn parse(path: &Path, source: serde_json::Error) -> Self {
        Self::ParseError {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a validation error for one setting.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field,
            message: message.into(),
        }
    }

    /// The setting a validation error refers to.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::ValidationError { field, .. } => Some(*field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_path() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/etc/wb/config.json"),
        };
        assert_eq!(
            error.to_string(),
            "wb-bridge config not found at /etc/wb/config.json"
        );
    }

    #[test]
    fn validation_error_names_the_field() {
        let error = ConfigError::invalid("server.port", "must be non-zero");
        assert_eq!(error.to_string(), "invalid server.port: must be non-zero");
        assert_eq!(error.field(), Some("server.port"));
    }

    #[test]
    fn parse_error_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ConfigError::parse(Path::new("config.json"), source);
        assert!(std::error::Error::source(&error).is_some());
        assert!(error.field().is_none());
    }
}
