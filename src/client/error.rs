//! Error types for scripting-engine operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for scripting-engine operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while talking to, or launching, the workbench.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Could not open a connection to the scripting engine.
    #[error("Failed to connect to {address}")]
    Connect {
        /// `host:port` that was dialled.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading or writing on an open connection failed.
    #[error("I/O error talking to {address}")]
    Io {
        /// `host:port` of the engine.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The engine did not answer in time.
    #[error("Timed out after {elapsed_ms} ms waiting for {address}")]
    Timeout {
        /// `host:port` of the engine.
        address: String,
        /// How long the call waited.
        elapsed_ms: u128,
    },

    /// The engine answered with something other than the success token.
    #[error("Transmission failed, server replied: {reply}")]
    TransmissionFailed {
        /// Raw reply from the engine.
        reply: String,
    },

    /// A script file could not be read.
    #[error("Failed to read script file: {path}")]
    ScriptRead {
        /// Path to the script.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A script file could not be written.
    #[error("Failed to write script file: {path}")]
    ScriptWrite {
        /// Path to the script.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// No workbench installation could be located.
    #[error("Workbench installation not found: {message}")]
    InstallNotFound {
        /// What was searched for.
        message: String,
    },

    /// Version string is not a recognised release.
    #[error("Invalid workbench version: {version}")]
    InvalidVersion {
        /// Version string as given.
        version: String,
    },

    /// The workbench executable could not be spawned.
    #[error("Failed to launch {executable}")]
    Launch {
        /// Path to the executable.
        executable: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The workbench started but never answered the health probe.
    #[error("Failed to launch workbench in server mode on {address}")]
    LaunchFailed {
        /// `host:port` that was probed.
        address: String,
    },

    /// A design project cannot be added to the workbench.
    #[error("Design project {path} {reason}")]
    DesignProject {
        /// Design project file.
        path: PathBuf,
        /// Why it cannot be used.
        reason: &'static str,
    },

    /// A port range was empty or reversed.
    #[error("Invalid port range {start}..={stop}: stop must be larger than start")]
    InvalidPortRange {
        /// First port of the range.
        start: u16,
        /// Last port of the range.
        stop: u16,
    },

    /// Reading or writing a CSV file failed.
    #[error("CSV error in {path}")]
    Csv {
        /// Path to the CSV file.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },
}

impl BridgeError {
    /// Creates a connect error.
    pub fn connect(address: impl Into<String>, source: io::Error) -> Self {
        Self::Connect {
            address: address.into(),
            source,
        }
    }

    /// Creates an I/O error.
    pub fn io(address: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            address: address.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(address: impl Into<String>, elapsed_ms: u128) -> Self {
        Self::Timeout {
            address: address.into(),
            elapsed_ms,
        }
    }

    /// Creates a transmission failure carrying the raw reply.
    pub fn transmission_failed(reply: impl Into<String>) -> Self {
        Self::TransmissionFailed {
            reply: reply.into(),
        }
    }

    /// Creates a script read error.
    pub fn script_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ScriptRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a script write error.
    pub fn script_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ScriptWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates an installation-not-found error.
    pub fn install_not_found(message: impl Into<String>) -> Self {
        Self::InstallNotFound {
            message: message.into(),
        }
    }

    /// Creates a design project error.
    pub fn design_project(path: impl Into<PathBuf>, reason: &'static str) -> Self {
        Self::DesignProject {
            path: path.into(),
            reason,
        }
    }

    /// Creates a CSV error.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the error happened before a connection was made.
    #[must_use]
    pub const fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}
