//! Plaintext wire protocol spoken by the workbench scripting engine.
//!
//! Every exchange is a single connection:
//!
//! ```text
//! client                                   engine
//!   │── connect ───────────────────────────▶│
//!   │── <statement bytes> ─────────────────▶│
//!   │── <EOF> ─────────────────────────────▶│
//!   │◀─────────────────────── <reply bytes> ─│
//!   │── close ─────────────────────────────▶│
//! ```
//!
//! A reply of exactly `<OK>` means the statement ran. Anything else is the
//! engine's description of what went wrong.

use std::fmt;

/// Marker terminating every command sent to the engine.
pub const END_MARKER: &str = "<EOF>";

/// Reply sent by the engine when a statement ran successfully.
pub const OK_TOKEN: &str = "<OK>";

/// Command used by the health check to see if the engine is up.
pub const PROBE_COMMAND: &str = "GetProjectUnitSystem";

/// Command asking the workbench to shut down.
pub const EXIT_COMMAND: &str = "Exit\n";

/// Prefix of a variable query.
pub const QUERY_PREFIX: &str = "Query,";

/// Maximum number of reply bytes read per exchange.
pub const REPLY_BUFFER_SIZE: usize = 4096;

/// Classified reply from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The engine answered with [`OK_TOKEN`].
    Ok,
    /// The engine answered with anything else.
    Failed(String),
}

impl Reply {
    /// Classifies a raw reply. Only an exact [`OK_TOKEN`] is success.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        if raw == OK_TOKEN {
            Self::Ok
        } else {
            Self::Failed(raw.to_string())
        }
    }

    /// Returns `true` for [`Reply::Ok`].
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns the raw text the engine sent.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => OK_TOKEN,
            Self::Failed(raw) => raw,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the query command for a remote variable.
#[must_use]
pub fn query_command(name: &str) -> String {
    format!("{QUERY_PREFIX}{name}")
}

/// Extracts a variable value from a query reply.
///
/// The engine answers `name=value`. Returns `None` when the reply does not
/// mention the variable, which is how the engine reports an unknown name.
#[must_use]
pub fn parse_query_reply(name: &str, reply: &str) -> Option<String> {
    let needle = format!("{name}=");
    if reply.contains(&needle) {
        Some(reply.replace(&needle, ""))
    } else {
        None
    }
}

/// Replaces backslashes with forward slashes.
///
/// The engine accepts forward slashes on every platform, which keeps paths
/// safe inside double-quoted literals.
#[must_use]
pub fn forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Quotes a value as a double-quoted script literal.
#[must_use]
pub fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quotes a path as a single-quoted literal with doubled backslashes.
///
/// Used as the fallback form when the engine rejects a forward-slash path.
#[must_use]
pub fn single_quoted_path(path: &str) -> String {
    format!("'{}'", path.replace('\\', "\\\\"))
}
