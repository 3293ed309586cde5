//! Rendering values and calls as statements for the remote interpreter.
//!
//! The scripting engine evaluates Python-flavoured source text, so every
//! argument ends up as a literal: strings double-quoted, booleans as
//! `True`/`False`, lists in brackets. The editor's nested argument arrays
//! (`["NAME:AllTabs", [...]]`) are plain [`ScriptArg::List`] values.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;

use crate::client::error::{BridgeError, BridgeResult};
use crate::client::protocol::quoted;

/// A literal value in a script statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    /// Double-quoted string.
    Str(String),
    /// Integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// `True` or `False`.
    Bool(bool),
    /// `None`.
    None,
    /// Source text inserted verbatim (a variable name, an expression).
    Raw(String),
    /// Bracketed list.
    List(Vec<ScriptArg>),
    /// Braced dictionary, entries in the given order.
    Dict(Vec<(ScriptArg, ScriptArg)>),
}

impl ScriptArg {
    /// Shorthand for [`ScriptArg::Raw`].
    #[must_use]
    pub fn raw(source: impl Into<String>) -> Self {
        Self::Raw(source.into())
    }

    /// Shorthand for a list of strings.
    #[must_use]
    pub fn str_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Str(s.into())).collect())
    }

    /// Returns `true` for [`ScriptArg::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for ScriptArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(&quoted(s)),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::None => f.write_str("None"),
            Self::Raw(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Dict(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for ScriptArg {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ScriptArg {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for ScriptArg {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for ScriptArg {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for ScriptArg {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for ScriptArg {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for ScriptArg {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for ScriptArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl From<Vec<Self>> for ScriptArg {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

/// A method call on a remote object, `target.method(args, key=value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCall {
    target: String,
    method: String,
    args: Vec<ScriptArg>,
    kwargs: IndexMap<String, ScriptArg>,
}

impl ScriptCall {
    /// Starts a call with no arguments.
    #[must_use]
    pub fn new(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            args: Vec::new(),
            kwargs: IndexMap::new(),
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<ScriptArg>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Sets a keyword argument. `None` values are left out when rendered.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<ScriptArg>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Orders keyword arguments by name, uppercase before lowercase.
    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.kwargs.sort_keys();
        self
    }

    /// Name of the called method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for ScriptCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.target.is_empty() {
            write!(f, "{}(", self.method)?;
        } else {
            write!(f, "{}.{}(", self.target, self.method)?;
        }

        let positional = self.args.iter().map(ToString::to_string);
        let keyword = self
            .kwargs
            .iter()
            .filter(|(_, v)| !v.is_none())
            .map(|(k, v)| format!("{k}={v}"));
        let rendered: Vec<String> = positional.chain(keyword).collect();

        write!(f, "{})", rendered.join(","))
    }
}

/// Accumulates statements into a script file.
#[derive(Debug, Clone, Default)]
pub struct ScriptBuilder {
    lines: Vec<String>,
}

impl ScriptBuilder {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw statement.
    pub fn line(&mut self, statement: impl Into<String>) -> &mut Self {
        self.lines.push(statement.into());
        self
    }

    /// Appends `name=value`.
    pub fn assign(&mut self, name: &str, value: &ScriptArg) -> &mut Self {
        self.lines.push(format!("{name}={value}"));
        self
    }

    /// Appends a method call.
    pub fn call(&mut self, call: &ScriptCall) -> &mut Self {
        self.lines.push(call.to_string());
        self
    }

    /// Number of statements so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if no statement was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Renders the script, one statement per line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Writes the script to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn write_to(&self, path: &Path) -> BridgeResult<()> {
        tokio::fs::write(path, self.render())
            .await
            .map_err(|e| BridgeError::script_write(path, e))
    }
}
