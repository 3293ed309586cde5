//! Flat parameter mirror of one component.

use std::fmt::Display;

use indexmap::IndexMap;
use tracing::warn;

use super::PropertyEditor;
use crate::script::ScriptArg;

/// Component parameters whose writes go to the editor first.
///
/// A write that the editor rejects is dropped with a warning and the local
/// value stays as it was.
#[derive(Debug)]
pub struct ParameterMirror<E> {
    editor: E,
    component: String,
    values: IndexMap<String, String>,
}

impl<E: PropertyEditor> ParameterMirror<E> {
    /// Creates a mirror seeded with values read from the application.
    pub fn new<I, K, V>(editor: E, component: impl Into<String>, initial: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            editor,
            component: component.into(),
            values: initial
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Name of the mirrored component.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// The editor writes are forwarded to.
    #[must_use]
    pub const fn editor(&self) -> &E {
        &self.editor
    }

    /// Locally known value of a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Iterates over parameters in the order they were first seen.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of known parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no parameter is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Writes a parameter through to the editor.
    ///
    /// Returns `true` if the editor accepted the change and the local copy
    /// was updated.
    pub async fn set(&mut self, key: &str, value: impl Display) -> bool {
        let value = value.to_string();
        let change = change_request(&self.component, key, &value);

        match self.editor.change_property(&change).await {
            Ok(()) => {
                self.values.insert(key.to_string(), value);
                true
            }
            Err(e) => {
                warn!(
                    component = %self.component,
                    property = key,
                    error = %e,
                    "Property has not been edited, check if it is read-only"
                );
                false
            }
        }
    }
}

/// Builds the `ChangeProperty` payload for one parameter.
fn change_request(component: &str, key: &str, value: &str) -> ScriptArg {
    ScriptArg::List(vec![
        "NAME:AllTabs".into(),
        ScriptArg::List(vec![
            "NAME:Parameters".into(),
            ScriptArg::str_list(["NAME:PropServers", component]),
            ScriptArg::List(vec![
                "NAME:ChangedProps".into(),
                ScriptArg::str_list([format!("NAME:{key}"), "Value:=".to_string(), value.to_string()]),
            ]),
        ]),
    ])
}
