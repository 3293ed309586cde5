//! Nested definition of a native component.

use indexmap::IndexMap;
use tracing::warn;

use super::PropertyEditor;
use crate::client::error::BridgeResult;
use crate::script::ScriptArg;

/// A property value: a literal or a named group of further properties.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Leaf value.
    Value(ScriptArg),
    /// Named group, rendered as its own `NAME:` block.
    Group(IndexMap<String, PropValue>),
}

impl PropValue {
    /// Leaf value from anything that renders as a literal.
    #[must_use]
    pub fn value(value: impl Into<ScriptArg>) -> Self {
        Self::Value(value.into())
    }

    /// Group from key/value pairs, keeping their order.
    #[must_use]
    pub fn group<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Group(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The leaf value, if this is one.
    #[must_use]
    pub const fn as_value(&self) -> Option<&ScriptArg> {
        match self {
            Self::Value(v) => Some(v),
            Self::Group(_) => None,
        }
    }
}

/// Ordered component definition.
///
/// Every write lands locally first. With auto-update on, the whole
/// definition is then pushed to the editor; a rejected push is logged and
/// the local value is kept.
#[derive(Debug)]
pub struct ComponentProps<E> {
    editor: E,
    component: String,
    props: IndexMap<String, PropValue>,
    auto_update: bool,
}

impl<E: PropertyEditor> ComponentProps<E> {
    /// Creates a definition with auto-update on.
    pub fn new<I, K>(editor: E, component: impl Into<String>, props: I) -> Self
    where
        I: IntoIterator<Item = (K, PropValue)>,
        K: Into<String>,
    {
        Self {
            editor,
            component: component.into(),
            props: props.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            auto_update: true,
        }
    }

    /// Turns pushing after each write on or off.
    pub fn set_auto_update(&mut self, auto_update: bool) {
        self.auto_update = auto_update;
    }

    /// Whether writes are pushed to the editor.
    #[must_use]
    pub const fn auto_update(&self) -> bool {
        self.auto_update
    }

    /// The editor definitions are pushed to.
    #[must_use]
    pub const fn editor(&self) -> &E {
        &self.editor
    }

    /// Top-level property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    /// Property reached through nested groups, e.g. `["BasicComponentInfo",
    /// "Company"]`.
    #[must_use]
    pub fn get_path(&self, path: &[&str]) -> Option<&PropValue> {
        let (first, rest) = path.split_first()?;
        let mut current = self.props.get(*first)?;
        for key in rest {
            match current {
                PropValue::Group(entries) => current = entries.get(*key)?,
                PropValue::Value(_) => return None,
            }
        }
        Some(current)
    }

    /// Writes a top-level property and pushes the definition if
    /// auto-update is on.
    ///
    /// Returns `false` only when the push was attempted and rejected.
    pub async fn set(&mut self, key: &str, value: PropValue) -> bool {
        self.props.insert(key.to_string(), value);
        self.push_after_write(key).await
    }

    /// Writes a property inside nested groups, creating missing groups, and
    /// pushes the definition if auto-update is on.
    pub async fn set_in(&mut self, groups: &[&str], key: &str, value: PropValue) -> bool {
        insert_nested(&mut self.props, groups, key, value);
        self.push_after_write(key).await
    }

    /// Writes a top-level property without pushing anything.
    pub fn set_without_update(&mut self, key: &str, value: PropValue) {
        self.props.insert(key.to_string(), value);
    }

    /// Pushes the whole definition to the editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the editor rejects the definition.
    pub async fn update_native(&self) -> BridgeResult<()> {
        self.editor.edit_definition(&self.to_args()).await
    }

    /// Renders the definition as the editor's nested argument array.
    #[must_use]
    pub fn to_args(&self) -> ScriptArg {
        let mut args = vec![ScriptArg::Str(format!("NAME:{}", self.component))];
        append_args(&self.props, &mut args);
        ScriptArg::List(args)
    }

    async fn push_after_write(&self, key: &str) -> bool {
        if !self.auto_update {
            return true;
        }
        match self.update_native().await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    component = %self.component,
                    property = key,
                    error = %e,
                    "Update failed, check needed arguments"
                );
                false
            }
        }
    }
}

/// Inserts `key` below `groups`. A leaf standing where a group is needed is
/// replaced by a new group.
fn insert_nested(
    entries: &mut IndexMap<String, PropValue>,
    groups: &[&str],
    key: &str,
    value: PropValue,
) {
    let Some((first, rest)) = groups.split_first() else {
        entries.insert(key.to_string(), value);
        return;
    };
    let slot = entries
        .entry((*first).to_string())
        .or_insert_with(|| PropValue::Group(IndexMap::new()));
    match slot {
        PropValue::Group(inner) => insert_nested(inner, rest, key, value),
        PropValue::Value(_) => {
            let mut inner = IndexMap::new();
            insert_nested(&mut inner, rest, key, value);
            *slot = PropValue::Group(inner);
        }
    }
}

/// `key:=`, value pairs; groups become nested `NAME:` blocks.
fn append_args(props: &IndexMap<String, PropValue>, args: &mut Vec<ScriptArg>) {
    for (key, value) in props {
        match value {
            PropValue::Value(v) => {
                args.push(ScriptArg::Str(format!("{key}:=")));
                args.push(v.clone());
            }
            PropValue::Group(entries) => {
                let mut nested = vec![ScriptArg::Str(format!("NAME:{key}"))];
                append_args(entries, &mut nested);
                args.push(ScriptArg::List(nested));
            }
        }
    }
}
