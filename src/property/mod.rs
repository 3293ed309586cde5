//! Local property bags that forward every write to the remote editor.
//!
//! The design tool owns the truth. These types only keep a copy of what was
//! last written successfully:
//!
//! - [`ParameterMirror`]: flat parameters of one component; a write is
//!   applied locally only after the editor accepted it
//! - [`ComponentProps`]: the nested definition of a native component; a
//!   write is applied locally, then the whole definition is pushed
//!
//! Remote calls go through the [`PropertyEditor`] trait so the bags can be
//! exercised without a live application.

mod mirror;
mod tree;

pub use mirror::ParameterMirror;
pub use tree::{ComponentProps, PropValue};

use tracing::debug;

use crate::client::error::{BridgeError, BridgeResult};
use crate::client::WorkbenchClient;
use crate::script::{ScriptArg, ScriptCall};

/// Name of the editor object in the remote interpreter.
pub const DEFAULT_EDITOR_VAR: &str = "oEditor";

/// Remote side of a property bag.
#[allow(async_fn_in_trait)] // single-threaded callers only, Send bounds not needed
pub trait PropertyEditor {
    /// Applies a property change (`ChangeProperty`).
    ///
    /// # Errors
    ///
    /// Returns an error if the editor rejects the change or cannot be
    /// reached.
    async fn change_property(&self, change: &ScriptArg) -> BridgeResult<()>;

    /// Replaces a native component definition
    /// (`EditNativeComponentDefinition`).
    ///
    /// # Errors
    ///
    /// Returns an error if the editor rejects the definition or cannot be
    /// reached.
    async fn edit_definition(&self, definition: &ScriptArg) -> BridgeResult<()>;
}

/// Editor reached through the scripting socket.
///
/// Each call becomes one statement, `oEditor.ChangeProperty([...])`, and only
/// an `<OK>` reply counts as accepted.
#[derive(Debug, Clone, Copy)]
pub struct RemoteEditor<'a> {
    client: &'a WorkbenchClient,
    editor_var: &'a str,
}

impl<'a> RemoteEditor<'a> {
    /// Editor bound to the default `oEditor` variable.
    #[must_use]
    pub const fn new(client: &'a WorkbenchClient) -> Self {
        Self {
            client,
            editor_var: DEFAULT_EDITOR_VAR,
        }
    }

    /// Editor bound to another variable name.
    #[must_use]
    pub const fn with_var(client: &'a WorkbenchClient, editor_var: &'a str) -> Self {
        Self { client, editor_var }
    }

    async fn invoke(&self, method: &str, arg: &ScriptArg) -> BridgeResult<()> {
        let statement = ScriptCall::new(self.editor_var, method)
            .arg(arg.clone())
            .to_string();
        debug!(method, "Forwarding editor call");

        let reply = self.client.send_statement(&statement).await?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(BridgeError::transmission_failed(reply.as_str()))
        }
    }
}

impl PropertyEditor for RemoteEditor<'_> {
    async fn change_property(&self, change: &ScriptArg) -> BridgeResult<()> {
        self.invoke("ChangeProperty", change).await
    }

    async fn edit_definition(&self, definition: &ScriptArg) -> BridgeResult<()> {
        self.invoke("EditNativeComponentDefinition", definition)
            .await
    }
}
