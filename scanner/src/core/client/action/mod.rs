pub mod command;
pub mod error;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use command::CommandAction;
pub use error::ActionError;
pub use registry::ActionRegistry;

/// Values handed to an action for one claimed record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionBindings {
    /// Full content of the record
    pub input: Value,
    /// `<collection>/<id>`
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(rename = "resourceContainer")]
    pub resource_container: String,
    #[serde(rename = "resourceId")]
    pub resource_id: String,
}

/// Unit of work executed once per claimed record.
///
/// The returned value signals success only when it is JSON `true`; any other value is a
/// per-record failure. Returning `Err` is reserved for the action itself breaking, and aborts
/// the partition that invoked it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    /// Inactive actions are skipped: claimed records are left claimed and not executed.
    fn is_active(&self) -> bool {
        true
    }

    async fn invoke(&self, bindings: ActionBindings) -> Result<Value, ActionError>;
}

pub fn is_success(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}
