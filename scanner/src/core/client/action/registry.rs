use std::collections::HashMap;
use std::sync::Arc;

use super::Action;
use crate::error::{ScanError, ScanResult};
use crate::types::scan::ActionRef;

/// Named actions that scan configurations can refer to
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry").field("actions", &self.actions.keys().collect::<Vec<_>>()).finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action` under its own name, replacing any previous one.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_string(), action);
    }

    pub fn with_action(mut self, action: Arc<dyn Action>) -> Self {
        self.register(action);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Resolves a configured action reference. Missing or unknown references are configuration failures.
    pub fn resolve(&self, action: Option<&ActionRef>) -> ScanResult<Arc<dyn Action>> {
        let action = action.ok_or_else(|| {
            ScanError::Configuration("No valid action configured in task scanner".to_string())
        })?;
        self.actions.get(&action.name).cloned().ok_or_else(|| {
            ScanError::Configuration(format!("Action '{}' configured in task scanner is not registered", action.name))
        })
    }
}
