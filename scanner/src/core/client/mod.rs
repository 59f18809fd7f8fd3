pub mod action;
pub mod store;

pub use action::{Action, ActionBindings, ActionError, ActionRegistry, CommandAction};
pub use store::{InMemoryRecordStore, RecordStore, StoreError};
