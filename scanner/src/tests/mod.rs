pub mod actions;
pub mod common;
