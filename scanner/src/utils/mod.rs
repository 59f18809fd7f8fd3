pub mod constants;
pub mod flatten;
pub mod logging;
pub mod macros;
