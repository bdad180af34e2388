//! Core types - pure abstractions shared across the codebase.

mod generation;
mod mode;
mod name;
pub mod platform;
mod state;

pub use generation::Generation;
pub use mode::RunMode;
pub use name::{ClassName, SOURCE_EXT};
pub use state::{is_shutdown, register_watch_loop, setup_shutdown_handler};
