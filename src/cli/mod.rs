//! Command-line interface module.

mod args;
pub mod check;
pub mod clean;
pub mod precompile;
pub mod run;

pub use args::{Cli, Commands, RunArgs};
