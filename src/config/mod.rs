pub mod recipe;
pub mod runtime;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
pub use cli::{BuildArgs, CliConfig, Command, LogFormat, RunArgs};
