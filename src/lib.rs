#![allow(clippy::uninlined_format_args)]

pub mod actions;
pub mod app;
pub mod config;
pub mod data;
pub mod forum;
pub mod loader;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, Options};
