//! CLI command implementations.

pub mod config;
pub mod matrix;
pub mod run;
pub mod version;
