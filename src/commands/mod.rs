//! CLI command implementations for tdarr-exporter.
//!
//! - `config`: Configuration file generation
//! - `test`: Collection cycle testing

pub mod config;

pub use config::command_config;
pub use test::command_test;
