//! Subcommand implementations.

pub mod cache;
pub mod catalog;
pub mod common;
pub mod config;
pub mod flags;
pub mod manifest;
pub mod sync;
pub mod validate;
