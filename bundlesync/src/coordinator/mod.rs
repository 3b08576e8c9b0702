//! Application-level sequencing of content initialization.
//!
//! [`ContentCoordinator`] owns a [`SyncContext`] and wires the other
//! components together: it reconciles catalogs, drives the download
//! scheduler through connectivity changes, validates the result and records
//! completion in the flag store.

mod context;
mod runner;

pub use context::SyncContext;
pub use runner::{ContentCoordinator, InitOutcome, InitReport};
