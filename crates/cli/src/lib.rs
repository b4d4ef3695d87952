//! To-Do E2E CLI
//!
//! Command-line interface for running the to-do list suite, listing its
//! scenarios and serving the local reference page.

pub mod commands;
pub mod output;
