//! To-Do reference page
//!
//! Serves a to-do list page with the same DOM contract as the page under
//! test, backed by per-session in-memory stores. Pointing the suite at it
//! gives every browser session its own storage instead of a shared remote
//! list.

pub mod server;
pub mod static_files;

pub use server::{WebServer, WebServerConfig};
