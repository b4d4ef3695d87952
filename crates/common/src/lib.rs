//! To-Do Common Library
//!
//! Shared domain types for the to-do list suite: task items and their
//! one-way completion state, tabs, the page's DOM contract, and the
//! session-scoped task store used by the reference page.

pub mod contract;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use store::{IdAllocator, SessionStores, TodoStore};
pub use types::*;

/// Suite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
