//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod health;
pub mod keys;
pub mod lookups;
pub mod sessions;

// Re-export all handlers for use in router
pub use health::*;
pub use keys::*;
pub use lookups::*;
pub use sessions::*;
