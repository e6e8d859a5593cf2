// Public modules
pub mod config;
pub mod error;
pub mod lint_fix;
pub mod migrate;
pub mod rewrite;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
