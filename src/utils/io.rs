//! File I/O primitives with consistent error handling.

use crate::core::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents, attaching the operation and path to any error.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("{} ({})", operation, path.display())),
        )
    })
}

/// Write content to a file, attaching the operation and path to any error.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("{} ({})", operation, path.display())),
        )
    })
}
