//! Filesystem helpers and string formatting.

pub mod format;
pub mod fs;

// Re-export commonly used functions at module level
pub use format::{format_age, truncate_string};
pub use fs::{encode_component, remove_file_if_exists};
