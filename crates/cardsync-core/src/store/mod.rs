//! Persistent string-keyed, string-valued storage.
//!
//! Keys follow the `<kind>_<owner>_<scope>` convention (see
//! [`crate::cache::keys`]). Two backends are provided:
//! - `FileStore`: one file per key under a directory
//! - `MemoryStore`: process-local map, for tests and ephemeral sessions

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StorageError;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
