//! Offline-first cache and synchronization layer for decks and cards.
//!
//! Reads are answered from a local persistent cache before any network
//! attempt, the cache is refreshed in the background while online, and a
//! full resynchronization runs when connectivity returns.
//!
//! Components, leaf-first:
//! - [`network::NetworkMonitor`]: connectivity snapshot and change fan-out
//! - [`cache::CacheStore`]: per-owner deck/card snapshots plus metadata
//! - [`assets::AssetCache`]: remote image URL to local file mapping
//! - [`guard::ResourceGuard`]: bounds transient image-editing artifacts
//! - [`access::DataAccess`]: the cache-first read/write facade
//! - [`sync::SyncCoordinator`]: full-account resync with a single-flight guard

pub mod access;
pub mod assets;
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod models;
pub mod network;
pub mod remote;
pub mod services;
pub mod store;
pub mod sync;
pub mod tasks;
pub mod token;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{Error, Result, StorageError};
pub use services::Services;
