//! Local caching module for offline data access.
//!
//! `CacheStore` keeps, per owner:
//! - one Cache Entry per deck holding that deck's cards
//! - the deck list
//! - Cache Metadata (last update, decks with a live entry, card counts)
//!
//! Writing an entry replaces it wholesale. Read failures degrade to empty
//! results and write failures are logged, never propagated.

pub mod keys;
pub mod manager;

pub use manager::{CacheMetadata, CacheStore, CachedData};
