//! Synchronization coordinator.
//!
//! Runs a full-account resync (decks, then their cards, then their images)
//! when connectivity returns or on demand, with a single-flight guard and a
//! status stream for "sync in progress" indicators.

pub mod coordinator;

pub use coordinator::{SkipReason, SyncCoordinator, SyncOutcome, SyncReport};
