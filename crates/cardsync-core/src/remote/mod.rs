//! Remote data collaborator.
//!
//! The rest of the crate only talks to the remote through the
//! [`RemoteStore`] trait. `RestRemote` implements it over HTTPS against a
//! hosted REST gateway with object storage and signed asset URLs.

pub mod client;
pub mod error;
pub mod records;

use std::path::Path;

use async_trait::async_trait;

pub use client::RestRemote;
pub use error::ApiError;
pub use records::{CardDraft, CardRecord, DeckDraft, DeckRecord};

use crate::models::{Card, DeckChanges};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Decks of `owner`, ordered by ordering key.
    async fn list_partitions(&self, owner: &str) -> Result<Vec<DeckRecord>, ApiError>;

    /// Cards of the given decks, oldest first.
    async fn list_items(&self, owner: &str, deck_ids: &[String])
        -> Result<Vec<CardRecord>, ApiError>;

    async fn create_partition(&self, owner: &str, draft: &DeckDraft)
        -> Result<DeckRecord, ApiError>;

    async fn update_partition(
        &self,
        owner: &str,
        deck_id: &str,
        changes: &DeckChanges,
    ) -> Result<DeckRecord, ApiError>;

    /// Deleting a deck also deletes its cards on the remote side.
    async fn delete_partition(&self, owner: &str, deck_id: &str) -> Result<(), ApiError>;

    async fn create_item(&self, owner: &str, draft: &CardDraft) -> Result<CardRecord, ApiError>;

    async fn update_item(&self, owner: &str, card: &Card) -> Result<CardRecord, ApiError>;

    async fn delete_item(&self, owner: &str, card_id: &str) -> Result<(), ApiError>;

    /// Upload a local file and return a (signed, time-limited) URL for it.
    async fn upload_asset(&self, owner: &str, local_path: &Path) -> Result<String, ApiError>;

    async fn delete_asset(&self, url: &str) -> Result<(), ApiError>;
}
