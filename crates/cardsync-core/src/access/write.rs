use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, warn};

use super::{classify_write_error, DataAccess};
use crate::error::{Error, Result};
use crate::models::{next_order_index, reordered_keys, Card, Deck, DeckChanges, NewCard};
use crate::remote::{ApiError, CardDraft, DeckDraft};

impl DataAccess {
    /// Owner for a write. Offline writes are refused before any remote call.
    async fn write_owner(&self) -> Result<String> {
        if !self.network.is_online().await {
            return Err(Error::RequiresConnectivity);
        }
        self.owner()
            .await
            .ok_or(Error::Remote(ApiError::Unauthorized))
    }

    /// The owner's decks as the remote has them, sorted by ordering key.
    async fn remote_decks(&self, owner: &str) -> Result<Vec<Deck>> {
        let mut decks: Vec<Deck> = self
            .remote_call(self.remote.list_partitions(owner))
            .await
            .map_err(classify_write_error)?
            .into_iter()
            .map(Deck::from)
            .collect();
        decks.sort_by_key(|d| d.order_index);
        Ok(decks)
    }

    /// Replace one deck in the cached deck list, or add it.
    fn cache_deck(&self, owner: &str, deck: &Deck) {
        let mut decks = self.cache.get_partitions(owner);
        match decks.iter_mut().find(|d| d.id == deck.id) {
            Some(existing) => *existing = deck.clone(),
            None => decks.push(deck.clone()),
        }
        self.cache.put_partitions(owner, &decks);
    }

    /// Remove the remote copy of an asset. Failures leave an orphaned
    /// object behind and are only logged.
    async fn delete_remote_asset(&self, url: &str) {
        if let Err(e) = self.remote_call(self.remote.delete_asset(url)).await {
            warn!(error = %e, "Failed to delete remote asset");
        }
    }

    async fn forget_asset(&self, owner: &str, url: &str) {
        self.assets.purge(owner, url, true).await;
        self.delete_remote_asset(url).await;
    }

    // ===== Decks =====

    pub async fn create_deck(&self, name: &str) -> Result<Deck> {
        let name = Deck::validate_name(name)?;
        let owner = self.write_owner().await?;

        let existing = self.remote_decks(&owner).await?;
        let draft = DeckDraft {
            name,
            order_index: next_order_index(&existing),
        };

        let record = self
            .remote_call(self.remote.create_partition(&owner, &draft))
            .await
            .map_err(classify_write_error)?;
        let deck = Deck::from(record);
        info!(owner, deck_id = %deck.id, "Created deck");

        let mut decks = existing;
        decks.push(deck.clone());
        self.cache.put_partitions(&owner, &decks);
        Ok(deck)
    }

    /// Rename and/or move a deck. A new ordering key must not belong to
    /// another of the owner's decks.
    pub async fn update_deck(&self, deck_id: &str, changes: DeckChanges) -> Result<Deck> {
        if changes.is_empty() {
            return Err(Error::Validation("Nothing to update".to_string()));
        }
        let changes = DeckChanges {
            name: changes.name.as_deref().map(Deck::validate_name).transpose()?,
            order_index: changes.order_index,
        };
        let owner = self.write_owner().await?;

        if let Some(order_index) = changes.order_index {
            let decks = self.remote_decks(&owner).await?;
            if let Some(taken) = decks
                .iter()
                .find(|d| d.order_index == order_index && d.id != deck_id)
            {
                return Err(Error::Validation(format!(
                    "Ordering key {} already belongs to deck {}",
                    order_index, taken.id
                )));
            }
        }

        let record = self
            .remote_call(self.remote.update_partition(&owner, deck_id, &changes))
            .await
            .map_err(classify_write_error)?;
        let deck = Deck::from(record);
        self.cache_deck(&owner, &deck);
        Ok(deck)
    }

    /// Move `ordered_ids` to the front in the given order. Every other deck
    /// follows in its current order, and all decks get consecutive ordering
    /// keys. Only decks whose key changes are written.
    pub async fn reorder_decks(&self, ordered_ids: &[String]) -> Result<Vec<Deck>> {
        let mut seen = HashSet::new();
        if let Some(dup) = ordered_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(Error::Validation(format!("Deck {} listed twice", dup)));
        }
        let owner = self.write_owner().await?;

        let mut decks = self.remote_decks(&owner).await?;
        if let Some(unknown) = ordered_ids
            .iter()
            .find(|id| !decks.iter().any(|d| &d.id == *id))
        {
            return Err(Error::Validation(format!("Unknown deck {}", unknown)));
        }

        for (deck_id, order_index) in reordered_keys(&decks, ordered_ids) {
            let current = decks.iter().find(|d| d.id == deck_id).map(|d| d.order_index);
            if current == Some(order_index) {
                continue;
            }

            let result = self
                .remote_call(self.remote.update_partition(
                    &owner,
                    &deck_id,
                    &DeckChanges::reorder(order_index),
                ))
                .await;
            let deck = match result {
                Ok(record) => Deck::from(record),
                Err(e) => {
                    // Keep the moves the remote already applied
                    decks.sort_by_key(|d| d.order_index);
                    self.cache.put_partitions(&owner, &decks);
                    return Err(classify_write_error(e));
                }
            };
            if let Some(existing) = decks.iter_mut().find(|d| d.id == deck.id) {
                *existing = deck;
            }
        }

        decks.sort_by_key(|d| d.order_index);
        self.cache.put_partitions(&owner, &decks);
        Ok(decks)
    }

    /// Delete a deck with its cards, their cached images and the remote
    /// copies of those images.
    pub async fn delete_deck(&self, deck_id: &str) -> Result<()> {
        let owner = self.write_owner().await?;

        // The remote knows every image of the deck; the cache may be stale
        let ids = [deck_id.to_string()];
        let cards = match self.remote_call(self.remote.list_items(&owner, &ids)).await {
            Ok(records) => records.into_iter().map(Card::from).collect(),
            Err(e) => {
                debug!(error = %e, deck_id, "Could not list cards of deleted deck, using cache");
                self.cache.get_items(&owner, &ids)
            }
        };
        let images: Vec<String> = cards.into_iter().filter_map(|c| c.image_url).collect();

        self.remote_call(self.remote.delete_partition(&owner, deck_id))
            .await
            .map_err(classify_write_error)?;
        info!(owner, deck_id, images = images.len(), "Deleted deck");

        self.cache.remove_partition(&owner, deck_id);
        let remaining: Vec<Deck> = self
            .cache
            .get_partitions(&owner)
            .into_iter()
            .filter(|d| d.id != deck_id)
            .collect();
        self.cache.put_partitions(&owner, &remaining);

        for url in &images {
            self.forget_asset(&owner, url).await;
        }
        Ok(())
    }

    // ===== Cards =====

    /// Create a card, uploading its image first if it has one. The uploaded
    /// file is adopted into the asset cache so it never needs downloading.
    pub async fn create_card(&self, new_card: NewCard) -> Result<Card> {
        new_card.validate()?;
        if let Some(image) = &new_card.image {
            self.validate_image(image)?;
        }
        let owner = self.write_owner().await?;

        let image_url = match &new_card.image {
            Some(image) => Some(
                self.remote_call(self.remote.upload_asset(&owner, image))
                    .await
                    .map_err(classify_write_error)?,
            ),
            None => None,
        };

        let draft = CardDraft {
            deck_id: new_card.deck_id.clone(),
            original_text: new_card.original_text.trim().to_string(),
            furigana_text: new_card.furigana_text.clone(),
            translated_text: new_card.translated_text.clone(),
            language: new_card.language.clone(),
            image_url: image_url.clone(),
            analysis: new_card.analysis.clone(),
        };
        let record = match self.remote_call(self.remote.create_item(&owner, &draft)).await {
            Ok(record) => record,
            Err(e) => {
                if let Some(url) = &image_url {
                    self.delete_remote_asset(url).await;
                }
                return Err(classify_write_error(e));
            }
        };
        let card = Card::from(record);
        info!(owner, card_id = %card.id, deck_id = %card.deck_id, "Created card");

        if let Err(e) = self.cache.try_upsert_item(&owner, &card) {
            warn!(error = %e, owner, card_id = %card.id, "Card created but not cached");
        }
        if let (Some(image), Some(url)) = (&new_card.image, &image_url) {
            if let Err(e) = self.assets.adopt(&owner, url, image).await {
                warn!(error = %format!("{:#}", e), owner, "Uploaded image not adopted into asset cache");
            }
        }
        Ok(card)
    }

    fn validate_image(&self, image: &Path) -> Result<()> {
        let size = std::fs::metadata(image)
            .map_err(|e| Error::Validation(format!("Image {} unreadable: {}", image.display(), e)))?
            .len();
        if size > self.settings.max_asset_bytes {
            return Err(Error::Validation(format!(
                "Image is {} bytes, limit is {}",
                size, self.settings.max_asset_bytes
            )));
        }
        Ok(())
    }

    /// Update a card's fields. Moving it to another deck is supported.
    pub async fn update_card(&self, card: &Card) -> Result<Card> {
        card.validate()?;
        let owner = self.write_owner().await?;

        let record = self
            .remote_call(self.remote.update_item(&owner, card))
            .await
            .map_err(classify_write_error)?;
        let updated = Card::from(record);

        let elsewhere = self
            .cache
            .metadata(&owner)
            .map(|meta| meta.deck_ids())
            .unwrap_or_default();
        for deck_id in elsewhere.iter().filter(|id| **id != updated.deck_id) {
            self.cache.remove_item(&owner, deck_id, &updated.id);
        }
        self.cache.upsert_item(&owner, &updated);
        Ok(updated)
    }

    pub async fn delete_card(&self, card: &Card) -> Result<()> {
        let owner = self.write_owner().await?;

        self.remote_call(self.remote.delete_item(&owner, &card.id))
            .await
            .map_err(classify_write_error)?;
        info!(owner, card_id = %card.id, "Deleted card");

        self.cache.remove_item(&owner, &card.deck_id, &card.id);
        if let Some(url) = &card.image_url {
            self.forget_asset(&owner, url).await;
        }
        Ok(())
    }
}
