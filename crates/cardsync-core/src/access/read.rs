use std::collections::HashMap;

use tracing::{debug, warn};

use super::{DataAccess, Selection};
use crate::error::Result;
use crate::models::{Card, Deck};
use crate::token::OpToken;

impl DataAccess {
    // ===== Decks =====

    /// Decks of the current owner, sorted by ordering key. Never fails for
    /// connectivity or storage reasons; the worst case is an empty list.
    pub async fn list_decks(&self) -> Result<Vec<Deck>> {
        let Some(owner) = self.owner().await else {
            debug!("No owner available, returning no decks");
            return Ok(Vec::new());
        };

        let cached = self.cache.get_partitions(&owner);
        if !cached.is_empty() {
            if self.network.snapshot() {
                self.spawn_deck_refresh(&owner);
            }
            return Ok(cached);
        }

        if !self.network.is_online().await {
            debug!(owner, "Deck cache miss while offline");
            return Ok(Vec::new());
        }

        match self.fetch_decks(&owner).await {
            Ok(decks) => Ok(decks),
            Err(e) if e.is_connectivity() => {
                warn!(error = %e, owner, "Deck fetch lost connectivity, retrying cache");
                Ok(self.cache.get_partitions(&owner))
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch decks from the remote, replace the cached list and drop cache
    /// entries of decks that no longer exist.
    pub(crate) async fn fetch_decks(&self, owner: &str) -> Result<Vec<Deck>> {
        let records = self.remote_call(self.remote.list_partitions(owner)).await?;
        let mut decks: Vec<Deck> = records.into_iter().map(Deck::from).collect();
        decks.sort_by_key(|d| d.order_index);

        self.cache.put_partitions(owner, &decks);
        self.cache.prune_orphans(owner);
        Ok(decks)
    }

    fn spawn_deck_refresh(&self, owner: &str) {
        let access = self.clone();
        let owner = owner.to_string();
        self.supervisor
            .spawn(format!("refresh-decks:{}", owner), async move {
                access.fetch_decks(&owner).await?;
                Ok(())
            });
    }

    // ===== Cards =====

    /// Cards of the given decks, concatenated in request order.
    pub async fn list_cards(&self, deck_ids: &[String]) -> Result<Vec<Card>> {
        self.load_cards(deck_ids, None).await
    }

    /// A user selection change. Supersedes every earlier selection, whose
    /// in-flight fetches will no longer write to the cache.
    pub async fn select_decks(&self, deck_ids: Vec<String>) -> Result<Selection> {
        let token = self.tokens.advance();
        debug!(token = token.value(), decks = deck_ids.len(), "Selection changed");
        let cards = self.load_cards(&deck_ids, Some(token)).await?;
        Ok(Selection {
            token,
            deck_ids,
            cards,
        })
    }

    async fn load_cards(&self, deck_ids: &[String], token: Option<OpToken>) -> Result<Vec<Card>> {
        if deck_ids.is_empty() {
            return Ok(Vec::new());
        }
        let Some(owner) = self.owner().await else {
            debug!("No owner available, returning no cards");
            return Ok(Vec::new());
        };

        let cached = self.cache.get_items(&owner, deck_ids);
        if !cached.is_empty() {
            if self.network.snapshot() {
                self.spawn_card_refresh(&owner, deck_ids.to_vec(), token);
            }
            return Ok(cached);
        }

        if !self.network.is_online().await {
            debug!(owner, decks = deck_ids.len(), "Card cache miss while offline");
            return Ok(Vec::new());
        }

        match self.fetch_cards(&owner, deck_ids, token).await {
            Ok(cards) => Ok(cards.unwrap_or_default()),
            Err(e) if e.is_connectivity() => {
                warn!(error = %e, owner, "Card fetch lost connectivity, retrying cache");
                Ok(self.cache.get_items(&owner, deck_ids))
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch cards and replace the cache entry of every requested deck.
    /// Returns `None` without touching the cache if `token` was superseded
    /// while the fetch was in flight.
    pub(crate) async fn fetch_cards(
        &self,
        owner: &str,
        deck_ids: &[String],
        token: Option<OpToken>,
    ) -> Result<Option<Vec<Card>>> {
        let records = self
            .remote_call(self.remote.list_items(owner, deck_ids))
            .await?;

        if let Some(token) = token {
            if !self.tokens.is_current(token) {
                debug!(
                    token = token.value(),
                    current = self.tokens.current().value(),
                    "Discarding superseded card fetch"
                );
                return Ok(None);
            }
        }

        let mut grouped: HashMap<&str, Vec<Card>> = deck_ids
            .iter()
            .map(|id| (id.as_str(), Vec::new()))
            .collect();
        for card in records.into_iter().map(Card::from) {
            match grouped.get_mut(card.deck_id.as_str()) {
                Some(deck_cards) => deck_cards.push(card),
                None => debug!(card_id = %card.id, deck_id = %card.deck_id, "Dropping card of unrequested deck"),
            }
        }

        let mut cards = Vec::new();
        for deck_id in deck_ids {
            let deck_cards = grouped.remove(deck_id.as_str()).unwrap_or_default();
            self.cache.put_items(owner, deck_id, &deck_cards);
            cards.extend(deck_cards);
        }

        let images: Vec<String> = cards.iter().filter_map(|c| c.image_url.clone()).collect();
        self.assets
            .spawn_batch_ensure(&self.supervisor, owner, images);
        Ok(Some(cards))
    }

    fn spawn_card_refresh(&self, owner: &str, deck_ids: Vec<String>, token: Option<OpToken>) {
        let access = self.clone();
        let owner = owner.to_string();
        self.supervisor
            .spawn(format!("refresh-cards:{}", owner), async move {
                access.fetch_cards(&owner, &deck_ids, token).await?;
                Ok(())
            });
    }
}
