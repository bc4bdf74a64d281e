use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::keys::{cards_key, decks_key, meta_key};
use crate::error::StorageError;
use crate::models::{Card, Deck};
use crate::store::KeyValueStore;
use crate::utils::format_age;

/// A persisted snapshot stamped with the owner and scope it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub owner: String,
    pub scope: String,
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(owner: &str, scope: &str, data: T) -> Self {
        Self {
            owner: owner.to_string(),
            scope: scope.to_string(),
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        format_age(self.age_minutes())
    }
}

/// Per-owner index of what is cached and how fresh it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub last_updated: DateTime<Utc>,
    /// Card count of every deck with a live Cache Entry.
    pub decks: BTreeMap<String, usize>,
    /// Always the sum of `decks` values.
    pub card_count: usize,
}

impl Default for CacheMetadata {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            decks: BTreeMap::new(),
            card_count: 0,
        }
    }
}

impl CacheMetadata {
    pub fn deck_ids(&self) -> BTreeSet<String> {
        self.decks.keys().cloned().collect()
    }

    fn set_deck(&mut self, deck_id: &str, count: usize) {
        self.decks.insert(deck_id.to_string(), count);
        self.touch();
    }

    fn drop_deck(&mut self, deck_id: &str) -> Option<usize> {
        let prior = self.decks.remove(deck_id);
        self.touch();
        prior
    }

    fn touch(&mut self) {
        self.card_count = self.decks.values().sum();
        self.last_updated = Utc::now();
    }
}

/// Local cache of decks and cards, namespaced per owner.
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn load<T: DeserializeOwned>(
        &self,
        key: &str,
        owner: &str,
        scope: &str,
    ) -> Result<Option<CachedData<T>>, StorageError> {
        let Some(contents) = self.store.get(key)? else {
            return Ok(None);
        };
        let cached: CachedData<T> =
            serde_json::from_str(&contents).map_err(|source| StorageError::Deserialize {
                key: key.to_string(),
                source,
            })?;

        if cached.owner != owner || cached.scope != scope {
            warn!(key, owner, "Cache entry stamp does not match its key, ignoring");
            return Ok(None);
        }
        Ok(Some(cached))
    }

    fn save<T: Serialize>(
        &self,
        key: &str,
        owner: &str,
        scope: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let cached = CachedData::new(owner, scope, data);
        let contents = serde_json::to_string(&cached).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &contents)
    }

    fn load_metadata(&self, owner: &str) -> Result<Option<CacheMetadata>, StorageError> {
        Ok(self
            .load::<CacheMetadata>(&meta_key(owner), owner, "cache")?
            .map(|cached| cached.data))
    }

    fn save_metadata(&self, owner: &str, meta: &CacheMetadata) -> Result<(), StorageError> {
        self.save(&meta_key(owner), owner, "cache", meta)
    }

    fn update_metadata(
        &self,
        owner: &str,
        apply: impl FnOnce(&mut CacheMetadata),
    ) -> Result<(), StorageError> {
        let mut meta = self.load_metadata(owner)?.unwrap_or_default();
        apply(&mut meta);
        self.save_metadata(owner, &meta)
    }

    /// Save `meta`, then run the entry write. If the entry write fails the
    /// metadata goes back to `prior`, so a deck is known exactly when its
    /// entry is live.
    fn commit(
        &self,
        owner: &str,
        prior: Option<&CacheMetadata>,
        meta: &CacheMetadata,
        write_entry: impl FnOnce() -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        self.save_metadata(owner, meta)?;
        let Err(e) = write_entry() else {
            return Ok(());
        };
        let restored = match prior {
            Some(prior) => self.save_metadata(owner, prior),
            None => self.store.remove(&meta_key(owner)),
        };
        if let Err(rollback) = restored {
            warn!(error = %rollback, owner, "Failed to roll back cache metadata");
        }
        Err(e)
    }

    fn load_entry(&self, owner: &str, deck_id: &str) -> Result<Option<Vec<Card>>, StorageError> {
        Ok(self
            .load::<Vec<Card>>(&cards_key(owner, deck_id), owner, deck_id)?
            .map(|cached| cached.data))
    }

    // ===== Cards =====

    /// Replace the deck's Cache Entry, returning how many cards were stored.
    /// Cards that belong to a different deck are pruned.
    pub fn try_put_items(
        &self,
        owner: &str,
        deck_id: &str,
        cards: &[Card],
    ) -> Result<usize, StorageError> {
        let valid: Vec<&Card> = cards.iter().filter(|c| c.deck_id == deck_id).collect();
        if valid.len() != cards.len() {
            debug!(
                owner,
                deck_id,
                dropped = cards.len() - valid.len(),
                "Pruned cards with a dangling deck reference"
            );
        }

        let prior = self.load_metadata(owner)?;
        let mut meta = prior.clone().unwrap_or_default();
        meta.set_deck(deck_id, valid.len());
        self.commit(owner, prior.as_ref(), &meta, || {
            self.save(&cards_key(owner, deck_id), owner, deck_id, &valid)
        })?;
        Ok(valid.len())
    }

    pub fn put_items(&self, owner: &str, deck_id: &str, cards: &[Card]) {
        if let Err(e) = self.try_put_items(owner, deck_id, cards) {
            warn!(error = %e, owner, deck_id, "Failed to cache cards");
        }
    }

    pub fn try_get_items(
        &self,
        owner: &str,
        deck_ids: &[String],
    ) -> Result<Vec<Card>, StorageError> {
        let mut cards = Vec::new();
        for deck_id in deck_ids {
            if let Some(entry) = self.load_entry(owner, deck_id)? {
                cards.extend(entry);
            }
        }
        Ok(cards)
    }

    /// Cards of the given decks, concatenated in request order. Missing
    /// entries contribute nothing.
    pub fn get_items(&self, owner: &str, deck_ids: &[String]) -> Vec<Card> {
        let mut cards = Vec::new();
        for deck_id in deck_ids {
            match self.load_entry(owner, deck_id) {
                Ok(Some(entry)) => cards.extend(entry),
                Ok(None) => {}
                Err(e) => warn!(error = %e, owner, deck_id, "Failed to read cached cards"),
            }
        }
        cards
    }

    /// Insert or replace one card inside its deck's entry. A deck without
    /// an entry stays uncached so the next read fetches it whole; returns
    /// `Ok(false)` in that case.
    pub fn try_upsert_item(&self, owner: &str, card: &Card) -> Result<bool, StorageError> {
        let Some(mut cards) = self.load_entry(owner, &card.deck_id)? else {
            debug!(owner, deck_id = %card.deck_id, "Deck not cached, skipping card upsert");
            return Ok(false);
        };
        match cards.iter_mut().find(|c| c.id == card.id) {
            Some(existing) => *existing = card.clone(),
            None => cards.push(card.clone()),
        }
        self.try_put_items(owner, &card.deck_id, &cards)?;
        Ok(true)
    }

    pub fn upsert_item(&self, owner: &str, card: &Card) {
        if let Err(e) = self.try_upsert_item(owner, card) {
            warn!(error = %e, owner, card_id = %card.id, "Failed to update cached card");
        }
    }

    /// Rewrite the deck's entry without `card_id`. Returns `Ok(false)` and
    /// changes nothing if the card is not cached.
    pub fn try_remove_item(
        &self,
        owner: &str,
        deck_id: &str,
        card_id: &str,
    ) -> Result<bool, StorageError> {
        let Some(mut cards) = self.load_entry(owner, deck_id)? else {
            return Ok(false);
        };
        let before = cards.len();
        cards.retain(|c| c.id != card_id);
        if cards.len() == before {
            return Ok(false);
        }

        self.try_put_items(owner, deck_id, &cards)?;
        Ok(true)
    }

    pub fn remove_item(&self, owner: &str, deck_id: &str, card_id: &str) -> bool {
        self.try_remove_item(owner, deck_id, card_id)
            .unwrap_or_else(|e| {
                warn!(error = %e, owner, deck_id, card_id, "Failed to remove cached card");
                false
            })
    }

    // ===== Decks =====

    pub fn try_put_partitions(&self, owner: &str, decks: &[Deck]) -> Result<(), StorageError> {
        self.save(&decks_key(owner), owner, "all", &decks)?;
        self.update_metadata(owner, CacheMetadata::touch)
    }

    pub fn put_partitions(&self, owner: &str, decks: &[Deck]) {
        if let Err(e) = self.try_put_partitions(owner, decks) {
            warn!(error = %e, owner, "Failed to cache decks");
        }
    }

    /// Cached decks sorted by ordering key; `None` if the list was never cached.
    pub fn try_get_partitions(&self, owner: &str) -> Result<Option<Vec<Deck>>, StorageError> {
        Ok(self
            .load::<Vec<Deck>>(&decks_key(owner), owner, "all")?
            .map(|cached| {
                let mut decks = cached.data;
                decks.sort_by_key(|d| d.order_index);
                decks
            }))
    }

    pub fn get_partitions(&self, owner: &str) -> Vec<Deck> {
        self.try_get_partitions(owner)
            .unwrap_or_else(|e| {
                warn!(error = %e, owner, "Failed to read cached decks");
                None
            })
            .unwrap_or_default()
    }

    /// Delete the deck's entry and drop it from the metadata. Returns the
    /// number of cards the entry held, if it existed.
    pub fn try_remove_partition(
        &self,
        owner: &str,
        deck_id: &str,
    ) -> Result<Option<usize>, StorageError> {
        let key = cards_key(owner, deck_id);
        let Some(prior) = self.load_metadata(owner)? else {
            self.store.remove(&key)?;
            return Ok(None);
        };
        let mut meta = prior.clone();
        let removed = meta.drop_deck(deck_id);
        self.commit(owner, Some(&prior), &meta, || self.store.remove(&key))?;
        Ok(removed)
    }

    pub fn remove_partition(&self, owner: &str, deck_id: &str) {
        match self.try_remove_partition(owner, deck_id) {
            Ok(prior) => debug!(owner, deck_id, removed_cards = ?prior, "Removed cached deck"),
            Err(e) => warn!(error = %e, owner, deck_id, "Failed to remove cached deck"),
        }
    }

    // ===== Metadata =====

    pub fn metadata(&self, owner: &str) -> Option<CacheMetadata> {
        self.load_metadata(owner).unwrap_or_else(|e| {
            warn!(error = %e, owner, "Failed to read cache metadata");
            None
        })
    }

    /// True if nothing was ever cached for `owner` or the last update is
    /// older than `threshold`.
    pub fn is_stale(&self, owner: &str, threshold: Duration) -> bool {
        let Some(meta) = self.metadata(owner) else {
            return true;
        };
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
        Utc::now() - meta.last_updated > threshold
    }

    /// Human-readable age of the owner's cache, e.g. "5m ago".
    pub fn cache_age(&self, owner: &str) -> Option<String> {
        self.metadata(owner)
            .map(|meta| format_age((Utc::now() - meta.last_updated).num_minutes()))
    }

    /// Remove entries for decks that are no longer in the cached deck list.
    /// Does nothing if the deck list itself was never cached.
    pub fn prune_orphans(&self, owner: &str) -> usize {
        let decks = match self.try_get_partitions(owner) {
            Ok(Some(decks)) => decks,
            Ok(None) => return 0,
            Err(e) => {
                warn!(error = %e, owner, "Cannot prune cache without a readable deck list");
                return 0;
            }
        };
        let live: HashSet<&str> = decks.iter().map(|d| d.id.as_str()).collect();

        let mut pruned = 0;
        for deck_id in self.metadata(owner).map(|m| m.deck_ids()).unwrap_or_default() {
            if !live.contains(deck_id.as_str()) {
                self.remove_partition(owner, &deck_id);
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!(owner, pruned, "Pruned orphaned deck entries");
        }
        pruned
    }

    /// Forget everything cached for `owner`.
    pub fn clear_owner(&self, owner: &str) {
        let deck_ids = self.metadata(owner).map(|m| m.deck_ids()).unwrap_or_default();
        let keys = deck_ids
            .iter()
            .map(|deck_id| cards_key(owner, deck_id))
            .chain([decks_key(owner), meta_key(owner)]);
        for key in keys {
            if let Err(e) = self.store.remove(&key) {
                warn!(error = %e, key, "Failed to clear cache key");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::{card, deck, FailingStore};

    fn cache() -> CacheStore {
        CacheStore::new(Arc::new(MemoryStore::new()))
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_put_items_replaces_not_merges() {
        let cache = cache();
        let a = vec![card("c1", "p1"), card("c2", "p1")];
        let b = vec![card("c3", "p1")];

        cache.put_items("u1", "p1", &a);
        cache.put_items("u1", "p1", &b);

        assert_eq!(cache.get_items("u1", &ids(&["p1"])), b);
        assert_eq!(cache.metadata("u1").unwrap().card_count, 1);
    }

    #[test]
    fn test_put_items_is_idempotent() {
        let cache = cache();
        let a = vec![card("c1", "p1"), card("c2", "p1")];
        cache.put_items("u1", "p1", &a);
        cache.put_items("u1", "p1", &a);

        let meta = cache.metadata("u1").unwrap();
        assert_eq!(meta.card_count, 2);
        assert_eq!(meta.deck_ids(), BTreeSet::from(["p1".to_string()]));
    }

    #[test]
    fn test_get_items_concatenates_and_skips_missing() {
        let cache = cache();
        cache.put_items("u1", "p1", &[card("c1", "p1")]);
        cache.put_items("u1", "p2", &[card("c2", "p2"), card("c3", "p2")]);

        let got = cache.get_items("u1", &ids(&["p2", "missing", "p1"]));
        let got_ids: Vec<_> = got.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(got_ids, vec!["c2", "c3", "c1"]);
    }

    #[test]
    fn test_owners_do_not_leak() {
        let cache = cache();
        cache.put_items("u1", "p1", &[card("c1", "p1")]);
        cache.put_partitions("u1", &[deck("p1", 0)]);

        assert!(cache.get_items("u2", &ids(&["p1"])).is_empty());
        assert!(cache.get_partitions("u2").is_empty());
        assert!(cache.metadata("u2").is_none());
    }

    #[test]
    fn test_dangling_cards_are_pruned_on_write() {
        let cache = cache();
        let stored = cache
            .try_put_items("u1", "p1", &[card("c1", "p1"), card("c2", "other")])
            .unwrap();
        assert_eq!(stored, 1);
        assert_eq!(cache.get_items("u1", &ids(&["p1"])).len(), 1);
    }

    #[test]
    fn test_metadata_matches_live_entries() {
        let cache = cache();
        cache.put_items("u1", "p1", &[card("c1", "p1"), card("c2", "p1")]);
        cache.put_items("u1", "p2", &[card("c3", "p2")]);
        cache.put_items("u1", "p3", &[card("c4", "p3"), card("c5", "p3"), card("c6", "p3")]);
        cache.remove_partition("u1", "p2");
        cache.put_items("u1", "p1", &[card("c1", "p1")]);
        cache.remove_partition("u1", "never-cached");

        let meta = cache.metadata("u1").unwrap();
        let live: BTreeSet<String> = ["p1", "p2", "p3"]
            .into_iter()
            .filter(|d| !cache.get_items("u1", &ids(&[*d])).is_empty())
            .map(|d| d.to_string())
            .collect();
        assert_eq!(meta.deck_ids(), live);

        let total: usize = live
            .iter()
            .map(|d| cache.get_items("u1", &[d.clone()]).len())
            .sum();
        assert_eq!(meta.card_count, total);
        assert_eq!(meta.card_count, 4);
    }

    #[test]
    fn test_remove_item_twice_is_noop() {
        let cache = cache();
        cache.put_items("u1", "p1", &[card("c1", "p1"), card("c2", "p1")]);

        assert!(cache.remove_item("u1", "p1", "c1"));
        let after_first = cache.get_items("u1", &ids(&["p1"]));
        let meta_first = cache.metadata("u1").unwrap();

        assert!(!cache.remove_item("u1", "p1", "c1"));
        assert_eq!(cache.get_items("u1", &ids(&["p1"])), after_first);
        assert_eq!(cache.metadata("u1").unwrap().card_count, meta_first.card_count);
        assert_eq!(meta_first.card_count, 1);
    }

    #[test]
    fn test_upsert_item_replaces_by_id() {
        let cache = cache();
        cache.put_items("u1", "p1", &[card("c1", "p1")]);

        let mut edited = card("c1", "p1");
        edited.translated_text = "edited".to_string();
        cache.upsert_item("u1", &edited);
        cache.upsert_item("u1", &card("c2", "p1"));

        let cards = cache.get_items("u1", &ids(&["p1"]));
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].translated_text, "edited");
    }

    #[test]
    fn test_upsert_into_uncached_deck_creates_no_entry() {
        let cache = cache();
        assert!(!cache.try_upsert_item("u1", &card("c1", "p1")).unwrap());
        assert!(cache.get_items("u1", &ids(&["p1"])).is_empty());
        assert!(cache.metadata("u1").is_none());

        cache.put_items("u1", "p1", &[]);
        assert!(cache.try_upsert_item("u1", &card("c1", "p1")).unwrap());
        assert_eq!(cache.metadata("u1").unwrap().card_count, 1);
    }

    fn assert_metadata_consistent(cache: &CacheStore, decks: &[&str]) {
        let meta = cache.metadata("u1").unwrap_or_default();
        let live: BTreeMap<String, usize> = decks
            .iter()
            .filter_map(|d| {
                let entry = cache.load_entry("u1", d).unwrap()?;
                Some((d.to_string(), entry.len()))
            })
            .collect();
        assert_eq!(meta.decks, live);
        assert_eq!(meta.card_count, live.values().sum::<usize>());
    }

    #[test]
    fn test_failed_metadata_write_leaves_entry_untouched() {
        let store = Arc::new(FailingStore::new());
        let cache = CacheStore::new(store.clone());
        cache.put_items("u1", "p1", &[card("c1", "p1")]);

        store.fail_writes_to(Some("meta_"));
        assert!(cache
            .try_put_items("u1", "p2", &[card("c2", "p2"), card("c3", "p2")])
            .is_err());
        assert!(cache.try_remove_partition("u1", "p1").is_err());
        store.fail_writes_to(None);

        assert!(cache.get_items("u1", &ids(&["p2"])).is_empty());
        assert_eq!(cache.get_items("u1", &ids(&["p1"])).len(), 1);
        assert_metadata_consistent(&cache, &["p1", "p2"]);
    }

    #[test]
    fn test_failed_entry_write_rolls_back_metadata() {
        let store = Arc::new(FailingStore::new());
        let cache = CacheStore::new(store.clone());
        cache.put_items("u1", "p1", &[card("c1", "p1"), card("c2", "p1")]);

        store.fail_writes_to(Some("cards_"));
        assert!(cache.try_put_items("u1", "p2", &[card("c3", "p2")]).is_err());
        assert!(cache.try_put_items("u1", "p1", &[]).is_err());
        assert!(cache.try_remove_item("u1", "p1", "c1").is_err());
        assert!(cache.try_remove_partition("u1", "p1").is_err());
        store.fail_writes_to(None);

        assert_eq!(cache.get_items("u1", &ids(&["p1"])).len(), 2);
        assert_metadata_consistent(&cache, &["p1", "p2"]);
    }

    #[test]
    fn test_failed_first_write_leaves_no_metadata() {
        let store = Arc::new(FailingStore::new());
        let cache = CacheStore::new(store.clone());
        store.fail_writes_to(Some("cards_"));
        assert!(cache.try_put_items("u1", "p1", &[card("c1", "p1")]).is_err());
        assert!(cache.metadata("u1").is_none());
    }

    #[test]
    fn test_partitions_sorted_by_order_index() {
        let cache = cache();
        cache.put_partitions("u1", &[deck("b", 5), deck("a", 1), deck("c", 9)]);
        let order: Vec<_> = cache.get_partitions("u1").into_iter().map(|d| d.id).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_is_stale() {
        let cache = cache();
        assert!(cache.is_stale("u1", Duration::from_secs(3600)));

        cache.put_items("u1", "p1", &[card("c1", "p1")]);
        assert!(!cache.is_stale("u1", Duration::from_secs(3600)));
        assert_eq!(cache.cache_age("u1").as_deref(), Some("just now"));

        let mut meta = cache.metadata("u1").unwrap();
        meta.last_updated = Utc::now() - chrono::Duration::minutes(61);
        cache.save_metadata("u1", &meta).unwrap();
        assert!(cache.is_stale("u1", Duration::from_secs(3600)));
    }

    #[test]
    fn test_prune_orphans() {
        let cache = cache();
        cache.put_items("u1", "p1", &[card("c1", "p1")]);
        cache.put_items("u1", "gone", &[card("c2", "gone")]);

        // Deck list never cached: nothing to compare against
        assert_eq!(cache.prune_orphans("u1"), 0);

        cache.put_partitions("u1", &[deck("p1", 0)]);
        assert_eq!(cache.prune_orphans("u1"), 1);
        assert!(cache.get_items("u1", &ids(&["gone"])).is_empty());
        assert_eq!(cache.metadata("u1").unwrap().card_count, 1);
    }

    #[test]
    fn test_clear_owner() {
        let cache = cache();
        cache.put_items("u1", "p1", &[card("c1", "p1")]);
        cache.put_partitions("u1", &[deck("p1", 0)]);
        cache.put_items("u2", "p1", &[card("c9", "p1")]);

        cache.clear_owner("u1");
        assert!(cache.metadata("u1").is_none());
        assert!(cache.get_partitions("u1").is_empty());
        assert_eq!(cache.get_items("u2", &ids(&["p1"])).len(), 1);
    }

    #[test]
    fn test_storage_failures_degrade_quietly() {
        let store = Arc::new(FailingStore::new());
        let cache = CacheStore::new(store.clone());
        cache.put_items("u1", "p1", &[card("c1", "p1")]);

        store.fail_reads(true);
        assert!(cache.get_items("u1", &ids(&["p1"])).is_empty());
        assert!(cache.get_partitions("u1").is_empty());
        assert!(cache.is_stale("u1", Duration::from_secs(60)));

        store.fail_reads(false);
        store.fail_writes(true);
        cache.put_items("u1", "p1", &[card("c2", "p1")]);
        assert!(cache.try_put_items("u1", "p1", &[]).is_err());
        assert_eq!(cache.get_items("u1", &ids(&["p1"]))[0].id, "c1");
    }

    #[test]
    fn test_corrupt_entry_reads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(&cards_key("u1", "p1"), "{not json").unwrap();
        let cache = CacheStore::new(store);
        assert!(cache.get_items("u1", &ids(&["p1"])).is_empty());
        assert!(cache.try_get_items("u1", &ids(&["p1"])).is_err());
    }

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new("u1", "p1", vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
        assert!(cached.age_minutes() <= 1);
    }
}
