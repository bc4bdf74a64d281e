//! Fakes shared by the unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::assets::AssetFetcher;
use crate::error::StorageError;
use crate::models::{Card, Deck, DeckChanges};
use crate::network::ConnectivityProbe;
use crate::remote::{ApiError, CardDraft, CardRecord, DeckDraft, DeckRecord, RemoteStore};
use crate::store::{KeyValueStore, MemoryStore};

pub fn card(id: &str, deck_id: &str) -> Card {
    Card {
        id: id.to_string(),
        deck_id: deck_id.to_string(),
        original_text: format!("text {}", id),
        furigana_text: String::new(),
        translated_text: format!("translation {}", id),
        language: "ja".to_string(),
        image_url: None,
        analysis: None,
        created_at: Utc::now(),
    }
}

pub fn deck(id: &str, order_index: i64) -> Deck {
    Deck {
        id: id.to_string(),
        name: format!("Deck {}", id),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        order_index,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ===== Storage =====

/// Memory store whose reads and writes can be switched to fail.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_prefix: Mutex<Option<String>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail only writes and removes of keys starting with `prefix`.
    pub fn fail_writes_to(&self, prefix: Option<&str>) {
        *lock(&self.failing_prefix) = prefix.map(str::to_string);
    }

    fn write_fails(&self, key: &str) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
            || lock(&self.failing_prefix)
                .as_deref()
                .is_some_and(|prefix| key.starts_with(prefix))
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("read {}", key)));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.write_fails(key) {
            return Err(StorageError::Unavailable(format!("write {}", key)));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.write_fails(key) {
            return Err(StorageError::Unavailable(format!("remove {}", key)));
        }
        self.inner.remove(key)
    }
}

// ===== Connectivity =====

enum ProbeScript {
    Answer(bool),
    Fail,
    Hang,
}

pub struct ScriptedProbe {
    script: Mutex<ProbeScript>,
}

impl ScriptedProbe {
    pub fn answering(online: bool) -> Self {
        Self {
            script: Mutex::new(ProbeScript::Answer(online)),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Mutex::new(ProbeScript::Fail),
        }
    }

    pub fn hanging() -> Self {
        Self {
            script: Mutex::new(ProbeScript::Hang),
        }
    }

    pub fn set_answer(&self, online: bool) {
        *lock(&self.script) = ProbeScript::Answer(online);
    }
}

#[async_trait]
impl ConnectivityProbe for ScriptedProbe {
    async fn probe(&self) -> anyhow::Result<bool> {
        let answer = match &*lock(&self.script) {
            ProbeScript::Answer(online) => Some(*online),
            ProbeScript::Fail => anyhow::bail!("probe socket error"),
            ProbeScript::Hang => None,
        };
        match answer {
            Some(online) => Ok(online),
            None => std::future::pending().await,
        }
    }
}

// ===== Remote =====

/// Failure a [`ScriptedRemote`] returns from every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteFailure {
    Offline,
    Timeout,
    Unauthorized,
}

impl RemoteFailure {
    fn to_error(self) -> ApiError {
        match self {
            RemoteFailure::Offline => ApiError::Offline,
            RemoteFailure::Timeout => ApiError::Timeout,
            RemoteFailure::Unauthorized => ApiError::Unauthorized,
        }
    }
}

#[derive(Default)]
struct RemoteState {
    decks: Vec<DeckRecord>,
    cards: Vec<CardRecord>,
    uploads: Vec<String>,
    deleted_assets: Vec<String>,
    next_id: usize,
}

impl RemoteState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// In-memory remote with call counters, injectable latency and failures.
#[derive(Default)]
pub struct ScriptedRemote {
    state: Mutex<RemoteState>,
    latency: Mutex<Duration>,
    failure: Mutex<Option<RemoteFailure>>,
    create_item_failure: Mutex<Option<RemoteFailure>>,
    failing_deck_update: Mutex<Option<(String, RemoteFailure)>>,
    list_partitions_calls: AtomicUsize,
    list_items_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to calls that start after this is set.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    pub fn set_failure(&self, failure: Option<RemoteFailure>) {
        *lock(&self.failure) = failure;
    }

    /// Failure returned only by `create_item`, after any upload succeeded.
    pub fn fail_create_item(&self, failure: Option<RemoteFailure>) {
        *lock(&self.create_item_failure) = failure;
    }

    /// Failure returned only by `update_partition` of `deck_id`.
    pub fn fail_deck_update(&self, deck_id: &str, failure: RemoteFailure) {
        *lock(&self.failing_deck_update) = Some((deck_id.to_string(), failure));
    }

    pub fn deck_order(&self, deck_id: &str) -> Option<i64> {
        lock(&self.state)
            .decks
            .iter()
            .find(|d| d.id == deck_id)
            .and_then(|d| d.order_index)
    }

    pub fn seed_deck(&self, owner: &str, id: &str, order_index: i64) {
        lock(&self.state).decks.push(DeckRecord {
            id: id.to_string(),
            user_id: owner.to_string(),
            name: format!("Deck {}", id),
            created_at: Utc::now(),
            updated_at: None,
            order_index: Some(order_index),
        });
    }

    pub fn seed_card(&self, id: &str, deck_id: &str, image_url: Option<&str>) {
        lock(&self.state).cards.push(CardRecord {
            id: id.to_string(),
            deck_id: deck_id.to_string(),
            original_text: format!("text {}", id),
            furigana_text: None,
            translated_text: Some(format!("translation {}", id)),
            language: Some("ja".to_string()),
            image_url: image_url.map(str::to_string),
            analysis: None,
            created_at: Utc::now(),
        });
    }

    pub fn list_partitions_calls(&self) -> usize {
        self.list_partitions_calls.load(Ordering::SeqCst)
    }

    pub fn list_items_calls(&self) -> usize {
        self.list_items_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.list_partitions_calls() + self.list_items_calls()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn deck_ids(&self) -> Vec<String> {
        lock(&self.state).decks.iter().map(|d| d.id.clone()).collect()
    }

    pub fn card_ids(&self, deck_id: &str) -> Vec<String> {
        lock(&self.state)
            .cards
            .iter()
            .filter(|c| c.deck_id == deck_id)
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn uploads(&self) -> Vec<String> {
        lock(&self.state).uploads.clone()
    }

    pub fn deleted_assets(&self) -> Vec<String> {
        lock(&self.state).deleted_assets.clone()
    }

    async fn enter(&self) -> Result<(), ApiError> {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match *lock(&self.failure) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    async fn enter_write(&self) -> Result<(), ApiError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn list_partitions(&self, owner: &str) -> Result<Vec<DeckRecord>, ApiError> {
        self.list_partitions_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        let mut decks: Vec<DeckRecord> = lock(&self.state)
            .decks
            .iter()
            .filter(|d| d.user_id == owner)
            .cloned()
            .collect();
        decks.sort_by_key(|d| d.order_index);
        Ok(decks)
    }

    async fn list_items(
        &self,
        _owner: &str,
        deck_ids: &[String],
    ) -> Result<Vec<CardRecord>, ApiError> {
        self.list_items_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        Ok(lock(&self.state)
            .cards
            .iter()
            .filter(|c| deck_ids.contains(&c.deck_id))
            .cloned()
            .collect())
    }

    async fn create_partition(
        &self,
        owner: &str,
        draft: &DeckDraft,
    ) -> Result<DeckRecord, ApiError> {
        self.enter_write().await?;
        let mut state = lock(&self.state);
        let record = DeckRecord {
            id: state.next_id("deck"),
            user_id: owner.to_string(),
            name: draft.name.clone(),
            created_at: Utc::now(),
            updated_at: None,
            order_index: Some(draft.order_index),
        };
        state.decks.push(record.clone());
        Ok(record)
    }

    async fn update_partition(
        &self,
        _owner: &str,
        deck_id: &str,
        changes: &DeckChanges,
    ) -> Result<DeckRecord, ApiError> {
        self.enter_write().await?;
        if let Some((failing, failure)) = &*lock(&self.failing_deck_update) {
            if failing == deck_id {
                return Err(failure.to_error());
            }
        }
        let mut state = lock(&self.state);
        let record = state
            .decks
            .iter_mut()
            .find(|d| d.id == deck_id)
            .ok_or_else(|| ApiError::NotFound(deck_id.to_string()))?;
        if let Some(name) = &changes.name {
            record.name = name.clone();
        }
        if let Some(order_index) = changes.order_index {
            record.order_index = Some(order_index);
        }
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn delete_partition(&self, _owner: &str, deck_id: &str) -> Result<(), ApiError> {
        self.enter_write().await?;
        let mut state = lock(&self.state);
        state.decks.retain(|d| d.id != deck_id);
        state.cards.retain(|c| c.deck_id != deck_id);
        Ok(())
    }

    async fn create_item(&self, _owner: &str, draft: &CardDraft) -> Result<CardRecord, ApiError> {
        self.enter_write().await?;
        if let Some(failure) = *lock(&self.create_item_failure) {
            return Err(failure.to_error());
        }
        let mut state = lock(&self.state);
        let record = CardRecord {
            id: state.next_id("card"),
            deck_id: draft.deck_id.clone(),
            original_text: draft.original_text.clone(),
            furigana_text: Some(draft.furigana_text.clone()),
            translated_text: Some(draft.translated_text.clone()),
            language: Some(draft.language.clone()),
            image_url: draft.image_url.clone(),
            analysis: draft.analysis.clone(),
            created_at: Utc::now(),
        };
        state.cards.push(record.clone());
        Ok(record)
    }

    async fn update_item(&self, _owner: &str, card: &Card) -> Result<CardRecord, ApiError> {
        self.enter_write().await?;
        let mut state = lock(&self.state);
        let record = state
            .cards
            .iter_mut()
            .find(|c| c.id == card.id)
            .ok_or_else(|| ApiError::NotFound(card.id.clone()))?;
        record.deck_id = card.deck_id.clone();
        record.original_text = card.original_text.clone();
        record.furigana_text = Some(card.furigana_text.clone());
        record.translated_text = Some(card.translated_text.clone());
        record.language = Some(card.language.clone());
        record.image_url = card.image_url.clone();
        record.analysis = card.analysis.clone();
        Ok(record.clone())
    }

    async fn delete_item(&self, _owner: &str, card_id: &str) -> Result<(), ApiError> {
        self.enter_write().await?;
        lock(&self.state).cards.retain(|c| c.id != card_id);
        Ok(())
    }

    async fn upload_asset(&self, owner: &str, local_path: &Path) -> Result<String, ApiError> {
        self.enter_write().await?;
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.jpg")
            .to_string();
        let mut state = lock(&self.state);
        let object = state.next_id("obj");
        let url = format!(
            "https://remote.test/storage/v1/object/sign/images/{}/{}_{}?token=t",
            owner, object, name
        );
        state.uploads.push(url.clone());
        Ok(url)
    }

    async fn delete_asset(&self, url: &str) -> Result<(), ApiError> {
        self.enter_write().await?;
        lock(&self.state).deleted_assets.push(url.to_string());
        Ok(())
    }
}

// ===== Assets =====

pub struct StaticFetcher {
    bytes: Vec<u8>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl StaticFetcher {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::NotFound(url.to_string()));
        }
        Ok(self.bytes.clone())
    }
}
