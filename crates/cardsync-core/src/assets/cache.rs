use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::AssetFetcher;
use crate::cache::keys::assets_key;
use crate::cache::CacheStore;
use crate::error::StorageError;
use crate::network::NetworkMonitor;
use crate::store::KeyValueStore;
use crate::tasks::Supervisor;
use crate::utils::fs::{file_size, list_dir, remove_dir_if_exists, write_atomic};
use crate::utils::{encode_component, remove_file_if_exists};

/// Longest URL-derived tail kept in a local file name.
const MAX_NAME_TAIL: usize = 64;

/// Hex characters of the URL hash used as the file name prefix.
const HASH_PREFIX_LEN: usize = 16;

/// Persisted URL to file mapping for one owner.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AssetIndex {
    owner: String,
    entries: BTreeMap<String, PathBuf>,
    updated_at: Option<DateTime<Utc>>,
}

/// Downloads images referenced by cached cards and serves them from disk.
pub struct AssetCache {
    root: PathBuf,
    store: Arc<dyn KeyValueStore>,
    cache: Arc<CacheStore>,
    fetcher: Arc<dyn AssetFetcher>,
    network: Arc<NetworkMonitor>,
    // Serializes read-modify-write of the index
    index_lock: Mutex<()>,
}

impl AssetCache {
    pub fn new(
        root: PathBuf,
        store: Arc<dyn KeyValueStore>,
        cache: Arc<CacheStore>,
        fetcher: Arc<dyn AssetFetcher>,
        network: Arc<NetworkMonitor>,
    ) -> Self {
        Self {
            root,
            store,
            cache,
            fetcher,
            network,
            index_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner: &str) -> PathBuf {
        self.root.join(encode_component(owner))
    }

    fn file_path(&self, owner: &str, url: &str) -> PathBuf {
        self.owner_dir(owner).join(sanitized_file_name(url))
    }

    // ===== Index =====

    fn load_index(&self, owner: &str) -> AssetIndex {
        match self.try_load_index(owner) {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, owner, "Failed to read asset index, starting empty");
                AssetIndex::empty(owner)
            }
        }
    }

    fn try_load_index(&self, owner: &str) -> Result<AssetIndex, StorageError> {
        let key = assets_key(owner);
        let Some(contents) = self.store.get(&key)? else {
            return Ok(AssetIndex::empty(owner));
        };
        let index: AssetIndex = serde_json::from_str(&contents)
            .map_err(|source| StorageError::Deserialize { key, source })?;
        if index.owner != owner {
            warn!(owner, stored = %index.owner, "Asset index belongs to another owner, ignoring");
            return Ok(AssetIndex::empty(owner));
        }
        Ok(index)
    }

    fn save_index(&self, index: &mut AssetIndex) -> Result<(), StorageError> {
        let key = assets_key(&index.owner);
        index.updated_at = Some(Utc::now());
        let contents = serde_json::to_string(index)
            .map_err(|source| StorageError::Serialize { key: key.clone(), source })?;
        self.store.set(&key, &contents)
    }

    async fn record(&self, owner: &str, url: &str, path: &Path) -> Result<(), StorageError> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.load_index(owner);
        index.entries.insert(mapping_key(url), path.to_path_buf());
        self.save_index(&mut index)
    }

    // ===== Lookup & download =====

    /// Mapped local file for `url`, if it is still on disk.
    pub fn local_path(&self, owner: &str, url: &str) -> Option<PathBuf> {
        self.load_index(owner)
            .entries
            .get(&mapping_key(url))
            .filter(|path| path.is_file())
            .cloned()
    }

    /// Local path for `url`, downloading it first if needed. Falls back to
    /// returning `url` unchanged when offline or when the download fails.
    pub async fn ensure(&self, owner: &str, url: &str) -> String {
        if !is_remote(url) {
            return url.to_string();
        }
        if let Some(path) = self.local_path(owner, url) {
            return path.to_string_lossy().into_owned();
        }
        if !self.network.snapshot() {
            debug!(owner, "Offline, serving asset from its remote URL");
            return url.to_string();
        }

        match self.download(owner, url).await {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(error = %format!("{:#}", e), owner, "Asset download failed, using remote URL");
                url.to_string()
            }
        }
    }

    async fn download(&self, owner: &str, url: &str) -> anyhow::Result<PathBuf> {
        let bytes = self.fetcher.fetch(url).await.context("Failed to fetch asset")?;
        let path = self.file_path(owner, url);

        let target = path.clone();
        let size = bytes.len();
        tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
            .await
            .context("Asset write task failed")?
            .with_context(|| format!("Failed to write {}", path.display()))?;

        self.record(owner, url, &path)
            .await
            .context("Failed to record asset mapping")?;
        debug!(owner, path = %path.display(), size, "Cached asset");
        Ok(path)
    }

    /// Ensure each URL in turn. Returns how many are now served locally.
    pub async fn batch_ensure(&self, owner: &str, urls: &[String]) -> usize {
        let mut local = 0;
        for url in urls {
            let resolved = self.ensure(owner, url).await;
            if resolved != *url || !is_remote(url) {
                local += 1;
            }
        }
        debug!(owner, requested = urls.len(), local, "Asset batch finished");
        local
    }

    /// Run [`batch_ensure`](Self::batch_ensure) in the background.
    pub fn spawn_batch_ensure(self: &Arc<Self>, supervisor: &Supervisor, owner: &str, urls: Vec<String>) {
        let urls: Vec<String> = urls.into_iter().filter(|u| is_remote(u)).collect();
        if urls.is_empty() {
            return;
        }
        let assets = Arc::clone(self);
        let owner = owner.to_string();
        supervisor.spawn(format!("asset-batch:{}", owner), async move {
            assets.batch_ensure(&owner, &urls).await;
            Ok(())
        });
    }

    /// Copy a file that was just uploaded under `url`, so the asset is local
    /// without a download.
    pub async fn adopt(&self, owner: &str, url: &str, local: &Path) -> anyhow::Result<PathBuf> {
        let path = self.file_path(owner, url);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::copy(local, &path)
            .await
            .with_context(|| format!("Failed to copy {} into asset cache", local.display()))?;
        self.record(owner, url, &path).await?;
        Ok(path)
    }

    /// Warm the cache with every image referenced by the owner's cached cards.
    pub async fn warm_owner(&self, owner: &str) -> usize {
        let deck_ids: Vec<String> = self
            .cache
            .get_partitions(owner)
            .into_iter()
            .map(|deck| deck.id)
            .collect();
        let urls: Vec<String> = self
            .cache
            .get_items(owner, &deck_ids)
            .into_iter()
            .filter_map(|card| card.image_url)
            .filter(|url| is_remote(url))
            .collect();
        self.batch_ensure(owner, &urls).await
    }

    // ===== Purge =====

    /// Drop the mapping for `url`, deleting the file too when asked.
    /// Returns whether a mapping existed.
    pub async fn purge(&self, owner: &str, url: &str, delete_file: bool) -> bool {
        let _guard = self.index_lock.lock().await;
        let mut index = self.load_index(owner);
        let Some(path) = index.entries.remove(&mapping_key(url)) else {
            return false;
        };
        if let Err(e) = self.save_index(&mut index) {
            warn!(error = %e, owner, "Failed to save asset index after purge");
        }
        if delete_file {
            if let Err(e) = remove_file_if_exists(&path) {
                warn!(error = %e, path = %path.display(), "Failed to delete cached asset");
            }
        }
        true
    }

    /// Remove every asset file scoped to `owner` and the owner's mapping.
    pub async fn purge_all(&self, owner: &str) -> anyhow::Result<usize> {
        let _guard = self.index_lock.lock().await;
        let dir = self.owner_dir(owner);
        let files = list_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .len();
        remove_dir_if_exists(&dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
        self.store
            .remove(&assets_key(owner))
            .context("Failed to remove asset index")?;
        info!(owner, files, "Purged cached assets");
        Ok(files)
    }

    /// Number of mapped assets and bytes on disk for `owner`.
    pub fn usage(&self, owner: &str) -> (usize, u64) {
        let index = self.load_index(owner);
        let bytes = list_dir(&self.owner_dir(owner))
            .unwrap_or_default()
            .iter()
            .map(|p| file_size(p))
            .sum();
        (index.entries.len(), bytes)
    }
}

impl AssetIndex {
    fn empty(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            ..Default::default()
        }
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// Signed URLs change their query on every signing, so mappings are keyed
/// by the URL without query or fragment.
fn mapping_key(url: &str) -> String {
    url.split(['?', '#']).next().unwrap_or(url).to_string()
}

/// Deterministic local file name: a hash of the stable URL plus a readable,
/// sanitized copy of its last path segment.
pub fn sanitized_file_name(url: &str) -> String {
    let stable = mapping_key(url);
    let hash = blake3::hash(stable.as_bytes()).to_hex();
    let tail: String = stable
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_TAIL)
        .collect();
    let tail = tail.trim_start_matches('.');

    if tail.is_empty() {
        hash[..HASH_PREFIX_LEN].to_string()
    } else {
        format!("{}_{}", &hash[..HASH_PREFIX_LEN], tail)
    }
}
