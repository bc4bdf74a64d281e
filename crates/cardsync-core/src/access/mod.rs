//! Cache-first read/write facade.
//!
//! Every higher-level feature goes through [`DataAccess`]:
//! - reads answer from the local cache first and refresh it in the
//!   background, falling back to a synchronous fetch only on a miss
//! - writes go to the remote first, then update the affected deck's
//!   cache entry synchronously
//!
//! This is the only layer that turns connectivity errors into cache
//! fallbacks.

mod read;
mod write;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::assets::AssetCache;
use crate::cache::CacheStore;
use crate::error::Error;
use crate::identity::{resolve_owner, IdentityProvider};
use crate::models::Card;
use crate::network::NetworkMonitor;
use crate::remote::{ApiError, RemoteStore};
use crate::tasks::Supervisor;
use crate::token::{OpToken, OperationTokens};

/// Default bound on a single remote fetch.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on the online identity lookup.
const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(3);

/// Default largest image accepted for upload (10 MiB).
const DEFAULT_MAX_ASSET_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AccessSettings {
    pub fetch_timeout: Duration,
    pub identity_timeout: Duration,
    pub max_asset_bytes: u64,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            identity_timeout: DEFAULT_IDENTITY_TIMEOUT,
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
        }
    }
}

/// Cards loaded for a selection change, tagged with the selection's token.
#[derive(Debug, Clone)]
pub struct Selection {
    pub token: OpToken,
    pub deck_ids: Vec<String>,
    /// Empty when a newer selection superseded this one mid-fetch.
    pub cards: Vec<Card>,
}

/// Clone is cheap; every component is behind an `Arc`.
#[derive(Clone)]
pub struct DataAccess {
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    network: Arc<NetworkMonitor>,
    cache: Arc<CacheStore>,
    assets: Arc<AssetCache>,
    supervisor: Arc<Supervisor>,
    tokens: Arc<OperationTokens>,
    settings: AccessSettings,
}

impl DataAccess {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        network: Arc<NetworkMonitor>,
        cache: Arc<CacheStore>,
        assets: Arc<AssetCache>,
        supervisor: Arc<Supervisor>,
        settings: AccessSettings,
    ) -> Self {
        Self {
            remote,
            identity,
            network,
            cache,
            assets,
            supervisor,
            tokens: Arc::new(OperationTokens::new()),
            settings,
        }
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn assets(&self) -> &Arc<AssetCache> {
        &self.assets
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub fn tokens(&self) -> &Arc<OperationTokens> {
        &self.tokens
    }

    /// Owner of the data, resolved online when possible.
    pub async fn owner(&self) -> Option<String> {
        resolve_owner(
            self.identity.as_ref(),
            &self.network,
            self.settings.identity_timeout,
        )
        .await
    }

    /// Run a remote call under the fetch timeout. Expiry is a connectivity
    /// failure like any other.
    async fn remote_call<T>(
        &self,
        call: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        tokio::time::timeout(self.settings.fetch_timeout, call)
            .await
            .unwrap_or(Err(ApiError::Timeout))
    }
}

/// Writes report a lost connection as "requires connectivity", never as a
/// generic failure.
fn classify_write_error(err: ApiError) -> Error {
    if err.is_connectivity() {
        Error::RequiresConnectivity
    } else {
        Error::Remote(err)
    }
}

#[cfg(test)]
pub(crate) mod harness {
    use super::*;
    use crate::identity::FixedIdentity;
    use crate::test_utils::{FailingStore, ScriptedRemote, StaticFetcher};
    use tempfile::TempDir;

    pub const OWNER: &str = "u1";

    pub struct Harness {
        pub dir: TempDir,
        pub remote: Arc<ScriptedRemote>,
        pub network: Arc<NetworkMonitor>,
        pub store: Arc<FailingStore>,
        pub fetcher: Arc<StaticFetcher>,
        pub access: DataAccess,
    }

    impl Harness {
        /// Must be called inside a Tokio runtime.
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let remote = Arc::new(ScriptedRemote::new());
            let network = Arc::new(NetworkMonitor::manual(true));
            let store = Arc::new(FailingStore::new());
            let cache = Arc::new(CacheStore::new(store.clone()));
            let fetcher = Arc::new(StaticFetcher::new(b"img".to_vec()));
            let assets = Arc::new(AssetCache::new(
                dir.path().join("assets"),
                store.clone(),
                cache.clone(),
                fetcher.clone(),
                network.clone(),
            ));
            let settings = AccessSettings {
                fetch_timeout: Duration::from_millis(500),
                identity_timeout: Duration::from_millis(100),
                max_asset_bytes: 1024,
            };
            let access = DataAccess::new(
                remote.clone(),
                Arc::new(FixedIdentity::new(OWNER)),
                network.clone(),
                cache,
                assets,
                Supervisor::start(),
                settings,
            );
            Self {
                dir,
                remote,
                network,
                store,
                fetcher,
                access,
            }
        }

        pub fn cache(&self) -> &CacheStore {
            &self.access.cache
        }

        pub fn assets(&self) -> &AssetCache {
            &self.access.assets
        }

        pub async fn settle(&self) {
            self.access.supervisor.drain().await;
        }
    }

    pub fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }
}
