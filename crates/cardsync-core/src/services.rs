//! Process-wide wiring of the cache and sync components.
//!
//! Every component is constructed once here and injected into the ones that
//! depend on it; nothing is global. Tests assemble the same graph from fakes.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::access::{AccessSettings, DataAccess};
use crate::assets::{AssetCache, AssetFetcher, HttpFetcher};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::guard::ResourceGuard;
use crate::identity::{FixedIdentity, IdentityProvider, SessionIdentity};
use crate::network::{ConnectivityProbe, HttpProbe, NetworkMonitor};
use crate::remote::{RemoteStore, RestRemote};
use crate::store::{FileStore, KeyValueStore};
use crate::sync::SyncCoordinator;
use crate::tasks::Supervisor;

/// External collaborators the core is built on.
pub struct Collaborators {
    pub remote: Arc<dyn RemoteStore>,
    pub identity: Arc<dyn IdentityProvider>,
    /// `None` leaves the monitor driven by `set_online` only.
    pub probe: Option<Arc<dyn ConnectivityProbe>>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub store: Arc<dyn KeyValueStore>,
}

pub struct Services {
    pub network: Arc<NetworkMonitor>,
    pub cache: Arc<CacheStore>,
    pub assets: Arc<AssetCache>,
    pub guard: Arc<ResourceGuard>,
    pub supervisor: Arc<Supervisor>,
    pub access: DataAccess,
    pub sync: Arc<SyncCoordinator>,
    /// Present when the identity comes from the persisted session.
    pub session: Option<Arc<SessionIdentity>>,
}

impl Services {
    /// Production graph: REST remote, file-backed store, HTTP probe.
    /// Must be called inside a Tokio runtime.
    pub fn from_config(config: &Config) -> Result<Self> {
        let remote_url = config
            .remote_url
            .as_deref()
            .context("No remote URL configured (set remote_url or CARDSYNC_REMOTE_URL)")?;
        let api_key = config
            .api_key
            .as_deref()
            .context("No API key configured (set api_key or CARDSYNC_API_KEY)")?;

        let session = Arc::new(SessionIdentity::new(config.session_dir()?));
        let mut remote = RestRemote::with_timeout(
            remote_url,
            api_key,
            &config.asset_bucket,
            config.request_timeout(),
        )?;
        if let Some(token) = session.token() {
            remote = remote.with_token(token);
        }

        // A configured owner only stands in until a session exists
        let configured_owner = config
            .owner_id
            .clone()
            .filter(|_| session.offline_owner().is_none());
        let (identity, session): (Arc<dyn IdentityProvider>, Option<Arc<SessionIdentity>>) =
            match configured_owner {
                Some(owner) => {
                    debug!(owner, "Using configured owner");
                    let fixed: Arc<dyn IdentityProvider> = Arc::new(FixedIdentity::new(owner));
                    (fixed, None)
                }
                None => {
                    let shared: Arc<dyn IdentityProvider> = session.clone();
                    (shared, Some(session))
                }
            };

        let probe = match config.probe_target() {
            Some(url) => {
                let probe: Arc<dyn ConnectivityProbe> =
                    Arc::new(HttpProbe::new(url, config.probe_timeout())?);
                Some(probe)
            }
            None => None,
        };

        let collaborators = Collaborators {
            remote: Arc::new(remote),
            identity,
            probe,
            fetcher: Arc::new(HttpFetcher::new(
                config.request_timeout(),
                config.max_asset_bytes,
            )?),
            store: Arc::new(FileStore::new(config.store_dir()?)?),
        };
        let mut services = Self::assemble(config, collaborators)?;
        services.session = session;
        Ok(services)
    }

    /// Build the component graph on top of the given collaborators.
    /// Must be called inside a Tokio runtime.
    pub fn assemble(config: &Config, collaborators: Collaborators) -> Result<Self> {
        let network = Arc::new(match collaborators.probe {
            Some(probe) => NetworkMonitor::with_probe(probe, config.probe_timeout()),
            None => NetworkMonitor::manual(true),
        });
        let cache = Arc::new(CacheStore::new(collaborators.store.clone()));
        let assets = Arc::new(AssetCache::new(
            config.assets_dir()?,
            collaborators.store,
            cache.clone(),
            collaborators.fetcher,
            network.clone(),
        ));
        let guard = Arc::new(ResourceGuard::new(config.guard_config()?));
        let supervisor = Supervisor::start();

        let settings = AccessSettings {
            fetch_timeout: config.request_timeout(),
            max_asset_bytes: config.max_asset_bytes,
            ..Default::default()
        };
        let access = DataAccess::new(
            collaborators.remote,
            collaborators.identity,
            network.clone(),
            cache.clone(),
            assets.clone(),
            supervisor.clone(),
            settings,
        );
        let sync = Arc::new(SyncCoordinator::new(access.clone()));

        Ok(Self {
            network,
            cache,
            assets,
            guard,
            supervisor,
            access,
            sync,
            session: None,
        })
    }

    /// Wait for background refreshes and asset downloads to finish.
    pub async fn shutdown(&self) {
        self.supervisor.drain().await;
        debug!(
            completed = self.supervisor.completed(),
            failed = self.supervisor.failed(),
            "Background tasks drained"
        );
    }
}
