//! Identity provider: who owns the data being read and written.
//!
//! - `SessionIdentity`: session persisted to disk with expiry; its last
//!   owner stays available offline after the session lapses
//! - `FixedIdentity`: a constant owner, for tools and tests

pub mod session;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

pub use session::{SessionData, SessionIdentity};

use crate::network::NetworkMonitor;
use crate::remote::ApiError;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Owner of the current online session, if any.
    async fn current_owner(&self) -> Result<Option<String>, ApiError>;

    /// Owner persisted by an earlier session, usable without connectivity.
    fn offline_owner(&self) -> Option<String>;
}

pub struct FixedIdentity {
    owner: String,
}

impl FixedIdentity {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FixedIdentity {
    async fn current_owner(&self) -> Result<Option<String>, ApiError> {
        Ok(Some(self.owner.clone()))
    }

    fn offline_owner(&self) -> Option<String> {
        Some(self.owner.clone())
    }
}

/// Current owner when online and resolvable, else the persisted offline owner.
pub async fn resolve_owner(
    identity: &dyn IdentityProvider,
    network: &NetworkMonitor,
    timeout: Duration,
) -> Option<String> {
    if network.snapshot() {
        match tokio::time::timeout(timeout, identity.current_owner()).await {
            Ok(Ok(Some(owner))) => return Some(owner),
            Ok(Ok(None)) => debug!("No online session, using offline identity"),
            Ok(Err(e)) => debug!(error = %e, "Identity lookup failed, using offline identity"),
            Err(_) => debug!("Identity lookup timed out, using offline identity"),
        }
    }
    identity.offline_owner()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unreachable;

    #[async_trait]
    impl IdentityProvider for Unreachable {
        async fn current_owner(&self) -> Result<Option<String>, ApiError> {
            Err(ApiError::Offline)
        }

        fn offline_owner(&self) -> Option<String> {
            Some("persisted".to_string())
        }
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_offline_owner() {
        let network = NetworkMonitor::manual(true);
        let owner = resolve_owner(&Unreachable, &network, Duration::from_secs(1)).await;
        assert_eq!(owner.as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn test_resolve_offline_skips_online_lookup() {
        let network = NetworkMonitor::manual(false);
        let identity = FixedIdentity::new("u1");
        let owner = resolve_owner(&identity, &network, Duration::from_secs(1)).await;
        assert_eq!(owner.as_deref(), Some("u1"));
    }
}
