use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Platform connectivity primitive.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// `Ok(false)` means the device is offline; `Err` means the check
    /// itself could not be performed.
    async fn probe(&self) -> Result<bool>;
}

/// Probes connectivity with a HEAD request to a known endpoint.
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build probe HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> Result<bool> {
        match self.client.head(&self.url).send().await {
            // Any HTTP answer, even an error status, proves the network is up
            Ok(_) => Ok(true),
            Err(e) if e.is_connect() || e.is_timeout() => Ok(false),
            Err(e) => Err(e).context("Connectivity probe failed"),
        }
    }
}
