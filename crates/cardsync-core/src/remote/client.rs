//! HTTP client for the hosted deck/card gateway.
//!
//! Tables are exposed as REST resources under `/rest/v1`, binaries under
//! `/storage/v1/object`. Uploaded assets are returned as signed URLs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{ApiError, CardDraft, CardRecord, DeckDraft, DeckRecord, RemoteStore};
use crate::models::{Card, DeckChanges};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Lifetime of signed asset URLs (one year).
const SIGNED_URL_TTL_SECS: u64 = 60 * 60 * 24 * 365;

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// REST client for the remote store.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestRemote {
    client: Client,
    base_url: String,
    api_key: Arc<String>,
    bucket: String,
    token: Option<Arc<String>>,
}

impl RestRemote {
    pub fn new(base_url: &str, api_key: &str, bucket: &str) -> anyhow::Result<Self> {
        Self::with_timeout(
            base_url,
            api_key,
            bucket,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        bucket: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: Arc::new(api_key.to_string()),
            bucket: bucket.to_string(),
            token: None,
        })
    }

    /// Create a new client carrying a user access token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(Arc::new(token.into())),
            ..self.clone()
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        let bearer: &str = self.token.as_deref().map_or(self.api_key.as_str(), String::as_str);
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&self.api_key)
                .map_err(|e| ApiError::InvalidResponse(format!("Invalid API key header: {}", e)))?,
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|e| ApiError::InvalidResponse(format!("Invalid token header: {}", e)))?,
        );
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().headers(self.auth_headers()?).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let url = response.url().to_string();
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", url, e)))
    }

    /// Rows endpoints return arrays even for single-row writes.
    async fn single<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let rows: Vec<T> = Self::json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidResponse("Expected one row, got none".to_string()))
    }

    async fn sign_object(&self, object_path: &str) -> Result<String, ApiError> {
        let url = self.storage_url(&format!("object/sign/{}/{}", self.bucket, object_path));
        let body = json!({ "expiresIn": SIGNED_URL_TTL_SECS });
        let response = self.send(|| self.client.post(&url).json(&body)).await?;
        let signed: SignedUrlResponse = Self::json(response).await?;
        Ok(self.storage_url(&signed.signed_url))
    }
}

#[async_trait]
impl RemoteStore for RestRemote {
    async fn list_partitions(&self, owner: &str) -> Result<Vec<DeckRecord>, ApiError> {
        let url = self.rest_url("decks");
        let query = [
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", owner)),
            ("order", "order_index.asc".to_string()),
        ];
        let response = self.send(|| self.client.get(&url).query(&query)).await?;
        let decks: Vec<DeckRecord> = Self::json(response).await?;
        debug!(owner, count = decks.len(), "Fetched decks");
        Ok(decks)
    }

    async fn list_items(
        &self,
        owner: &str,
        deck_ids: &[String],
    ) -> Result<Vec<CardRecord>, ApiError> {
        if deck_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.rest_url("cards");
        let query = [
            ("select", "*".to_string()),
            ("deck_id", in_filter(deck_ids)),
            ("user_id", format!("eq.{}", owner)),
            ("order", "created_at.asc".to_string()),
        ];
        let response = self.send(|| self.client.get(&url).query(&query)).await?;
        let cards: Vec<CardRecord> = Self::json(response).await?;
        debug!(owner, decks = deck_ids.len(), count = cards.len(), "Fetched cards");
        Ok(cards)
    }

    async fn create_partition(
        &self,
        owner: &str,
        draft: &DeckDraft,
    ) -> Result<DeckRecord, ApiError> {
        let url = self.rest_url("decks");
        let now = Utc::now();
        let body = json!({
            "user_id": owner,
            "name": draft.name,
            "order_index": draft.order_index,
            "created_at": now,
            "updated_at": now,
        });
        let response = self
            .send(|| {
                self.client
                    .post(&url)
                    .header("Prefer", "return=representation")
                    .json(&body)
            })
            .await?;
        Self::single(response).await
    }

    async fn update_partition(
        &self,
        owner: &str,
        deck_id: &str,
        changes: &DeckChanges,
    ) -> Result<DeckRecord, ApiError> {
        let url = self.rest_url("decks");
        let query = owned_row(deck_id, owner);
        let mut body = serde_json::to_value(changes)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode changes: {}", e)))?;
        body["updated_at"] = json!(Utc::now());
        let response = self
            .send(|| {
                self.client
                    .patch(&url)
                    .query(&query)
                    .header("Prefer", "return=representation")
                    .json(&body)
            })
            .await?;
        Self::single(response).await
    }

    async fn delete_partition(&self, owner: &str, deck_id: &str) -> Result<(), ApiError> {
        let url = self.rest_url("decks");
        let query = owned_row(deck_id, owner);
        self.send(|| self.client.delete(&url).query(&query)).await?;
        debug!(owner, deck_id, "Deleted deck");
        Ok(())
    }

    async fn create_item(&self, owner: &str, draft: &CardDraft) -> Result<CardRecord, ApiError> {
        let url = self.rest_url("cards");
        let mut body = serde_json::to_value(draft)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode card: {}", e)))?;
        body["user_id"] = json!(owner);
        let response = self
            .send(|| {
                self.client
                    .post(&url)
                    .header("Prefer", "return=representation")
                    .json(&body)
            })
            .await?;
        let record: CardRecord = Self::single(response).await?;
        debug!(owner, card_id = %record.id, "Created card");
        Ok(record)
    }

    async fn update_item(&self, owner: &str, card: &Card) -> Result<CardRecord, ApiError> {
        let url = self.rest_url("cards");
        let query = owned_row(&card.id, owner);
        let body = json!({
            "deck_id": card.deck_id,
            "original_text": card.original_text,
            "furigana_text": card.furigana_text,
            "translated_text": card.translated_text,
            "language": card.language,
            "image_url": card.image_url,
            "analysis_data": card.analysis,
        });
        let response = self
            .send(|| {
                self.client
                    .patch(&url)
                    .query(&query)
                    .header("Prefer", "return=representation")
                    .json(&body)
            })
            .await?;
        let record: CardRecord = Self::single(response).await?;
        debug!(owner, card_id = %record.id, "Updated card");
        Ok(record)
    }

    async fn delete_item(&self, owner: &str, card_id: &str) -> Result<(), ApiError> {
        let url = self.rest_url("cards");
        let query = owned_row(card_id, owner);
        self.send(|| self.client.delete(&url).query(&query)).await?;
        debug!(owner, card_id, "Deleted card");
        Ok(())
    }

    async fn upload_asset(&self, owner: &str, local_path: &Path) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.jpg");
        let object_path = format!("{}/{}_{}", owner, Utc::now().timestamp_millis(), file_name);
        let url = self.storage_url(&format!("object/{}/{}", self.bucket, object_path));
        let content_type = content_type_for(local_path);

        self.send(|| {
            self.client
                .post(&url)
                .header(header::CONTENT_TYPE, content_type)
                .body(bytes.clone())
        })
        .await?;
        debug!(owner, object_path = %object_path, size = bytes.len(), "Uploaded asset");

        self.sign_object(&object_path).await
    }

    async fn delete_asset(&self, url: &str) -> Result<(), ApiError> {
        let object_path = object_path_from_url(url, &self.bucket)
            .ok_or_else(|| ApiError::InvalidResponse(format!("Not a storage URL: {}", url)))?;
        let endpoint = self.storage_url(&format!("object/{}", self.bucket));
        let body = json!({ "prefixes": [object_path] });
        self.send(|| self.client.delete(&endpoint).json(&body)).await?;
        debug!(object_path = %object_path, "Deleted remote asset");
        Ok(())
    }
}

/// `in.("a","b")` filter value.
fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

/// Filters matching one row, and only if `owner` owns it.
fn owned_row(id: &str, owner: &str) -> [(&'static str, String); 2] {
    [
        ("id", format!("eq.{}", id)),
        ("user_id", format!("eq.{}", owner)),
    ]
}

/// Extract the object path from a public, signed or plain storage URL.
pub fn object_path_from_url(url: &str, bucket: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    ["object/sign/", "object/public/", "object/"]
        .iter()
        .find_map(|prefix| {
            let marker = format!("/{}{}/", prefix, bucket);
            without_query
                .find(&marker)
                .map(|idx| without_query[idx + marker.len()..].to_string())
        })
        .filter(|path| !path.is_empty())
}
