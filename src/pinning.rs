//! # Metadata Pinning
//!
//! IPFS-backed storage for invoice metadata via the Pinata pinning API.
//! Uploads pin a document and return its CID; reads go through the
//! configured public gateway. Because a CID's content never changes, reads
//! sit behind a small LRU cache and gateway fetches retry with backoff
//! before giving up.
//!
//! ## Authentication
//!
//! A JWT takes precedence when configured; otherwise the legacy
//! `pinata_api_key` / `pinata_secret_api_key` header pair is used. A client
//! with neither refuses to construct.

use async_trait::async_trait;
use log::debug;
use lru::LruCache;
use reqwest::multipart;
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::settings::Pinning;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("no pinning credentials configured: set a JWT or an API key pair")]
    MissingCredentials,
    #[error("pinning request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("pinning service returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// Write/read seam for invoice metadata documents. The orchestrator and the
/// view layer only ever see this trait, so tests swap in an in-memory store.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Pins a JSON document and returns its CID.
    async fn upload_json(&self, document: &Value) -> Result<String, PinError>;

    /// Pins raw bytes (invoice images) and returns the CID.
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, PinError>;

    /// Resolves a CID to its JSON document through the gateway.
    async fn fetch_json(&self, cid: &str) -> Result<Value, PinError>;

    /// Removes a pin. The content may remain reachable on public gateways.
    async fn unpin(&self, cid: &str) -> Result<(), PinError>;
}

enum PinataAuth {
    Jwt(String),
    KeyPair { key: String, secret: String },
}

impl PinataAuth {
    fn from_settings(cfg: &Pinning) -> Result<Self, PinError> {
        if let Some(jwt) = cfg.jwt.as_deref().filter(|s| !s.is_empty()) {
            return Ok(Self::Jwt(jwt.to_string()));
        }
        match (cfg.api_key.as_deref(), cfg.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok(Self::KeyPair {
                    key: key.to_string(),
                    secret: secret.to_string(),
                })
            }
            _ => Err(PinError::MissingCredentials),
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Jwt(jwt) => request.bearer_auth(jwt),
            Self::KeyPair { key, secret } => request
                .header("pinata_api_key", key)
                .header("pinata_secret_api_key", secret),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

pub struct PinataClient {
    http: reqwest::Client,
    api_base: String,
    gateway: String,
    auth: PinataAuth,
    fetch_max_retries: usize,
    cache: Mutex<LruCache<String, Value>>,
}

impl PinataClient {
    pub fn new(cfg: &Pinning) -> Result<Self, PinError> {
        let auth = PinataAuth::from_settings(cfg)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        let capacity = NonZeroUsize::new(cfg.metadata_cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            gateway: cfg.gateway.trim_end_matches('/').to_string(),
            auth,
            fetch_max_retries: cfg.fetch_max_retries,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, PinError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PinError::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MetadataStore for PinataClient {
    async fn upload_json(&self, document: &Value) -> Result<String, PinError> {
        let url = format!("{}/pinning/pinJSONToIPFS", self.api_base);
        let response = self
            .auth
            .apply(self.http.post(&url))
            .json(document)
            .send()
            .await?;
        let pinned: PinResponse = Self::expect_success(response).await?.json().await?;
        debug!("✅ [Pinata] pinned JSON as {}", pinned.ipfs_hash);
        Ok(pinned.ipfs_hash)
    }

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, PinError> {
        let url = format!("{}/pinning/pinFileToIPFS", self.api_base);
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);
        let response = self
            .auth
            .apply(self.http.post(&url))
            .multipart(form)
            .send()
            .await?;
        let pinned: PinResponse = Self::expect_success(response).await?.json().await?;
        debug!("✅ [Pinata] pinned file {} as {}", filename, pinned.ipfs_hash);
        Ok(pinned.ipfs_hash)
    }

    async fn fetch_json(&self, cid: &str) -> Result<Value, PinError> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(hit) = cache.get(cid) {
                debug!("🔍 [Pinata] metadata cache hit for {}", cid);
                return Ok(hit.clone());
            }
        }

        let url = format!("{}/ipfs/{}", self.gateway, cid);
        let strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(self.fetch_max_retries);
        let document = Retry::spawn(strategy, || async {
            let response = self.http.get(&url).send().await?;
            let value = Self::expect_success(response).await?.json::<Value>().await?;
            Ok::<Value, PinError>(value)
        })
        .await?;

        self.cache
            .lock()
            .await
            .put(cid.to_string(), document.clone());
        Ok(document)
    }

    async fn unpin(&self, cid: &str) -> Result<(), PinError> {
        let url = format!("{}/pinning/unpin/{}", self.api_base, cid);
        let response = self.auth.apply(self.http.delete(&url)).send().await?;
        Self::expect_success(response).await?;
        self.cache.lock().await.pop(cid);
        debug!("🔍 [Pinata] unpinned {}", cid);
        Ok(())
    }
}
