//! Google Cloud Storage backend.
//!
//! Lists and streams objects through the GCS JSON API with a blocking
//! `reqwest` client. Object bodies are never buffered: the HTTP response is
//! handed to the archive reader as a [`Read`](std::io::Read) stream.
//!
//! # Configuration
//!
//! ```toml
//! [gcs]
//! endpoint_url = "https://storage.googleapis.com"
//! connect_timeout_secs = 30
//! # timeout_secs = 3600   # total per request; unset disables reqwest's 30 s default
//! anonymous = false
//! ```
//!
//! # Authentication
//!
//! Credentials are resolved once, on first use:
//!
//! 1. anonymous, when `gcs.anonymous = true` or `STORAGE_EMULATOR_HOST` is set;
//! 2. the bearer token in `GOOGLE_OAUTH_ACCESS_TOKEN`;
//! 3. the GCE/GKE metadata server (`GCE_METADATA_HOST` overrides the host).
//!    Metadata tokens are cached and refreshed shortly before they expire.
//!
//! # Pagination
//!
//! Listings request 1000 objects per page and follow `nextPageToken` until
//! it is absent.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;

use crate::config::GcsConfig;
use crate::error::{IngestError, Result};
use crate::locator::{ArchiveAddress, ArchiveRoot};
use crate::traits::{ArchiveStream, StorageBackend};

const EMULATOR_HOST_VAR: &str = "STORAGE_EMULATOR_HOST";
const TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
const METADATA_HOST_VAR: &str = "GCE_METADATA_HOST";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const PAGE_SIZE: &str = "1000";

/// GCS backend bound to one endpoint and one set of credentials.
pub struct GcsStorage {
    client: Client,
    endpoint: String,
    credentials: Credentials,
}

impl GcsStorage {
    /// Build the HTTP client and resolve credentials.
    pub fn connect(config: &GcsConfig) -> anyhow::Result<Self> {
        let emulator = std::env::var(EMULATOR_HOST_VAR)
            .ok()
            .filter(|h| !h.is_empty());

        let endpoint = match emulator {
            Some(ref host) if host.starts_with("http://") || host.starts_with("https://") => {
                host.clone()
            }
            Some(ref host) => format!("http://{}", host),
            None => config.endpoint_url.clone(),
        };
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(request_timeout(config))
            .build()
            .context("Failed to build HTTP client")?;

        let credentials = if config.anonymous || emulator.is_some() {
            Credentials::Anonymous
        } else if let Some(token) = std::env::var(TOKEN_VAR).ok().filter(|t| !t.is_empty()) {
            Credentials::Static(token)
        } else {
            let host = std::env::var(METADATA_HOST_VAR)
                .unwrap_or_else(|_| DEFAULT_METADATA_HOST.to_string());
            Credentials::Metadata {
                host,
                cached: Mutex::new(None),
            }
        };

        debug!(endpoint = %endpoint, auth = credentials.kind(), "connected to GCS");

        Ok(Self {
            client,
            endpoint,
            credentials,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> anyhow::Result<RequestBuilder> {
        Ok(match self.credentials.token(&self.client)? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<Response> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            uri_encode(bucket),
            uri_encode(key)
        );
        let request = self.authorize(self.client.get(&url).query(&[("alt", "media")]))?;
        let resp = request.send().context("GCS request failed")?;
        check_status(resp, "GetObject")
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/storage/v1/b/{}/o", self.endpoint, uri_encode(bucket));
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("maxResults", PAGE_SIZE.to_string())];
            if !prefix.is_empty() {
                query.push(("prefix", prefix.to_string()));
            }
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.clone()));
            }

            let request = self.authorize(self.client.get(&url).query(&query))?;
            let resp = request.send().context("GCS request failed")?;
            let page: ObjectList = check_status(resp, "ListObjects")?
                .json()
                .context("Failed to parse GCS object listing")?;

            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }
}

impl StorageBackend for GcsStorage {
    fn kind(&self) -> &'static str {
        "gcs"
    }

    fn open(&self, address: &ArchiveAddress) -> Result<ArchiveStream> {
        let ArchiveAddress::Remote { bucket, key } = address else {
            return Err(IngestError::open(address, anyhow::anyhow!("not a gs:// address")));
        };
        let resp = self
            .get_object(bucket, key)
            .map_err(|e| IngestError::open(address, e))?;
        Ok(Box::new(resp))
    }

    fn list(&self, root: &ArchiveRoot, suffix: &str) -> Result<Vec<ArchiveAddress>> {
        let ArchiveRoot::Remote { bucket, prefix } = root else {
            return Err(IngestError::enumeration(root, anyhow::anyhow!("not a gs:// root")));
        };

        let prefix = normalize_prefix(prefix);
        let names = self
            .list_objects(bucket, &prefix)
            .map_err(|e| IngestError::enumeration(root, e))?;

        Ok(names
            .into_iter()
            .filter(|name| name.ends_with(suffix))
            .map(|key| ArchiveAddress::Remote {
                bucket: bucket.clone(),
                key,
            })
            .collect())
    }
}

/// Total per-request timeout. `None` disables the blocking client's default
/// 30 s limit, which would otherwise cut off long archive downloads.
fn request_timeout(config: &GcsConfig) -> Option<Duration> {
    config.timeout_secs.map(Duration::from_secs)
}

/// Make a non-empty prefix end with `/` so `v2` does not also match `v20/`.
fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

fn check_status(resp: Response, operation: &str) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    bail!(
        "GCS {} failed (HTTP {}): {}",
        operation,
        status,
        body.chars().take(500).collect::<String>()
    );
}

// ============ Listing response ============

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

// ============ Credentials ============

enum Credentials {
    Anonymous,
    Static(String),
    Metadata {
        host: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl Credentials {
    fn kind(&self) -> &'static str {
        match self {
            Credentials::Anonymous => "anonymous",
            Credentials::Static(_) => "token",
            Credentials::Metadata { .. } => "metadata",
        }
    }

    /// Bearer token for the next request, refreshing a metadata token that
    /// expires within a minute.
    fn token(&self, client: &Client) -> anyhow::Result<Option<String>> {
        match self {
            Credentials::Anonymous => Ok(None),
            Credentials::Static(token) => Ok(Some(token.clone())),
            Credentials::Metadata { host, cached } => {
                let mut cached = cached
                    .lock()
                    .map_err(|_| anyhow::anyhow!("GCS token cache poisoned"))?;
                if let Some(ref token) = *cached {
                    if token.expires_at > Instant::now() + Duration::from_secs(60) {
                        return Ok(Some(token.access_token.clone()));
                    }
                }

                let fresh = fetch_metadata_token(client, host)?;
                let access_token = fresh.access_token.clone();
                *cached = Some(CachedToken {
                    access_token: fresh.access_token,
                    expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
                });
                Ok(Some(access_token))
            }
        }
    }
}

fn fetch_metadata_token(client: &Client, host: &str) -> anyhow::Result<TokenResponse> {
    let url = format!(
        "http://{}/computeMetadata/v1/instance/service-accounts/default/token",
        host
    );
    let resp = client
        .get(&url)
        .header("Metadata-Flavor", "Google")
        .send()
        .with_context(|| {
            format!(
                "No GCS credentials: set {} or run on GCP (metadata server {} unreachable)",
                TOKEN_VAR, host
            )
        })?;
    check_status(resp, "metadata token")?
        .json()
        .context("Failed to parse metadata token response")
}

/// Percent-encode a path segment per RFC 3986.
///
/// Everything outside `A-Z a-z 0-9 - _ . ~` is encoded, including `/`, which
/// GCS object names in the JSON API path require.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
