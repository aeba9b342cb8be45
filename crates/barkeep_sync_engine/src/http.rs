//! HTTP object store implementation.
//!
//! This module provides a [`BlobStore`] speaking the Google Cloud Storage
//! JSON API, which is what the appliance's Firebase bucket exposes. The
//! actual HTTP client is abstracted via a trait so the request/response
//! mapping can be tested without a network.

use crate::credentials::Credentials;
use crate::error::{SyncError, SyncResult};
use crate::store::BlobStore;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Largest page the listing endpoint accepts.
const MAX_PAGE_SIZE: u32 = 1000;

/// A raw HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. `Err` means the
/// request never produced a response (DNS, connect, TLS, timeout); any
/// response, whatever its status, is `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request with bearer authorization.
    fn get(&self, url: &str, token: &str) -> Result<HttpResponse, String>;

    /// Sends a POST request with bearer authorization.
    fn post(
        &self,
        url: &str,
        token: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<HttpResponse, String>;
}

/// Production HTTP client backed by `reqwest`'s blocking API.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::store_fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, token: &str) -> Result<HttpResponse, String> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }

    fn post(
        &self,
        url: &str,
        token: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<HttpResponse, String> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Vec<ListItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

/// HTTP-based blob store.
pub struct HttpBlobStore<C: HttpClient> {
    /// API endpoint (e.g., "https://storage.googleapis.com").
    endpoint: Url,
    /// Bucket holding the mirrored objects.
    bucket: String,
    /// Bearer token sent with every request.
    token: String,
    /// HTTP client implementation.
    client: C,
}

impl HttpBlobStore<ReqwestClient> {
    /// Creates a store from loaded credentials using the production client.
    ///
    /// Invalid credential material is fatal: the engine must not start.
    pub fn from_credentials(credentials: &Credentials) -> SyncResult<Self> {
        let client = ReqwestClient::new(Duration::from_secs(60))?;
        Self::new(
            &credentials.endpoint,
            &credentials.bucket,
            &credentials.access_token,
            client,
        )
    }
}

impl<C: HttpClient> HttpBlobStore<C> {
    /// Creates a new HTTP blob store.
    pub fn new(endpoint: &str, bucket: &str, token: &str, client: C) -> SyncResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SyncError::Credentials(format!("invalid endpoint {endpoint:?}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(SyncError::Credentials(format!(
                "endpoint {endpoint} cannot be used as a base URL"
            )));
        }
        if bucket.is_empty() {
            return Err(SyncError::Credentials("bucket name is empty".into()));
        }
        Ok(Self {
            endpoint,
            bucket: bucket.to_string(),
            token: token.to_string(),
            client,
        })
    }

    /// Returns the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the API endpoint.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        // cannot_be_a_base() was rejected in new().
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn objects_url(&self) -> Url {
        self.url(&["storage", "v1", "b", self.bucket.as_str(), "o"])
    }

    fn list_page(
        &self,
        prefix: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> SyncResult<ListPage> {
        let mut url = self.objects_url();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("prefix", prefix)
                .append_pair("maxResults", &page_size.to_string())
                .append_pair("fields", "items(name),nextPageToken");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self
            .client
            .get(url.as_str(), &self.token)
            .map_err(SyncError::Connectivity)?;
        check_status(&response, prefix)?;

        serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::Protocol(format!("failed to decode listing: {e}")))
    }
}

impl<C: HttpClient> BlobStore for HttpBlobStore<C> {
    fn list(&self, prefix: &str, max_results: Option<u32>) -> SyncResult<Vec<String>> {
        let limit = max_results.unwrap_or(u32::MAX) as usize;
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;

        while keys.len() < limit {
            let remaining = (limit - keys.len()).min(MAX_PAGE_SIZE as usize) as u32;
            let page = self.list_page(prefix, remaining, page_token.as_deref())?;
            keys.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        keys.truncate(limit);
        debug!(prefix, count = keys.len(), "listed remote keys");
        Ok(keys)
    }

    fn download(&self, key: &str) -> SyncResult<Vec<u8>> {
        let mut url = self.url(&["storage", "v1", "b", self.bucket.as_str(), "o", key]);
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self
            .client
            .get(url.as_str(), &self.token)
            .map_err(SyncError::Connectivity)?;
        check_status(&response, key)?;
        Ok(response.body)
    }

    fn upload(&self, key: &str, data: Vec<u8>) -> SyncResult<()> {
        let mut url = self.url(&["upload", "storage", "v1", "b", self.bucket.as_str(), "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        let response = self
            .client
            .post(url.as_str(), &self.token, content_type_for(key), data)
            .map_err(SyncError::Connectivity)?;
        check_status(&response, key)
    }
}

/// Maps an HTTP status onto the error taxonomy.
fn check_status(response: &HttpResponse, subject: &str) -> SyncResult<()> {
    let detail = || {
        let body = String::from_utf8_lossy(&response.body);
        format!("{subject}: HTTP {} {}", response.status, body.trim())
    };
    match response.status {
        200..=299 => Ok(()),
        401 | 403 => Err(SyncError::AuthenticationFailed(detail())),
        404 => Err(SyncError::NotFound(subject.to_string())),
        408 | 429 | 500..=599 => Err(SyncError::store_retryable(detail())),
        _ => Err(SyncError::store_fatal(detail())),
    }
}

fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
