//! Remote store credential material.
//!
//! Credentials live on the appliance as a base64-encoded JSON document
//! (`encoded_credentials.txt`). Loading is the only place where the engine
//! fails hard: without a valid bucket and token it must not start.

use crate::error::{SyncError, SyncResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

/// Default object storage API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Credential material for the remote blob store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bucket holding the mirrored objects.
    #[serde(alias = "storageBucket", alias = "storage_bucket")]
    pub bucket: String,
    /// OAuth bearer token.
    pub access_token: String,
    /// Storage API endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Credentials {
    /// Creates credentials for the default endpoint.
    pub fn new(bucket: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            access_token: access_token.into(),
            endpoint: default_endpoint(),
        }
    }

    /// Loads credentials from a base64-encoded JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Credentials`] if the file is missing, is not valid
    /// base64, does not hold the expected JSON, or lacks a bucket or token.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let encoded = fs::read_to_string(path).map_err(|e| {
            SyncError::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_encoded(&encoded)
    }

    /// Decodes credentials from base64 text.
    pub fn from_encoded(encoded: &str) -> SyncResult<Self> {
        let json = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SyncError::Credentials(format!("not valid base64: {e}")))?;
        Self::from_json(&json)
    }

    /// Parses credentials from plain JSON bytes.
    pub fn from_json(json: &[u8]) -> SyncResult<Self> {
        let credentials: Credentials = serde_json::from_slice(json)
            .map_err(|e| SyncError::Credentials(format!("malformed credential JSON: {e}")))?;
        credentials.validate()?;
        Ok(credentials)
    }

    /// Encodes these credentials as base64 text.
    pub fn to_encoded(&self) -> SyncResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| SyncError::Credentials(format!("cannot serialize credentials: {e}")))?;
        Ok(STANDARD.encode(json))
    }

    fn validate(&self) -> SyncResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(SyncError::Credentials("bucket is empty".into()));
        }
        if self.access_token.trim().is_empty() {
            return Err(SyncError::Credentials("access token is empty".into()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(SyncError::Credentials("endpoint is empty".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bucket", &self.bucket)
            .field("access_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Encodes a plain JSON credential file into the base64 form the engine loads.
pub fn encode_file(input: &Path, output: &Path) -> SyncResult<()> {
    let json = fs::read(input)?;
    let credentials = Credentials::from_json(&json)?;
    fs::write(output, credentials.to_encoded()?)?;
    info!(output = %output.display(), "credentials encoded");
    Ok(())
}

/// Decodes a base64 credential file back into pretty-printed JSON.
pub fn decode_file(input: &Path, output: &Path) -> SyncResult<()> {
    let credentials = Credentials::load(input)?;
    let json = serde_json::to_vec_pretty(&credentials)
        .map_err(|e| SyncError::Credentials(format!("cannot serialize credentials: {e}")))?;
    fs::write(output, json)?;
    info!(output = %output.display(), "credentials decoded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_encoded_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("encoded_credentials.txt");
        let json = r#"{"storageBucket":"barkeep.appspot.com","access_token":"ya29.token"}"#;
        fs::write(&path, format!("{}\n", STANDARD.encode(json))).unwrap();

        let credentials = Credentials::load(&path).unwrap();
        assert_eq!(credentials.bucket, "barkeep.appspot.com");
        assert_eq!(credentials.access_token, "ya29.token");
        assert_eq!(credentials.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn missing_or_invalid_credentials_are_fatal() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Credentials::load(&dir.path().join("absent.txt")),
            Err(SyncError::Credentials(_))
        ));
        assert!(matches!(
            Credentials::from_encoded("%%% not base64 %%%"),
            Err(SyncError::Credentials(_))
        ));
        assert!(matches!(
            Credentials::from_encoded(&STANDARD.encode("[1, 2]")),
            Err(SyncError::Credentials(_))
        ));
        assert!(matches!(
            Credentials::from_json(br#"{"bucket":"b","access_token":"  "}"#),
            Err(SyncError::Credentials(_))
        ));
    }

    #[test]
    fn encode_then_decode_files() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("credentials.json");
        let encoded = dir.path().join("encoded_credentials.txt");
        let decoded = dir.path().join("decoded.json");

        fs::write(
            &plain,
            r#"{"bucket":"b","access_token":"t","endpoint":"http://localhost:4443"}"#,
        )
        .unwrap();
        encode_file(&plain, &encoded).unwrap();
        decode_file(&encoded, &decoded).unwrap();

        let original = Credentials::from_json(&fs::read(&plain).unwrap()).unwrap();
        let round = Credentials::from_json(&fs::read(&decoded).unwrap()).unwrap();
        assert_eq!(original, round);
        assert_eq!(round.endpoint, "http://localhost:4443");
    }

    #[test]
    fn debug_redacts_token() {
        let credentials = Credentials::new("bucket", "secret-token");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("bucket"));
        assert!(!debug.contains("secret-token"));
    }
}
