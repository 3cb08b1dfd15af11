//! Remote object storage for screenshots and generated documents
//!
//! Uploads are best effort: an unreachable or failing endpoint yields `None`
//! and the caller keeps working from the local copy.

use crate::config::ObjectStoreConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// A bucket/key blob store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `bucket/key` and returns the object's URL, or
    /// `None` when the store could not be reached or refused the upload
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Option<String>;
}

/// S3-style store addressed as `{endpoint}/{bucket}/{key}` with plain HTTP PUT
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
}

impl HttpObjectStore {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            bucket.trim_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Option<String> {
        let url = self.object_url(bucket, key);
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Uploaded {}", url);
                Some(url)
            }
            Ok(response) => {
                tracing::warn!("Object store rejected {}: HTTP {}", url, response.status());
                None
            }
            Err(e) => {
                tracing::warn!("Object store unreachable, keeping local copy only: {}", e);
                None
            }
        }
    }
}
