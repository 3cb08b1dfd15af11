use super::{sha256_hex, CacheEntry, CaptureError, CaptureOutcome, CaptureRequest};
use crate::browser::BrowserSession;
use crate::config::ScreenshotConfig;
use crate::storage::ObjectStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A request key resolved to a stored image
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RequestRecord {
    content_hash: String,
    source_url: String,
    captured_at: DateTime<Utc>,
}

/// On-disk layout of the cache index
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    /// Entries by content hash
    entries: BTreeMap<String, CacheEntry>,
    /// Content hash by request key
    requests: BTreeMap<String, RequestRecord>,
}

/// Hit, miss and duplicate counts since the cache was opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub duplicates: usize,
}

/// Counts from an [`ScreenshotCache::optimize`] sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    pub missing_files: usize,
    pub expired: usize,
    pub stale_requests: usize,
    pub remaining: usize,
}

impl OptimizeReport {
    pub fn entries_removed(&self) -> usize {
        self.missing_files + self.expired
    }
}

/// Screenshot store owned by the crawl
///
/// At most one file exists per distinct content hash; any number of request
/// keys may point at it.
pub struct ScreenshotCache {
    dir: PathBuf,
    index_path: PathBuf,
    ttl_secs: i64,
    index: CacheIndex,
    stats: CacheStats,
    remote: Option<(Arc<dyn ObjectStore>, String)>,
}

impl ScreenshotCache {
    /// Opens the cache, reading the existing index if there is one
    ///
    /// A corrupt index is logged and replaced by an empty one rather than
    /// failing the run.
    pub fn open(config: &ScreenshotConfig) -> Result<Self, CaptureError> {
        std::fs::create_dir_all(&config.cache_dir)?;
        if let Some(parent) = config.cache_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let index = match std::fs::read(&config.cache_file) {
            Ok(bytes) => match serde_json::from_slice::<CacheIndex>(&bytes) {
                Ok(index) => index,
                Err(e) => {
                    warn!(
                        "Screenshot index {} is unreadable, starting empty: {}",
                        config.cache_file.display(),
                        e
                    );
                    CacheIndex::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheIndex::default(),
            Err(e) => return Err(e.into()),
        };

        debug!(
            "Opened screenshot cache with {} entries and {} request keys",
            index.entries.len(),
            index.requests.len()
        );

        Ok(Self {
            dir: config.cache_dir.clone(),
            index_path: config.cache_file.clone(),
            ttl_secs: config.ttl_secs,
            index,
            stats: CacheStats::default(),
            remote: None,
        })
    }

    /// Uploads every newly stored image to `bucket`
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        self.remote = Some((store, bucket.to_string()));
        self
    }

    /// Captures `request` from the page loaded in `browser`, reusing stored
    /// images wherever possible
    pub async fn capture(
        &mut self,
        browser: &dyn BrowserSession,
        request: &CaptureRequest,
    ) -> Result<CaptureOutcome, CaptureError> {
        let request_key = request.request_key();
        if let Some(hit) = self.lookup(&request_key) {
            self.stats.hits += 1;
            debug!("Screenshot cache hit for {}", request.url);
            return Ok(hit);
        }

        if let Some(selector) = &request.selector {
            browser.scroll_into_view(selector).await?;
        }
        let bytes = browser.screenshot(&request.options()).await?;
        self.ingest(request, &bytes).await
    }

    /// A still-valid stored capture for `request_key`
    ///
    /// Valid means the image file is still on disk and the request was
    /// resolved less than the TTL ago.
    pub fn lookup(&self, request_key: &str) -> Option<CaptureOutcome> {
        let record = self.index.requests.get(request_key)?;
        let entry = self.index.entries.get(&record.content_hash)?;

        let age = Utc::now()
            .signed_duration_since(record.captured_at)
            .num_seconds();
        if age >= entry.ttl_secs || !entry.storage_path.exists() {
            return None;
        }

        Some(CaptureOutcome {
            path: entry.storage_path.clone(),
            content_hash: entry.content_hash.clone(),
            request_key: request_key.to_string(),
            from_cache: true,
            duplicate: false,
            remote_url: entry.remote_url.clone(),
        })
    }

    /// Stores freshly captured bytes for `request`
    ///
    /// The bytes are written to a new file first. When an entry with the same
    /// content hash already has its file on disk the new file is deleted and
    /// the existing path is returned with `duplicate` set.
    pub async fn ingest(
        &mut self,
        request: &CaptureRequest,
        bytes: &[u8],
    ) -> Result<CaptureOutcome, CaptureError> {
        let request_key = request.request_key();
        let content_hash = sha256_hex(bytes);
        let now = Utc::now();

        let file_name = format!("{}_{}.png", &request_key[..16], uuid::Uuid::new_v4().simple());
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)?;

        self.index.requests.insert(
            request_key.clone(),
            RequestRecord {
                content_hash: content_hash.clone(),
                source_url: request.url.clone(),
                captured_at: now,
            },
        );

        if let Some(existing) = self.index.entries.get_mut(&content_hash) {
            if existing.storage_path.exists() {
                // The stored image was just confirmed current
                existing.captured_at = now;
                let outcome = CaptureOutcome {
                    path: existing.storage_path.clone(),
                    content_hash: content_hash.clone(),
                    request_key,
                    from_cache: false,
                    duplicate: true,
                    remote_url: existing.remote_url.clone(),
                };
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove duplicate capture {}: {}", path.display(), e);
                }
                self.stats.duplicates += 1;
                self.persist()?;
                debug!("Capture of {} duplicates {}", request.url, outcome.path.display());
                return Ok(outcome);
            }
        }

        self.stats.misses += 1;
        let remote_url = self.upload(&content_hash, bytes).await;
        let entry = CacheEntry {
            content_hash: content_hash.clone(),
            request_key: request_key.clone(),
            storage_path: path.clone(),
            source_url: request.url.clone(),
            captured_at: now,
            ttl_secs: self.ttl_secs,
            remote_url: remote_url.clone(),
        };
        self.index.entries.insert(content_hash.clone(), entry);
        self.persist()?;

        Ok(CaptureOutcome {
            path,
            content_hash,
            request_key,
            from_cache: false,
            duplicate: false,
            remote_url,
        })
    }

    /// Evicts entries whose file is gone or whose TTL has lapsed, and request
    /// keys left pointing at nothing
    pub fn optimize(&mut self) -> Result<OptimizeReport, CaptureError> {
        let now = Utc::now();
        let mut report = OptimizeReport::default();

        self.index.entries.retain(|_, entry| {
            if !entry.storage_path.exists() {
                report.missing_files += 1;
                return false;
            }
            if entry.is_expired(now) {
                if let Err(e) = std::fs::remove_file(&entry.storage_path) {
                    warn!(
                        "Failed to delete expired capture {}: {}",
                        entry.storage_path.display(),
                        e
                    );
                }
                report.expired += 1;
                return false;
            }
            true
        });

        let entries = &self.index.entries;
        let before = self.index.requests.len();
        self.index
            .requests
            .retain(|_, record| entries.contains_key(&record.content_hash));
        report.stale_requests = before - self.index.requests.len();
        report.remaining = self.index.entries.len();

        self.persist()?;
        info!(
            "Screenshot cache optimized: {} missing, {} expired, {} stale keys, {} remaining",
            report.missing_files, report.expired, report.stale_requests, report.remaining
        );
        Ok(report)
    }

    /// Writes the index to disk
    pub fn flush(&self) -> Result<(), CaptureError> {
        self.persist()
    }

    pub fn len(&self) -> usize {
        self.index.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn entry(&self, content_hash: &str) -> Option<&CacheEntry> {
        self.index.entries.get(content_hash)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn upload(&self, content_hash: &str, bytes: &[u8]) -> Option<String> {
        let (store, bucket) = self.remote.as_ref()?;
        store
            .put_object(
                bucket,
                &format!("screenshots/{}.png", content_hash),
                bytes.to_vec(),
                "image/png",
            )
            .await
    }

    /// Replaces the index file atomically
    fn persist(&self) -> Result<(), CaptureError> {
        let json = serde_json::to_vec_pretty(&self.index)?;
        let tmp = self.index_path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.index_path)?;
        Ok(())
    }
}
