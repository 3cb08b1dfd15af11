//! Credential pools and their persisted status
//!
//! A pool keeps one record per configured key. Status survives restarts in a
//! JSON file keyed by a fingerprint of each credential; the credential itself
//! is never written to disk.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Status of one credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    #[serde(skip)]
    pub credential: String,
    pub fingerprint: String,
    pub is_active: bool,
    pub request_count: u32,
    pub quota_exhausted: bool,
    pub daily_limit: u32,
    /// When `request_count` and `quota_exhausted` are next cleared
    pub reset_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    pub fn new(credential: &str, daily_limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            credential: credential.to_string(),
            fingerprint: credential_fingerprint(credential),
            is_active: true,
            request_count: 0,
            quota_exhausted: false,
            daily_limit,
            reset_at: next_utc_midnight(now),
            last_used_at: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.is_active && !self.quota_exhausted
    }

    /// Clears the daily counters once the reset boundary has passed
    fn refresh(&mut self, now: DateTime<Utc>) {
        if now > self.reset_at {
            if self.quota_exhausted {
                info!("Quota of key {} has reset", self.fingerprint);
            }
            self.quota_exhausted = false;
            self.request_count = 0;
            self.reset_at = next_utc_midnight(now);
        }
    }
}

/// Short stable identifier for a credential, safe to log and persist
pub fn credential_fingerprint(credential: &str) -> String {
    crate::screenshot::sha256_hex(credential.as_bytes())[..12].to_string()
}

/// The first instant of the UTC day after `now`
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Duration::days(1);
    Utc.from_utc_datetime(&tomorrow.and_time(NaiveTime::MIN))
}

/// Credentials of one provider, rotated round-robin
#[derive(Debug)]
pub struct KeyPool {
    provider: String,
    keys: Vec<KeyRecord>,
    /// Index of the key handed out last
    cursor: Option<usize>,
    state_path: Option<PathBuf>,
}

impl KeyPool {
    /// Creates an in-memory pool with every key fresh
    pub fn new(provider: &str, credentials: &[String], daily_limit: u32) -> Self {
        let now = Utc::now();
        Self {
            provider: provider.to_string(),
            keys: credentials
                .iter()
                .map(|c| KeyRecord::new(c, daily_limit, now))
                .collect(),
            cursor: None,
            state_path: None,
        }
    }

    /// Creates a pool backed by `state_path`, restoring the saved status of
    /// any key that is still configured
    ///
    /// An unreadable state file is logged and ignored.
    pub fn load(
        provider: &str,
        credentials: &[String],
        daily_limit: u32,
        state_path: &Path,
    ) -> Self {
        let mut pool = Self::new(provider, credentials, daily_limit);
        pool.state_path = Some(state_path.to_path_buf());

        let saved: Vec<KeyRecord> = match std::fs::read(state_path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(saved) => saved,
                Err(e) => {
                    warn!(
                        "Key state {} is unreadable, starting fresh: {}",
                        state_path.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        let mut saved: HashMap<String, KeyRecord> = saved
            .into_iter()
            .map(|record| (record.fingerprint.clone(), record))
            .collect();

        for key in &mut pool.keys {
            if let Some(previous) = saved.remove(&key.fingerprint) {
                key.is_active = previous.is_active;
                key.request_count = previous.request_count;
                key.quota_exhausted = previous.quota_exhausted;
                key.reset_at = previous.reset_at;
                key.last_used_at = previous.last_used_at;
            }
        }

        debug!(
            "Loaded {} keys for {} ({} available)",
            pool.keys.len(),
            provider,
            pool.available_count()
        );
        pool
    }

    /// Picks the next usable key, starting after the one handed out last
    ///
    /// # Returns
    ///
    /// The key's index and credential, or `None` when every key is inactive
    /// or exhausted
    pub fn next_available(&mut self, now: DateTime<Utc>) -> Option<(usize, String)> {
        if self.keys.is_empty() {
            return None;
        }

        for key in &mut self.keys {
            key.refresh(now);
        }

        let len = self.keys.len();
        let start = self.cursor.map_or(0, |last| (last + 1) % len);
        let index = (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&i| self.keys[i].is_available())?;

        self.cursor = Some(index);
        Some((index, self.keys[index].credential.clone()))
    }

    /// Counts a successful request against a key
    pub fn record_success(&mut self, index: usize, now: DateTime<Utc>) {
        if let Some(key) = self.keys.get_mut(index) {
            key.request_count += 1;
            key.last_used_at = Some(now);
            if key.request_count >= key.daily_limit {
                warn!(
                    "Key {} of {} reached its daily limit of {}",
                    key.fingerprint, self.provider, key.daily_limit
                );
                key.quota_exhausted = true;
            }
        }
    }

    /// Takes a key out of rotation until its reset boundary
    pub fn mark_exhausted(&mut self, index: usize) {
        if let Some(key) = self.keys.get_mut(index) {
            warn!("Key {} of {} is out of quota", key.fingerprint, self.provider);
            key.quota_exhausted = true;
        }
    }

    /// Takes a key out of rotation for good
    pub fn deactivate(&mut self, index: usize) {
        if let Some(key) = self.keys.get_mut(index) {
            warn!("Key {} of {} was rejected, deactivating", key.fingerprint, self.provider);
            key.is_active = false;
        }
    }

    /// Writes key status to the state file, if the pool has one
    pub fn persist(&self) -> std::io::Result<()> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&self.keys)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn records(&self) -> &[KeyRecord] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn available_count(&self) -> usize {
        self.keys.iter().filter(|k| k.is_available()).count()
    }
}
