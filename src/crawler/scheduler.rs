//! Crawl frontier and politeness timing
//!
//! This module handles:
//! - The FIFO queue driving breadth-first traversal
//! - The seen-set guaranteeing a URL is queued at most once per crawl
//! - Fixed per-host delays between successive page loads

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// A URL waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    /// Link distance from the start URL
    pub depth: u32,
}

/// Breadth-first frontier
///
/// Membership is checked when a link is discovered rather than when it is
/// popped, so the queue never holds two entries for the same URL.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    seen: HashSet<String>,
}

impl Frontier {
    /// Creates a frontier seeded with `start_url` at depth 0
    pub fn seeded(start_url: &str) -> Self {
        let mut frontier = Self::default();
        frontier.push(start_url, 0);
        frontier
    }

    /// Queues `url` unless it was seen before
    ///
    /// # Returns
    ///
    /// `true` when the URL was new and has been queued
    pub fn push(&mut self, url: &str, depth: u32) -> bool {
        if !self.seen.insert(url.to_string()) {
            return false;
        }
        self.queue.push_back(FrontierEntry {
            url: url.to_string(),
            depth,
        });
        true
    }

    /// Records a URL as seen without queueing it, e.g. a redirect target
    pub fn mark_seen(&mut self, url: &str) {
        self.seen.insert(url.to_string());
    }

    pub fn has_seen(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    /// Returns the number of URLs waiting in the queue
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Enforces a fixed minimum interval between requests to the same host
#[derive(Debug)]
pub struct Politeness {
    delay: Duration,
    last_request: HashMap<String, Instant>,
}

impl Politeness {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: HashMap::new(),
        }
    }

    /// Time left before `host` may be requested again
    pub fn time_until_ready(&self, host: &str, now: Instant) -> Option<Duration> {
        let last = self.last_request.get(host)?;
        let ready_at = *last + self.delay;
        (ready_at > now).then(|| ready_at - now)
    }

    /// Sleeps until `host` may be requested, then records the request
    pub async fn wait(&mut self, host: &str) {
        if let Some(wait) = self.time_until_ready(host, Instant::now()) {
            tracing::trace!("Waiting {:?} before next request to {}", wait, host);
            tokio::time::sleep(wait).await;
        }
        self.last_request.insert(host.to_string(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_frontier() {
        let mut frontier = Frontier::seeded("https://example.test/");
        assert_eq!(frontier.len(), 1);
        assert!(frontier.has_seen("https://example.test/"));

        let entry = frontier.pop().unwrap();
        assert_eq!(entry.depth, 0);
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_push_is_idempotent() {
        let mut frontier = Frontier::default();
        assert!(frontier.push("https://example.test/a", 1));
        assert!(!frontier.push("https://example.test/a", 2));
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_seen_survives_pop() {
        let mut frontier = Frontier::seeded("https://example.test/");
        frontier.pop();
        assert!(!frontier.push("https://example.test/", 1));
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::default();
        frontier.push("https://example.test/1", 1);
        frontier.push("https://example.test/2", 1);
        frontier.push("https://example.test/3", 2);
        let order: Vec<String> = std::iter::from_fn(|| frontier.pop())
            .map(|e| e.url)
            .collect();
        assert_eq!(
            order,
            vec![
                "https://example.test/1",
                "https://example.test/2",
                "https://example.test/3"
            ]
        );
    }

    #[test]
    fn test_mark_seen_blocks_push() {
        let mut frontier = Frontier::default();
        frontier.mark_seen("https://example.test/landing");
        assert!(!frontier.push("https://example.test/landing", 1));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_politeness_first_request_is_immediate() {
        let politeness = Politeness::new(Duration::from_secs(1));
        assert!(politeness
            .time_until_ready("example.test", Instant::now())
            .is_none());
    }

    #[tokio::test]
    async fn test_politeness_delays_same_host_only() {
        let mut politeness = Politeness::new(Duration::from_millis(30));
        politeness.wait("example.test").await;

        let now = Instant::now();
        assert!(politeness.time_until_ready("example.test", now).is_some());
        assert!(politeness.time_until_ready("other.test", now).is_none());

        let started = std::time::Instant::now();
        politeness.wait("example.test").await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
