//! URL handling module for ManualForge
//!
//! This module provides URL normalization and the same-host check that keeps
//! the crawl inside the application being documented.

mod domain;
mod normalize;

pub use domain::{extract_host, is_same_host};
pub use normalize::normalize_url;
