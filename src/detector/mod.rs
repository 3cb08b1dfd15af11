//! Element detection
//!
//! Classifies the nodes of a [`DomSnapshot`] into interactive elements,
//! navigation entries and modal candidates. Everything except
//! [`detect_page`] is a pure function of the snapshot, so the heuristics are
//! tested without a browser.

mod elements;
mod navigation;
mod overlay;
pub mod rules;

pub use elements::{
    derive_label, extract_elements, is_visible, order_elements, synthesize_selector,
};
pub use navigation::{extract_navigation, navigation_confidence, NAVIGATION_THRESHOLD};
pub use overlay::extract_modals;

use crate::browser::{take_snapshot, BrowserSession, DomSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Detection failures; callers treat them as "no elements on this page"
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Failed to snapshot the page: {0}")]
    Snapshot(#[from] crate::browser::BrowserError),
}

/// Semantic type assigned by the first matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Button,
    Link,
    Input,
    TextArea,
    Select,
    Checkbox,
    Radio,
    Form,
    Tab,
    MenuItem,
    Clickable,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Link => "link",
            Self::Input => "input",
            Self::TextArea => "textarea",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Form => "form",
            Self::Tab => "tab",
            Self::MenuItem => "menuitem",
            Self::Clickable => "clickable",
        }
    }

    /// Types a user types into or picks a value from
    pub fn is_form_field(&self) -> bool {
        matches!(
            self,
            Self::Input | Self::TextArea | Self::Select | Self::Checkbox | Self::Radio
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// A control the manual should describe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub id: String,
    pub element_type: ElementType,
    /// Human-readable label
    pub text: String,
    /// One-line description of what the control does
    pub functionality: String,
    pub selector: String,
    pub position: Position,
    pub size: Size,
    pub attributes: BTreeMap<String, String>,
    pub is_visible: bool,
    /// Fixed per-type weight in `1..=5`
    pub importance: u8,
}

impl InteractiveElement {
    /// True when no text or attribute gave the element a name and the label
    /// is the `{type}_{index}` fallback
    pub fn is_fallback_label(&self) -> bool {
        self.text
            .strip_prefix(self.element_type.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .map(|index| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    }
}

/// A likely navigation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationElement {
    pub text: String,
    pub selector: String,
    pub href: Option<String>,
    /// Additive heuristic score in `[0, 1]`
    pub confidence: f64,
    pub position: Position,
}

/// A dialog or overlay covering the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalCandidate {
    pub selector: String,
    pub text: String,
    pub role: Option<String>,
    pub z_index: i64,
    /// Fraction of the viewport the node covers
    pub coverage: f64,
}

/// Detection result for one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageElements {
    pub elements: Vec<InteractiveElement>,
    pub navigation: Vec<NavigationElement>,
    pub modals: Vec<ModalCandidate>,
}

/// Runs every detector over an already gathered snapshot
pub fn detect(snapshot: &DomSnapshot) -> PageElements {
    PageElements {
        elements: extract_elements(snapshot),
        navigation: extract_navigation(snapshot),
        modals: extract_modals(snapshot),
    }
}

/// Snapshots the page currently loaded in `browser` and detects its elements
pub async fn detect_page(browser: &dyn BrowserSession) -> Result<PageElements, DetectionError> {
    let snapshot = take_snapshot(browser, &rules::snapshot_query()).await?;
    let detected = detect(&snapshot);
    tracing::debug!(
        "Detected {} elements, {} navigation entries, {} modals",
        detected.elements.len(),
        detected.navigation.len(),
        detected.modals.len()
    );
    Ok(detected)
}
