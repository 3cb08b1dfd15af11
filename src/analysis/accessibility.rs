use crate::detector::InteractiveElement;
use serde::{Deserialize, Serialize};

/// Points deducted per element without an accessible name
pub const UNNAMED_ELEMENT_PENALTY: u32 = 5;
/// Points deducted per form field without a labelling attribute
pub const UNLABELED_FIELD_PENALTY: u32 = 3;

/// One reason a page lost points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub selector: String,
    pub reason: String,
    pub points: u32,
}

/// Per-page accessibility score in `0..=100`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityScore {
    pub score: u32,
    pub deductions: Vec<Deduction>,
}

/// Scores a page from its interactive elements
///
/// Starts at 100 and never drops below 0.
pub fn accessibility_score(elements: &[InteractiveElement]) -> AccessibilityScore {
    let mut deductions = Vec::new();

    for element in elements {
        if element.is_fallback_label() {
            deductions.push(Deduction {
                selector: element.selector.clone(),
                reason: format!("{} has no accessible name", element.element_type),
                points: UNNAMED_ELEMENT_PENALTY,
            });
        }

        let labeled = ["placeholder", "aria-label", "name"]
            .iter()
            .any(|attr| element.attributes.get(*attr).map_or(false, |v| !v.trim().is_empty()));
        if element.element_type.is_form_field() && !labeled {
            deductions.push(Deduction {
                selector: element.selector.clone(),
                reason: format!("{} has no placeholder/aria-label/name", element.element_type),
                points: UNLABELED_FIELD_PENALTY,
            });
        }
    }

    let lost: u32 = deductions.iter().map(|d| d.points).sum();
    AccessibilityScore {
        score: 100u32.saturating_sub(lost),
        deductions,
    }
}
