use super::ElementType;
use crate::browser::SnapshotQuery;

/// One entry of the interactive-element rule list
#[derive(Debug, Clone, Copy)]
pub struct ElementRule {
    pub selector: &'static str,
    pub element_type: ElementType,
    /// Fixed weight in `1..=5`; higher sorts first
    pub importance: u8,
}

/// Interactive element rules, evaluated in order
///
/// A node matched by several rules is attributed to the first one, so the
/// narrow rules come before the catch-alls.
pub const ELEMENT_RULES: &[ElementRule] = &[
    ElementRule {
        selector: "button, input[type='submit'], input[type='button'], input[type='reset'], [role='button']",
        element_type: ElementType::Button,
        importance: 5,
    },
    ElementRule {
        selector: "input[type='checkbox'], [role='checkbox'], [role='switch']",
        element_type: ElementType::Checkbox,
        importance: 3,
    },
    ElementRule {
        selector: "input[type='radio'], [role='radio']",
        element_type: ElementType::Radio,
        importance: 3,
    },
    ElementRule {
        selector: "input:not([type='hidden']):not([type='submit']):not([type='button']):not([type='reset']):not([type='checkbox']):not([type='radio'])",
        element_type: ElementType::Input,
        importance: 4,
    },
    ElementRule {
        selector: "textarea",
        element_type: ElementType::TextArea,
        importance: 4,
    },
    ElementRule {
        selector: "select, [role='combobox'], [role='listbox']",
        element_type: ElementType::Select,
        importance: 4,
    },
    ElementRule {
        selector: "form",
        element_type: ElementType::Form,
        importance: 4,
    },
    ElementRule {
        selector: "[role='tab']",
        element_type: ElementType::Tab,
        importance: 3,
    },
    ElementRule {
        selector: "[role='menuitem']",
        element_type: ElementType::MenuItem,
        importance: 3,
    },
    ElementRule {
        selector: "a[href]",
        element_type: ElementType::Link,
        importance: 3,
    },
    ElementRule {
        selector: "[onclick], [tabindex]:not([tabindex='-1'])",
        element_type: ElementType::Clickable,
        importance: 2,
    },
];

/// Candidates for navigation scoring
pub const NAVIGATION_SELECTORS: &[&str] = &[
    "nav a",
    "header a",
    "[role='navigation'] a",
    "[role='menubar'] [role='menuitem']",
    "[role='menu'] [role='menuitem']",
    "[role='tablist'] [role='tab']",
    "aside a",
    ".sidebar a",
    ".menu a",
    ".navbar a",
    "ul li > a",
];

/// Candidates for modal and overlay detection
pub const OVERLAY_SELECTORS: &[&str] = &[
    "[role='dialog']",
    "[role='alertdialog']",
    "[aria-modal='true']",
    "dialog",
    ".modal",
    ".overlay",
    ".popup",
    ".lightbox",
    "[class*='modal']",
    "[class*='overlay']",
    "[style*='z-index']",
];

/// The selector groups every page snapshot is taken with
pub fn snapshot_query() -> SnapshotQuery {
    SnapshotQuery {
        interactive: ELEMENT_RULES.iter().map(|r| r.selector.to_string()).collect(),
        navigation: NAVIGATION_SELECTORS.iter().map(|s| s.to_string()).collect(),
        overlay: OVERLAY_SELECTORS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Rule at `index`, if the snapshot refers to one that exists
pub fn rule(index: usize) -> Option<&'static ElementRule> {
    ELEMENT_RULES.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_within_bounds() {
        for rule in ELEMENT_RULES {
            assert!((1..=5).contains(&rule.importance), "{}", rule.selector);
        }
    }

    #[test]
    fn test_buttons_outrank_links() {
        let button = ELEMENT_RULES
            .iter()
            .find(|r| r.element_type == ElementType::Button)
            .unwrap();
        let link = ELEMENT_RULES
            .iter()
            .find(|r| r.element_type == ElementType::Link)
            .unwrap();
        assert!(button.importance > link.importance);
    }

    #[test]
    fn test_query_preserves_rule_order() {
        let query = snapshot_query();
        assert_eq!(query.interactive.len(), ELEMENT_RULES.len());
        assert_eq!(query.interactive[0], ELEMENT_RULES[0].selector);
        assert!(rule(ELEMENT_RULES.len()).is_none());
    }
}
