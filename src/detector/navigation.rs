use super::elements::{derive_label, is_visible, synthesize_selector};
use super::{ElementType, NavigationElement, Position};
use crate::browser::{DomNode, DomSnapshot, NodeGroup, Viewport};
use std::collections::HashSet;

/// Entries scoring below this are not treated as navigation
pub const NAVIGATION_THRESHOLD: f64 = 0.3;

const KEYWORD_WEIGHT: f64 = 0.3;
const TOP_OF_PAGE_WEIGHT: f64 = 0.2;
const EDGE_WEIGHT: f64 = 0.1;
const SEMANTICS_WEIGHT: f64 = 0.2;
const CONTAINER_WEIGHT: f64 = 0.3;
const SUBMENU_WEIGHT: f64 = 0.1;

/// Nodes starting above this line are in the header area
const TOP_OF_PAGE_PX: f64 = 200.0;

/// Distance from the left or right viewport edge counted as a sidebar
const EDGE_PX: f64 = 100.0;

const NAV_KEYWORDS: &[&str] = &[
    "home",
    "dashboard",
    "overview",
    "menu",
    "settings",
    "preferences",
    "profile",
    "account",
    "users",
    "admin",
    "reports",
    "analytics",
    "projects",
    "products",
    "services",
    "orders",
    "billing",
    "help",
    "support",
    "docs",
    "about",
    "contact",
    "search",
    "logout",
    "sign out",
];

const NAV_ROLES: &[&str] = &["navigation", "menuitem", "tab", "treeitem", "link"];

const CONTAINER_HINTS: &[&str] = &[
    "nav",
    "menu",
    "sidebar",
    "header",
    "navbar",
    "toolbar",
    "breadcrumb",
    "tabs",
];

/// Scores every navigation candidate and keeps those at or above the threshold
///
/// Entries are deduplicated by label and target, then ordered by confidence,
/// top to bottom and left to right.
pub fn extract_navigation(snapshot: &DomSnapshot) -> Vec<NavigationElement> {
    let mut seen_paths = HashSet::new();
    let mut seen_targets = HashSet::new();
    let mut entries = Vec::new();

    for node in snapshot
        .nodes
        .iter()
        .filter(|n| n.group == NodeGroup::Navigation)
    {
        if !seen_paths.insert(node.path.as_str()) || !is_visible(node) {
            continue;
        }

        let confidence = navigation_confidence(node, snapshot.viewport);
        if confidence < NAVIGATION_THRESHOLD {
            continue;
        }

        let text = derive_label(node, ElementType::Link, entries.len());
        let href = node.attr("href").map(str::to_string);
        if !seen_targets.insert((text.to_lowercase(), href.clone())) {
            continue;
        }

        entries.push(NavigationElement {
            text,
            selector: synthesize_selector(node),
            href,
            confidence,
            position: Position {
                x: node.rect.x,
                y: node.rect.y,
            },
        });
    }

    entries.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.position.y.total_cmp(&b.position.y))
            .then_with(|| a.position.x.total_cmp(&b.position.x))
    });
    entries
}

/// Sums the independent navigation signals for a node, capped at 1.0
pub fn navigation_confidence(node: &DomNode, viewport: Viewport) -> f64 {
    let mut score = 0.0;

    if has_nav_keyword(node) {
        score += KEYWORD_WEIGHT;
    }

    if node.rect.y < TOP_OF_PAGE_PX {
        score += TOP_OF_PAGE_WEIGHT;
    }

    let right_edge = node.rect.x + node.rect.width;
    if node.rect.x < EDGE_PX || right_edge > f64::from(viewport.width) - EDGE_PX {
        score += EDGE_WEIGHT;
    }

    if has_nav_semantics(node) {
        score += SEMANTICS_WEIGHT;
    }

    if in_nav_container(node) {
        score += CONTAINER_WEIGHT;
    }

    if node.has_submenu {
        score += SUBMENU_WEIGHT;
    }

    f64::min(score, 1.0)
}

fn has_nav_keyword(node: &DomNode) -> bool {
    let text = node.text.to_lowercase();
    let label = node.attr("aria-label").unwrap_or_default().to_lowercase();
    NAV_KEYWORDS
        .iter()
        .any(|keyword| contains_word(&text, keyword) || contains_word(&label, keyword))
}

fn has_nav_semantics(node: &DomNode) -> bool {
    if let Some(role) = node.role.as_deref() {
        if NAV_ROLES.contains(&role) {
            return true;
        }
    }
    node.tag == "a" && node.ancestor_classes.iter().any(|c| c == "nav")
}

fn in_nav_container(node: &DomNode) -> bool {
    node.ancestor_classes.iter().any(|classes| {
        classes
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .any(|token| CONTAINER_HINTS.contains(&token.to_lowercase().as_str()))
    })
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let end = start + word.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Rect;

    const VIEWPORT: Viewport = Viewport {
        width: 1920,
        height: 1080,
    };

    fn nav_node(path: &str, text: &str, x: f64, y: f64) -> DomNode {
        DomNode::new(NodeGroup::Navigation, 0, "a", path, Rect::new(x, y, 120.0, 24.0))
            .with_text(text)
    }

    #[test]
    fn test_header_link_in_nav_scores_high() {
        let node = nav_node("p", "Dashboard", 20.0, 40.0)
            .with_attr("href", "/dashboard")
            .with_ancestors(&["top-nav", "nav", "header", "body"]);
        let score = navigation_confidence(&node, VIEWPORT);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_body_link_below_threshold() {
        let node = nav_node("p", "read the full article", 600.0, 900.0)
            .with_ancestors(&["content", "main", "body"]);
        let score = navigation_confidence(&node, VIEWPORT);
        assert!(score < NAVIGATION_THRESHOLD, "score was {}", score);
    }

    #[test]
    fn test_individual_signals() {
        let plain = nav_node("p", "zzz", 600.0, 900.0);
        assert_eq!(navigation_confidence(&plain, VIEWPORT), 0.0);

        let keyword = nav_node("p", "Settings", 600.0, 900.0);
        assert!((navigation_confidence(&keyword, VIEWPORT) - 0.3).abs() < 1e-9);

        let top = nav_node("p", "zzz", 600.0, 150.0);
        assert!((navigation_confidence(&top, VIEWPORT) - 0.2).abs() < 1e-9);

        let right_edge = nav_node("p", "zzz", 1750.0, 900.0);
        assert!((navigation_confidence(&right_edge, VIEWPORT) - 0.1).abs() < 1e-9);

        let menuitem = nav_node("p", "zzz", 600.0, 900.0).with_attr("role", "menuitem");
        assert!((navigation_confidence(&menuitem, VIEWPORT) - 0.2).abs() < 1e-9);

        let sidebar = nav_node("p", "zzz", 600.0, 900.0).with_ancestors(&["app-sidebar"]);
        assert!((navigation_confidence(&sidebar, VIEWPORT) - 0.3).abs() < 1e-9);

        let mut submenu = nav_node("p", "zzz", 600.0, 900.0);
        submenu.has_submenu = true;
        assert!((navigation_confidence(&submenu, VIEWPORT) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_must_be_whole_word() {
        let node = nav_node("p", "homeward", 600.0, 900.0);
        assert_eq!(navigation_confidence(&node, VIEWPORT), 0.0);
    }

    #[test]
    fn test_extract_filters_dedupes_and_orders() {
        let snapshot = DomSnapshot {
            viewport: VIEWPORT,
            nodes: vec![
                nav_node("p1", "Reports", 20.0, 300.0)
                    .with_attr("href", "/reports")
                    .with_ancestors(&["sidebar"]),
                nav_node("p2", "Home", 20.0, 40.0)
                    .with_attr("href", "/")
                    .with_ancestors(&["nav"]),
                nav_node("p3", "Home", 1000.0, 40.0)
                    .with_attr("href", "/")
                    .with_ancestors(&["nav"]),
                nav_node("p4", "terms of use", 700.0, 1000.0),
            ],
        };

        let entries = extract_navigation(&snapshot);
        let labels: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(labels, vec!["Home", "Reports"]);
        assert!(entries.iter().all(|e| e.confidence >= NAVIGATION_THRESHOLD));
        assert!(entries.iter().all(|e| e.confidence <= 1.0));
    }
}
