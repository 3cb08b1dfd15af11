use super::elements::{is_visible, synthesize_selector};
use super::ModalCandidate;
use crate::browser::{DomNode, DomSnapshot, NodeGroup, Viewport};
use std::collections::HashSet;

/// Lowest z-index at which a positioned node counts as an overlay
const OVERLAY_MIN_Z_INDEX: i64 = 100;

/// Minimum share of the viewport a positioned overlay must cover
const OVERLAY_MIN_COVERAGE: f64 = 0.1;

const MAX_TEXT_CHARS: usize = 200;

/// Visible dialogs and high z-index overlays on the page
pub fn extract_modals(snapshot: &DomSnapshot) -> Vec<ModalCandidate> {
    let mut seen = HashSet::new();

    snapshot
        .nodes
        .iter()
        .filter(|n| n.group == NodeGroup::Overlay)
        .filter(|n| seen.insert(n.path.as_str()))
        .filter(|n| is_visible(n))
        .filter_map(|node| {
            let coverage = coverage(node, snapshot.viewport);
            if !has_dialog_semantics(node) && !is_positioned_overlay(node, coverage) {
                return None;
            }
            Some(ModalCandidate {
                selector: synthesize_selector(node),
                text: node.text.chars().take(MAX_TEXT_CHARS).collect(),
                role: node.role.clone(),
                z_index: node.z_index,
                coverage,
            })
        })
        .collect()
}

fn has_dialog_semantics(node: &DomNode) -> bool {
    node.tag == "dialog"
        || matches!(node.role.as_deref(), Some("dialog") | Some("alertdialog"))
        || node.attr("aria-modal") == Some("true")
}

fn is_positioned_overlay(node: &DomNode, coverage: f64) -> bool {
    matches!(node.position.as_str(), "fixed" | "absolute")
        && node.z_index >= OVERLAY_MIN_Z_INDEX
        && coverage >= OVERLAY_MIN_COVERAGE
}

fn coverage(node: &DomNode, viewport: Viewport) -> f64 {
    let viewport_area = f64::from(viewport.width) * f64::from(viewport.height);
    if viewport_area <= 0.0 {
        return 0.0;
    }
    (node.rect.area() / viewport_area).min(1.0)
}
