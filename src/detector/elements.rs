use super::rules::{self, ElementRule};
use super::{ElementType, InteractiveElement, Position, Size};
use crate::browser::{DomNode, DomSnapshot, NodeGroup};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Height of the row buckets used when ordering elements top to bottom
const ROW_BUCKET_PX: f64 = 50.0;

/// Minimum computed opacity for a node to count as visible
const MIN_OPACITY: f64 = 0.1;

/// Attributes worth keeping on an element record
const KEPT_ATTRIBUTES: &[&str] = &[
    "href",
    "type",
    "name",
    "placeholder",
    "aria-label",
    "title",
    "alt",
    "role",
    "action",
    "method",
    "value",
];

/// Labels are truncated to this many characters
const MAX_LABEL_CHARS: usize = 80;

/// Extracts the ordered interactive elements from a snapshot
///
/// Nodes matched by several rules keep the first rule's type. Invisible nodes
/// are dropped before labels are assigned, so fallback indices are dense.
pub fn extract_elements(snapshot: &DomSnapshot) -> Vec<InteractiveElement> {
    let mut seen = HashSet::new();
    let mut elements = Vec::new();

    for node in snapshot
        .nodes
        .iter()
        .filter(|n| n.group == NodeGroup::Interactive)
    {
        let Some(rule) = rules::rule(node.rule) else {
            continue;
        };
        if !seen.insert(node.path.as_str()) {
            continue;
        }
        if !is_visible(node) {
            continue;
        }
        elements.push(build_element(node, rule, elements.len()));
    }

    order_elements(&mut elements);
    elements
}

fn build_element(node: &DomNode, rule: &ElementRule, index: usize) -> InteractiveElement {
    let text = derive_label(node, rule.element_type, index);
    let functionality = describe_functionality(node, rule.element_type, &text);

    InteractiveElement {
        id: format!("element_{}", index),
        element_type: rule.element_type,
        functionality,
        text,
        selector: synthesize_selector(node),
        position: Position {
            x: node.rect.x,
            y: node.rect.y,
        },
        size: Size {
            width: node.rect.width,
            height: node.rect.height,
        },
        attributes: kept_attributes(node),
        is_visible: true,
        importance: rule.importance,
    }
}

/// Non-zero box, not hidden by `display` or `visibility`, opacity ≥ 0.1
pub fn is_visible(node: &DomNode) -> bool {
    !node.rect.is_empty()
        && node.display != "none"
        && node.visibility != "hidden"
        && node.opacity >= MIN_OPACITY
}

/// Label priority: visible text, placeholder, aria-label, title, alt, name,
/// then `{type}_{index}`
pub fn derive_label(node: &DomNode, element_type: ElementType, index: usize) -> String {
    let text = node.text.trim();
    if !text.is_empty() {
        return truncate(text);
    }

    ["placeholder", "aria-label", "title", "alt", "name"]
        .iter()
        .find_map(|attr| node.attr(attr))
        .map(|value| truncate(value.trim()))
        .unwrap_or_else(|| format!("{}_{}", element_type.as_str(), index))
}

/// Builds a selector for the node: `#id` when it has one, otherwise the tag
/// name, narrowed with `:nth-of-type(n)` only when same-tag siblings collide
pub fn synthesize_selector(node: &DomNode) -> String {
    if let Some(id) = node.id.as_deref().filter(|id| !id.is_empty()) {
        return if is_css_identifier(id) {
            format!("#{}", id)
        } else {
            format!("[id=\"{}\"]", id.replace('\\', "\\\\").replace('"', "\\\""))
        };
    }

    if node.same_tag_siblings > 1 {
        format!("{}:nth-of-type({})", node.tag, node.nth_of_type)
    } else {
        node.tag.clone()
    }
}

/// Importance descending, then 50px rows top to bottom, then left to right
pub fn order_elements(elements: &mut [InteractiveElement]) {
    elements.sort_by(|a, b| {
        b.importance
            .cmp(&a.importance)
            .then_with(|| row_bucket(a.position.y).cmp(&row_bucket(b.position.y)))
            .then_with(|| a.position.x.partial_cmp(&b.position.x).unwrap_or(Ordering::Equal))
    });
}

fn row_bucket(y: f64) -> i64 {
    (y / ROW_BUCKET_PX).floor() as i64
}

fn describe_functionality(node: &DomNode, element_type: ElementType, label: &str) -> String {
    match element_type {
        ElementType::Button => match node.attr("type") {
            Some("submit") => format!("Submits the form with \"{}\"", label),
            Some("reset") => format!("Resets the form with \"{}\"", label),
            _ => format!("Performs the \"{}\" action", label),
        },
        ElementType::Link => match node.attr("href") {
            Some(href) => format!("Opens \"{}\" ({})", label, href),
            None => format!("Opens \"{}\"", label),
        },
        ElementType::Input => {
            let kind = node.attr("type").unwrap_or("text");
            format!("Accepts {} input for \"{}\"", kind, label)
        }
        ElementType::TextArea => format!("Accepts multi-line text for \"{}\"", label),
        ElementType::Select => format!("Chooses a value for \"{}\"", label),
        ElementType::Checkbox => format!("Toggles \"{}\"", label),
        ElementType::Radio => format!("Selects the \"{}\" option", label),
        ElementType::Form => match node.attr("action") {
            Some(action) => format!("Collects input for \"{}\" and sends it to {}", label, action),
            None => format!("Collects input for \"{}\"", label),
        },
        ElementType::Tab => format!("Switches to the \"{}\" tab", label),
        ElementType::MenuItem => format!("Runs the \"{}\" menu command", label),
        ElementType::Clickable => format!("Responds to clicks on \"{}\"", label),
    }
}

fn kept_attributes(node: &DomNode) -> BTreeMap<String, String> {
    node.attributes
        .iter()
        .filter(|(name, _)| KEPT_ATTRIBUTES.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn truncate(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_LABEL_CHARS {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(MAX_LABEL_CHARS).collect();
        format!("{}…", cut.trim_end())
    }
}

fn is_css_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        Some('-') => {
            if !matches!(chars.clone().next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-')
            {
                return false;
            }
        }
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
