//! DOM snapshot gathered in a single script round-trip
//!
//! The element detector is a set of pure functions over [`DomSnapshot`]; the
//! only browser interaction is one `evaluate` call running [`SNAPSHOT_SCRIPT`]
//! with the selector groups to match.

use super::{BrowserError, BrowserSession, Rect, Viewport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collects every node matching the given selector groups, in rule order
///
/// `arguments[0]` is a serialized [`SnapshotQuery`]. The result deserializes
/// into [`DomSnapshot`].
pub const SNAPSHOT_SCRIPT: &str = r#"
const query = arguments[0];
const domPath = (el) => {
  const parts = [];
  let node = el;
  while (node && node.nodeType === 1 && node !== document.documentElement) {
    let index = 1;
    let sibling = node;
    while ((sibling = sibling.previousElementSibling)) index++;
    parts.unshift(node.tagName.toLowerCase() + ':nth-child(' + index + ')');
    node = node.parentElement;
  }
  return parts.join('>');
};
const describe = (el, group, rule) => {
  const box = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  const attributes = {};
  for (const attr of Array.from(el.attributes)) attributes[attr.name] = attr.value;
  const parent = el.parentElement;
  const sameTag = parent
    ? Array.from(parent.children).filter((c) => c.tagName === el.tagName)
    : [el];
  const ancestorClasses = [];
  let up = el.parentElement;
  while (up && up !== document.documentElement) {
    if (typeof up.className === 'string' && up.className) ancestorClasses.push(up.className);
    if (up.id) ancestorClasses.push(up.id);
    ancestorClasses.push(up.tagName.toLowerCase());
    up = up.parentElement;
  }
  const host = el.closest('li') || el;
  const zIndex = parseInt(style.zIndex, 10);
  return {
    group,
    rule,
    path: domPath(el),
    tag: el.tagName.toLowerCase(),
    id: el.id || null,
    text: (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim().slice(0, 200),
    attributes,
    rect: {
      x: box.left + window.scrollX,
      y: box.top + window.scrollY,
      width: box.width,
      height: box.height,
    },
    display: style.display,
    visibility: style.visibility,
    opacity: parseFloat(style.opacity),
    position: style.position,
    zIndex: isNaN(zIndex) ? 0 : zIndex,
    sameTagSiblings: sameTag.length,
    nthOfType: sameTag.indexOf(el) + 1,
    ancestorClasses,
    role: el.getAttribute('role'),
    hasSubmenu:
      el.getAttribute('aria-haspopup') === 'true' ||
      el.hasAttribute('aria-expanded') ||
      (host !== el && !!host.querySelector('ul, ol, [role="menu"]')),
  };
};
const nodes = [];
const groups = [
  ['interactive', query.interactive],
  ['navigation', query.navigation],
  ['overlay', query.overlay],
];
for (const [group, selectors] of groups) {
  selectors.forEach((selector, rule) => {
    let found = [];
    try {
      found = document.querySelectorAll(selector);
    } catch (e) {
      found = [];
    }
    found.forEach((el) => nodes.push(describe(el, group, rule)));
  });
}
return {
  viewport: { width: window.innerWidth, height: window.innerHeight },
  nodes,
};
"#;

/// Selector groups sent to the snapshot script
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotQuery {
    pub interactive: Vec<String>,
    pub navigation: Vec<String>,
    pub overlay: Vec<String>,
}

/// Which selector group a node was matched by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeGroup {
    Interactive,
    Navigation,
    Overlay,
}

/// Layout and attribute facts about one matched DOM node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomNode {
    pub group: NodeGroup,
    /// Index of the matching selector within its group
    pub rule: usize,
    /// Unique structural path, used to recognize a node matched by several rules
    pub path: String,
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default = "default_display")]
    pub display: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default)]
    pub z_index: i64,
    #[serde(default = "default_one")]
    pub same_tag_siblings: usize,
    #[serde(default = "default_one")]
    pub nth_of_type: usize,
    #[serde(default)]
    pub ancestor_classes: Vec<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub has_submenu: bool,
}

impl DomNode {
    /// A visible node with no layout quirks, positioned at `rect`
    pub fn new(group: NodeGroup, rule: usize, tag: &str, path: &str, rect: Rect) -> Self {
        Self {
            group,
            rule,
            path: path.to_string(),
            tag: tag.to_string(),
            id: None,
            text: String::new(),
            attributes: BTreeMap::new(),
            rect,
            display: default_display(),
            visibility: default_visibility(),
            opacity: default_opacity(),
            position: default_position(),
            z_index: 0,
            same_tag_siblings: 1,
            nth_of_type: 1,
            ancestor_classes: Vec::new(),
            role: None,
            has_submenu: false,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        if name == "role" {
            self.role = Some(value.to_string());
        }
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_siblings(mut self, same_tag_siblings: usize, nth_of_type: usize) -> Self {
        self.same_tag_siblings = same_tag_siblings;
        self.nth_of_type = nth_of_type;
        self
    }

    pub fn with_ancestors(mut self, classes: &[&str]) -> Self {
        self.ancestor_classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// Everything the detector needs about one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub viewport: Viewport,
    pub nodes: Vec<DomNode>,
}

/// Runs [`SNAPSHOT_SCRIPT`] against the current page
pub async fn take_snapshot(
    browser: &dyn BrowserSession,
    query: &SnapshotQuery,
) -> Result<DomSnapshot, BrowserError> {
    let argument = serde_json::to_value(query).map_err(|e| BrowserError::Script(e.to_string()))?;
    let value = browser.evaluate(SNAPSHOT_SCRIPT, vec![argument]).await?;
    serde_json::from_value(value)
        .map_err(|e| BrowserError::Script(format!("Malformed snapshot: {}", e)))
}

fn default_display() -> String {
    "block".to_string()
}

fn default_visibility() -> String {
    "visible".to_string()
}

fn default_opacity() -> f64 {
    1.0
}

fn default_position() -> String {
    "static".to_string()
}

fn default_one() -> usize {
    1
}
