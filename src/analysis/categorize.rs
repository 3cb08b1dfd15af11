use crate::crawler::PageRecord;
use crate::detector::ElementType;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Kind of screen a page is, used to group manual sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageCategory {
    Login,
    Dashboard,
    Form,
    List,
    Settings,
    Detail,
    Other,
}

impl PageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Dashboard => "dashboard",
            Self::Form => "form",
            Self::List => "list",
            Self::Settings => "settings",
            Self::Detail => "detail",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for PageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const LOGIN_WORDS: &[&str] = &["login", "signin", "sign", "auth", "authenticate"];
const SETTINGS_WORDS: &[&str] = &["settings", "preferences", "account", "profile", "config", "configuration"];
const DASHBOARD_WORDS: &[&str] = &["dashboard", "home", "overview", "summary"];
const LIST_WORDS: &[&str] = &["list", "search", "results", "browse", "catalog", "index"];
const DETAIL_WORDS: &[&str] = &["detail", "details", "view", "show"];

/// Form fields on a page before it counts as a form screen
const FORM_FIELD_THRESHOLD: usize = 3;

/// Assigns the first matching category
///
/// Checked in order: password field or login wording, settings wording,
/// dashboard wording, form fields, list wording, detail wording or an id-like
/// last path segment.
pub fn categorize(page: &PageRecord) -> PageCategory {
    let words = page_words(page);
    let has_word = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));

    let has_password = page.elements.iter().any(|e| {
        e.element_type == ElementType::Input
            && e.attributes.get("type").map(String::as_str) == Some("password")
    });
    if has_password || has_word(LOGIN_WORDS) {
        return PageCategory::Login;
    }
    if has_word(SETTINGS_WORDS) {
        return PageCategory::Settings;
    }
    if has_word(DASHBOARD_WORDS) {
        return PageCategory::Dashboard;
    }

    let form_fields = page
        .elements
        .iter()
        .filter(|e| e.element_type.is_form_field())
        .count();
    if form_fields >= FORM_FIELD_THRESHOLD {
        return PageCategory::Form;
    }
    if has_word(LIST_WORDS) {
        return PageCategory::List;
    }
    if has_word(DETAIL_WORDS) || has_id_segment(&page.url) {
        return PageCategory::Detail;
    }
    PageCategory::Other
}

/// Lowercased words of the URL path and the title
fn page_words(page: &PageRecord) -> Vec<String> {
    let path = Url::parse(&page.url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();

    format!("{} {}", path, page.title)
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether the last path segment looks like a record id
fn has_id_segment(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(last) = parsed.path_segments().and_then(|s| s.filter(|s| !s.is_empty()).last()) else {
        return false;
    };

    let numeric = last.chars().all(|c| c.is_ascii_digit());
    let uuid_like = last.len() == 36 && uuid::Uuid::parse_str(last).is_ok();
    numeric || uuid_like
}
