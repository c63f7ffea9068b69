use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::{EMPTY_PAGE_SENTINEL, LEVEL_CODE_PARAM};

/// A node of the portal's navigation tree
///
/// Identity is `id`: the `levelCode` token of the link target, or the display
/// name when the link carries none. Visited-state is tracked by workers, never
/// on the category itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub parent_id: Option<String>,
    pub depth: u32,
    pub has_children: bool,
}

impl Category {
    /// Build a category from a tree link, or `None` for placeholder links
    ///
    /// Placeholders (empty target or the `emptyPage` sentinel) never become
    /// categories; callers still walk their subtree.
    #[must_use]
    pub fn from_link(
        name: &str,
        href: &str,
        parent_id: Option<String>,
        depth: u32,
        has_children: bool,
    ) -> Option<Self> {
        if name.is_empty() || is_placeholder_href(href) {
            return None;
        }
        Some(Self {
            id: category_id(href, name),
            name: name.to_string(),
            url: Some(href.to_string()),
            parent_id,
            depth,
            has_children,
        })
    }

    /// Token used to locate this category's link: url, else id, else name
    #[must_use]
    pub fn activation_target(&self) -> &str {
        match self.url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ if !self.id.is_empty() => &self.id,
            _ => &self.name,
        }
    }
}

/// Whether a link target marks an empty/disabled tree node
#[must_use]
pub fn is_placeholder_href(href: &str) -> bool {
    href.trim().is_empty() || href.contains(EMPTY_PAGE_SENTINEL)
}

/// Derive a category id from its link target, falling back to the label
#[must_use]
pub fn category_id(href: &str, name: &str) -> String {
    level_code(href)
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| name.to_string())
}

/// Extract the `levelCode` query parameter from an absolute or relative href
fn level_code(href: &str) -> Option<String> {
    // Tree links are mostly relative; resolve against a dummy origin.
    let base = Url::parse("http://portal.invalid/").ok()?;
    let resolved = base.join(href.trim()).ok()?;
    resolved
        .query_pairs()
        .find(|(key, _)| key == LEVEL_CODE_PARAM)
        .map(|(_, value)| value.into_owned())
}
