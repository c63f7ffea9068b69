//! Category tree walker
//!
//! The tree renders lazily: only the children of an activated node become
//! queryable. [`discover_root`] reads whatever is rendered under the tree
//! root once; [`discover_children`] is called per category after it has been
//! activated.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::js_scripts::{CHILD_CATEGORIES_SCRIPT, COLLECT_CATEGORIES_SCRIPT};
use crate::automation::{AutomationError, AutomationResult, FrameHandle};
use crate::models::{Category, category_id};
use crate::utils::{NAVIGATION_MARKERS, TREE_ROOT_LABEL, clean_label};

#[derive(Debug, Clone, Default, Deserialize)]
struct RawLink {
    #[serde(default)]
    name: String,
    #[serde(default)]
    href: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTreeNode {
    name: String,
    #[serde(default)]
    href: String,
    #[serde(default)]
    depth: u32,
    #[serde(default)]
    has_children: bool,
    #[serde(default)]
    parent: Option<RawLink>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChild {
    name: String,
    #[serde(default)]
    href: String,
    #[serde(default)]
    has_children: bool,
}

#[derive(Debug, Deserialize)]
struct RawChildren {
    found: bool,
    #[serde(default)]
    children: Vec<RawChild>,
}

/// Outcome of a direct-children query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildDiscovery {
    /// The parent's tree item is not rendered (collapsed, or the tree reloaded)
    NotFound,
    /// The parent is rendered but has no usable children
    NoChildren,
    Children(Vec<Category>),
}

fn decode<T: for<'de> Deserialize<'de>>(raw: Value, what: &str) -> AutomationResult<T> {
    serde_json::from_value(raw).map_err(|e| AutomationError::Script(format!("{what}: {e}")))
}

/// Turn raw tree nodes into categories
///
/// Placeholder links are dropped while their descendants are kept; a
/// descendant's `parent_id` still names the placeholder, so it shows up as a
/// top-level node for partitioning.
fn categories_from_nodes(nodes: Vec<RawTreeNode>) -> Vec<Category> {
    nodes
        .into_iter()
        .filter_map(|node| {
            let name = clean_label(&node.name);
            let parent_id = node.parent.map(|p| category_id(&p.href, &clean_label(&p.name)));
            Category::from_link(&name, &node.href, parent_id, node.depth, node.has_children)
        })
        .collect()
}

/// Every category currently rendered below the tree root, in document order
pub async fn discover_root<F: FrameHandle>(navigation: &F) -> AutomationResult<Vec<Category>> {
    let raw = navigation
        .evaluate(
            COLLECT_CATEGORIES_SCRIPT,
            vec![Value::from(TREE_ROOT_LABEL), Value::from(NAVIGATION_MARKERS[0])],
        )
        .await?;
    let nodes: Vec<RawTreeNode> = decode(raw, "category tree")?;
    let total = nodes.len();
    let categories = categories_from_nodes(nodes);
    debug!(
        "Discovered {} categories ({} placeholders skipped)",
        categories.len(),
        total - categories.len()
    );
    Ok(categories)
}

/// Direct children of `parent`, located by its exact link label
pub async fn discover_children<F: FrameHandle>(
    navigation: &F,
    parent: &Category,
) -> AutomationResult<ChildDiscovery> {
    let raw = navigation
        .evaluate(CHILD_CATEGORIES_SCRIPT, vec![Value::from(parent.name.as_str())])
        .await?;
    let result: RawChildren = decode(raw, "child categories")?;
    if !result.found {
        return Ok(ChildDiscovery::NotFound);
    }
    let children: Vec<Category> = result
        .children
        .into_iter()
        .filter_map(|child| {
            Category::from_link(
                &clean_label(&child.name),
                &child.href,
                Some(parent.id.clone()),
                parent.depth + 1,
                child.has_children,
            )
        })
        .collect();
    Ok(if children.is_empty() {
        ChildDiscovery::NoChildren
    } else {
        ChildDiscovery::Children(children)
    })
}

/// Categories whose parent is absent from `categories`
///
/// Partitioning only these keeps workers disjoint: everything below a root
/// is reached by expanding that root.
#[must_use]
pub fn top_level(categories: &[Category]) -> Vec<Category> {
    let ids: std::collections::HashSet<&str> = categories.iter().map(|c| c.id.as_str()).collect();
    categories
        .iter()
        .filter(|c| c.parent_id.as_deref().is_none_or(|p| !ids.contains(p)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nodes(value: Value) -> Vec<RawTreeNode> {
        serde_json::from_value(value).expect("nodes")
    }

    #[test]
    fn placeholder_parent_is_skipped_but_children_kept() {
        let cats = categories_from_nodes(nodes(json!([
            { "name": "imageA", "href": "javascript:emptyPage()", "depth": 1, "hasChildren": true, "parent": null },
            { "name": "A1", "href": "tree?levelCode=01.01", "depth": 2, "hasChildren": false,
              "parent": { "name": "imageA", "href": "javascript:emptyPage()" } },
            { "name": "A2", "href": "tree?levelCode=01.02", "depth": 2, "hasChildren": false,
              "parent": { "name": "imageA", "href": "javascript:emptyPage()" } },
            { "name": "B", "href": "tree?levelCode=02", "depth": 1, "hasChildren": false, "parent": null }
        ])));
        let ids: Vec<&str> = cats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["01.01", "01.02", "02"]);
        assert_eq!(cats[0].parent_id.as_deref(), Some("A"));

        let roots = top_level(&cats);
        assert_eq!(roots.len(), 3);
    }

    #[test]
    fn linked_parent_owns_its_children() {
        let cats = categories_from_nodes(nodes(json!([
            { "name": "Motor", "href": "tree?levelCode=01", "depth": 1, "hasChildren": true },
            { "name": "Zylinderkopf", "href": "tree?levelCode=01.01", "depth": 2,
              "parent": { "name": "Motor", "href": "tree?levelCode=01" } }
        ])));
        assert_eq!(cats[1].parent_id.as_deref(), Some("01"));
        let roots = top_level(&cats);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "Motor");
    }

    #[test]
    fn name_is_used_when_level_code_missing() {
        let cats = categories_from_nodes(nodes(json!([
            { "name": "Getriebe", "href": "/tree/show?node=7", "depth": 1 }
        ])));
        assert_eq!(cats[0].id, "Getriebe");
    }
}
