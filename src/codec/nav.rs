//! Navigation subtree codec.
//!
//! A `nav` node carries its whole menu as a [`NavEntry`] hierarchy. On the live
//! tree the menu is rendered as
//!
//! ```text
//! nav > details[open] > (summary "NAV", menu > li > (a, ul > li ...))
//! ```
//!
//! where each link's href is the concatenation of its ancestors' names and its
//! own. Rendering issues a [`ProbeTicket`] per link that does not point at the
//! current page; completing a ticket with a failed result marks the link
//! `broken`.

use crate::live::{LiveTree, NodeId, TreeId};
use crate::schema::NavEntry;

use super::CodecConfig;

pub const NAV_BASE_CLASS: &str = "nav-base";
pub const SELF_CLASS: &str = "self";
pub const BROKEN_CLASS: &str = "broken";

/// Href used for an entry whose accumulated target is empty.
const EMPTY_TARGET: &str = "./";

/// Resolves menu targets against the page the menu is shown on.
pub trait LinkResolver {
    /// Absolute form of `target`, or `None` when it cannot be resolved.
    fn resolve(&self, target: &str) -> Option<String>;

    /// Absolute address of the current page.
    fn current(&self) -> &str;
}

#[cfg(feature = "url")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    page: url::Url,
}

#[cfg(feature = "url")]
impl UrlResolver {
    pub fn new(page: url::Url) -> Self {
        Self { page }
    }

    pub fn parse(page: &str) -> Result<Self, url::ParseError> {
        url::Url::parse(page).map(Self::new)
    }
}

#[cfg(feature = "url")]
impl LinkResolver for UrlResolver {
    fn resolve(&self, target: &str) -> Option<String> {
        self.page.join(target).ok().map(String::from)
    }

    fn current(&self) -> &str {
        self.page.as_str()
    }
}

/// A pending existence check for one rendered link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTicket {
    pub tree: TreeId,
    pub node: NodeId,
    pub url: String,
}

impl ProbeTicket {
    /// Applies a probe result. Returns whether the tree was touched.
    ///
    /// Results for another tree, or for a link that has since been detached,
    /// are ignored.
    pub fn complete(&self, tree: &mut LiveTree, ok: bool) -> bool {
        if tree.id() != self.tree || !tree.is_attached(self.node) || tree.tag(self.node) != Some("a") {
            tracing::debug!(url = %self.url, "discarding stale probe result");
            return false;
        }
        if !ok {
            tree.add_class(self.node, BROKEN_CLASS);
        }
        true
    }
}

/// Checks whether a resolved link target exists.
pub trait ExistenceCheck {
    fn exists(&mut self, url: &str) -> bool;
}

impl<F> ExistenceCheck for F
where
    F: FnMut(&str) -> bool,
{
    fn exists(&mut self, url: &str) -> bool {
        self(url)
    }
}

/// Runs every ticket through `check` and applies the results. Returns the
/// number of links marked broken.
pub fn run_probes<C: ExistenceCheck + ?Sized>(
    tree: &mut LiveTree,
    tickets: &[ProbeTicket],
    check: &mut C,
) -> usize {
    let mut broken = 0;
    for ticket in tickets {
        let ok = check.exists(&ticket.url);
        if ticket.complete(tree, ok) && !ok {
            tracing::debug!(url = %ticket.url, "link target missing");
            broken += 1;
        }
    }
    broken
}

/// Renders `entries` into the `nav` element and returns the probe tickets.
pub(crate) fn render_menu(
    tree: &mut LiveTree,
    nav: NodeId,
    entries: &[NavEntry],
    config: &CodecConfig,
    resolver: Option<&dyn LinkResolver>,
) -> Vec<ProbeTicket> {
    let details = tree.create_element("details");
    if config.nav_open {
        tree.set_attribute(details, "open", "");
    }
    let summary = tree.create_element("summary");
    tree.set_text_content(summary, &config.nav_label);
    tree.append_child(details, summary);

    let menu = tree.create_element("menu");
    let mut probes = Vec::new();
    for entry in entries {
        let item = render_item(tree, "", entry, resolver, &mut probes);
        tree.append_child(menu, item);
    }
    tree.append_child(details, menu);
    tree.append_child(nav, details);
    probes
}

fn render_item(
    tree: &mut LiveTree,
    base: &str,
    entry: &NavEntry,
    resolver: Option<&dyn LinkResolver>,
    probes: &mut Vec<ProbeTicket>,
) -> NodeId {
    let item = tree.create_element("li");
    let link = tree.create_element("a");
    let target = format!("{base}{}", entry.name);
    let href = if target.is_empty() { EMPTY_TARGET } else { target.as_str() };
    tree.set_attribute(link, "href", href);

    if target.is_empty() || !base.is_empty() {
        let prefix = tree.create_element("span");
        tree.add_class(prefix, NAV_BASE_CLASS);
        tree.set_text_content(prefix, if target.is_empty() { EMPTY_TARGET } else { base });
        tree.append_child(link, prefix);
    }
    let name = tree.create_text(entry.name.as_str());
    tree.append_child(link, name);

    if let Some(resolver) = resolver
        && let Some(url) = resolver.resolve(href)
    {
        if url == resolver.current() {
            tree.add_class(link, SELF_CLASS);
        } else {
            probes.push(ProbeTicket {
                tree: tree.id(),
                node: link,
                url,
            });
        }
    }
    tree.append_child(item, link);

    if !entry.children.is_empty() {
        let list = tree.create_element("ul");
        for child in &entry.children {
            let child_item = render_item(tree, &target, child, resolver, probes);
            tree.append_child(list, child_item);
        }
        tree.append_child(item, list);
    }
    item
}

/// Reads the menu hierarchy back from a rendered `nav` element.
pub(crate) fn serialize_menu(tree: &LiveTree, nav: NodeId) -> Vec<NavEntry> {
    let Some(menu) = tree.find_descendant(nav, "menu") else {
        return Vec::new();
    };
    element_children(tree, menu)
        .map(|item| serialize_item(tree, item))
        .collect()
}

fn element_children(tree: &LiveTree, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    tree.children(node)
        .iter()
        .copied()
        .filter(|&child| tree.element(child).is_some())
}

fn serialize_item(tree: &LiveTree, item: NodeId) -> NavEntry {
    let name = entry_name(tree, tree.child(item, 0));
    let children = match tree.find_descendant(item, "ul") {
        Some(list) => element_children(tree, list)
            .map(|child| serialize_item(tree, child))
            .collect(),
        None => Vec::new(),
    };
    NavEntry { name, children }
}

// The name is the text after the base prefix when one is present, else the
// link's only text leaf.
fn entry_name(tree: &LiveTree, link: Option<NodeId>) -> String {
    let Some(link) = link else {
        return String::new();
    };
    let leaf = match tree.children(link) {
        [] => None,
        [only] => Some(*only),
        [_, second, ..] => Some(*second),
    };
    leaf.and_then(|leaf| tree.text(leaf))
        .unwrap_or_default()
        .to_string()
}
