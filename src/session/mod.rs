//! Editable document sessions.
//!
//! Decoding a `body` root in edit mode begins a session on the target
//! container. Every editable node whose parent is not itself a region becomes
//! a region: it gets a sequential [`RegionId`], the child-index path from the
//! root, and a snapshot of its serialized form. Input events mark regions
//! dirty; blur events clear the mark when the content is back to its snapshot.
//! [`EditSession::commit`] hands one [`ChangeRecord`] per dirty region to the
//! session's [`ChangeSink`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::codec::serialize;
use crate::live::{LiveTree, NodeId, TreeId};
use crate::schema::DocItem;

pub const EDITABLE_CLASS: &str = "editable";
pub const EDITED_CLASS: &str = "edited";
pub const REGION_ID_ATTR: &str = "data-id";
pub const CONTENT_EDITABLE_ATTR: &str = "contenteditable";

pub type RegionId = u64;

/// A registered editable region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Child indices from the session root down to the region.
    pub path: Vec<usize>,
    pub node: NodeId,
}

/// One committed region: where it sits and what it now contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub position: Vec<usize>,
    pub new_content: DocItem,
}

/// Receives committed changes.
pub trait ChangeSink {
    fn submit(&mut self, record: ChangeRecord);
}

impl ChangeSink for Vec<ChangeRecord> {
    fn submit(&mut self, record: ChangeRecord) {
        self.push(record);
    }
}

/// Adapts a closure into a [`ChangeSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(ChangeRecord)> ChangeSink for FnSink<F> {
    fn submit(&mut self, record: ChangeRecord) {
        (self.0)(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Value written to the `contenteditable` attribute of each region.
    pub editable_mode: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            editable_mode: "plaintext-only".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Editing { tree: TreeId, root: NodeId },
}

#[derive(Debug)]
pub struct EditSession<S: ChangeSink = Vec<ChangeRecord>> {
    config: SessionConfig,
    state: SessionState,
    next_id: RegionId,
    regions: BTreeMap<RegionId, Region>,
    by_node: HashMap<NodeId, RegionId>,
    snapshots: HashMap<NodeId, String>,
    dirty: BTreeSet<RegionId>,
    sink: S,
}

impl EditSession {
    pub fn new() -> Self {
        Self::with_sink(Vec::new())
    }
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ChangeSink> EditSession<S> {
    pub fn with_sink(sink: S) -> Self {
        Self {
            config: SessionConfig::default(),
            state: SessionState::Idle,
            next_id: 0,
            regions: BTreeMap::new(),
            by_node: HashMap::new(),
            snapshots: HashMap::new(),
            dirty: BTreeSet::new(),
            sink,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, SessionState::Editing { .. })
    }

    pub fn root(&self) -> Option<NodeId> {
        match self.state {
            SessionState::Editing { root, .. } => Some(root),
            SessionState::Idle => None,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    /// Registered regions in id order.
    pub fn regions(&self) -> impl Iterator<Item = (RegionId, &Region)> {
        self.regions.iter().map(|(&id, region)| (id, region))
    }

    pub fn region_id(&self, node: NodeId) -> Option<RegionId> {
        self.by_node.get(&node).copied()
    }

    pub fn is_dirty(&self, id: RegionId) -> bool {
        self.dirty.contains(&id)
    }

    /// Starts editing under `root`.
    ///
    /// A session already running on another root is stopped first, which
    /// commits its pending changes. A session running on another tree cannot
    /// be committed and its dirty regions are dropped with a warning.
    /// Beginning again on the same root discards the old regions and restarts
    /// ids at 0.
    pub fn begin(&mut self, tree: &mut LiveTree, root: NodeId) {
        match self.state {
            SessionState::Editing { tree: id, root: old } if id == tree.id() && old != root => {
                self.stop(tree);
            }
            SessionState::Editing { tree: id, .. } if id != tree.id() => {
                tracing::warn!(
                    dirty = self.dirty.len(),
                    "previous session belongs to another tree, discarding its pending changes"
                );
            }
            _ => {}
        }
        self.reset();
        self.state = SessionState::Editing {
            tree: tree.id(),
            root,
        };
        tracing::debug!(root = root.index(), "edit session started");
    }

    fn reset(&mut self) {
        self.next_id = 0;
        self.regions.clear();
        self.by_node.clear();
        self.snapshots.clear();
        self.dirty.clear();
    }

    /// Registers `node` as a region and marks it editable on the tree.
    pub fn register(&mut self, tree: &mut LiveTree, node: NodeId, path: Vec<usize>) -> RegionId {
        let id = self.next_id;
        self.next_id += 1;
        tree.add_class(node, EDITABLE_CLASS);
        tree.set_attribute(node, REGION_ID_ATTR, id.to_string());
        tree.set_attribute(node, CONTENT_EDITABLE_ATTR, self.config.editable_mode.as_str());
        tracing::trace!(id, path = ?path, "registered region");
        self.regions.insert(id, Region { path, node });
        self.by_node.insert(node, id);
        id
    }

    /// Records the current content of a registered region as its clean state.
    pub fn snapshot(&mut self, tree: &LiveTree, node: NodeId) {
        if self.by_node.contains_key(&node) {
            self.snapshots.insert(node, fingerprint(tree, node));
        }
    }

    fn owns(&self, tree: &LiveTree) -> bool {
        matches!(self.state, SessionState::Editing { tree: id, .. } if id == tree.id())
    }

    // Nearest enclosing region of `node`, itself included.
    fn enclosing_region(&self, tree: &LiveTree, node: NodeId) -> Option<(RegionId, NodeId)> {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(&region) = self.by_node.get(&id) {
                return Some((region, id));
            }
            current = tree.parent(id);
        }
        None
    }

    /// Input event at `node`. Marks the enclosing region dirty.
    ///
    /// Returns `false` when no session is running on `tree` or `node` lies
    /// outside every region.
    pub fn on_input(&mut self, tree: &mut LiveTree, node: NodeId) -> bool {
        if !self.owns(tree) {
            return false;
        }
        let Some((id, region)) = self.enclosing_region(tree, node) else {
            return false;
        };
        tree.add_class(region, EDITED_CLASS);
        self.dirty.insert(id);
        tracing::trace!(id, "region edited");
        true
    }

    /// Blur event at `node`. Normalizes the region's text and clears the dirty
    /// mark when its content matches the snapshot again.
    ///
    /// Returns `false` when no session is running on `tree` or `node` lies
    /// outside every region.
    pub fn on_blur(&mut self, tree: &mut LiveTree, node: NodeId) -> bool {
        if !self.owns(tree) {
            return false;
        }
        let Some((id, region)) = self.enclosing_region(tree, node) else {
            return false;
        };
        self.reconcile(tree, id, region);
        true
    }

    fn reconcile(&mut self, tree: &mut LiveTree, id: RegionId, region: NodeId) {
        tree.normalize(region);
        if self.dirty.contains(&id) && self.snapshots.get(&region) == Some(&fingerprint(tree, region)) {
            tree.remove_class(region, EDITED_CLASS);
            self.dirty.remove(&id);
            tracing::trace!(id, "region reverted");
        }
    }

    /// Emits a [`ChangeRecord`] for every dirty region, in id order, and
    /// makes the committed content the new clean state. Returns the number of
    /// records emitted.
    pub fn commit(&mut self, tree: &mut LiveTree) -> usize {
        if !self.owns(tree) {
            return 0;
        }
        let pending: Vec<RegionId> = self.dirty.iter().copied().collect();
        let mut emitted = 0;
        for id in pending {
            let Some(Region { path, node }) = self.regions.get(&id).cloned() else {
                self.dirty.remove(&id);
                continue;
            };
            self.reconcile(tree, id, node);
            if !self.dirty.contains(&id) {
                continue;
            }
            let Some(content) = serialize(tree, node) else {
                tracing::warn!(id, "region no longer serializes, skipping");
                continue;
            };
            self.sink.submit(ChangeRecord {
                position: path,
                new_content: content,
            });
            self.snapshots.insert(node, fingerprint(tree, node));
            tree.remove_class(node, EDITED_CLASS);
            self.dirty.remove(&id);
            emitted += 1;
        }
        tracing::debug!(emitted, "committed regions");
        emitted
    }

    /// Commits pending changes, strips all edit markers under the root and
    /// returns to idle. Returns the number of records committed. Stopping an
    /// idle session does nothing.
    pub fn stop(&mut self, tree: &mut LiveTree) -> usize {
        let SessionState::Editing { root, .. } = self.state else {
            return 0;
        };
        if !self.owns(tree) {
            tracing::warn!("stopping session with a foreign tree, markers left in place");
            self.state = SessionState::Idle;
            self.reset();
            return 0;
        }
        let committed = self.commit(tree);

        let mut marked: BTreeSet<NodeId> = self.by_node.keys().copied().collect();
        marked.extend(
            tree.descendants(root)
                .into_iter()
                .filter(|&node| tree.has_class(node, EDITABLE_CLASS)),
        );
        for node in marked {
            tree.remove_class(node, EDITABLE_CLASS);
            tree.remove_class(node, EDITED_CLASS);
            tree.remove_attribute(node, REGION_ID_ATTR);
            tree.remove_attribute(node, CONTENT_EDITABLE_ATTR);
        }

        self.state = SessionState::Idle;
        self.reset();
        tracing::debug!(committed, "edit session stopped");
        committed
    }
}

/// Serialized form of a region with adjacent text merged and empty text
/// dropped, so that normalizing the live text does not count as an edit.
fn fingerprint(tree: &LiveTree, node: NodeId) -> String {
    serialize(tree, node)
        .map(canonical)
        .and_then(|item| serde_json::to_string(&item).ok())
        .unwrap_or_default()
}

fn canonical(item: DocItem) -> DocItem {
    let DocItem::Node(mut node) = item else {
        return item;
    };
    let mut children: Vec<DocItem> = Vec::with_capacity(node.children.len());
    for child in node.children.drain(..).map(canonical) {
        if let DocItem::Text(text) = &child {
            if text.is_empty() {
                continue;
            }
            if let Some(DocItem::Text(last)) = children.last_mut() {
                last.push_str(text);
                continue;
            }
        }
        children.push(child);
    }
    node.children = children;
    DocItem::Node(node)
}
