//! Active-leaf synchronization between trees of identical shape.
//!
//! A leader tree publishes its [`LeafSet`] (the UIDs of its active leaves)
//! and a follower calls [`BehaviorTree::sync_active_leaves_wire`] (or one of
//! its siblings) to reach the same active set. Afterwards a node of the
//! follower is active exactly when it is a target or an ancestor of one.

use std::collections::BTreeSet;

use crate::behavior::DeferredAction;
use crate::blackboard::Blackboard;
use crate::config::TreeConfig;
use crate::error::Result;
use crate::node::{KindTag, NodeId};
use crate::status::NodeState;
use crate::tree::BehaviorTree;

/// Ordered list of node UIDs describing a tree's active leaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct LeafSet {
    ids: Vec<String>,
}

impl LeafSet {
    /// Wrap UIDs in the order the leader reported them.
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    /// The UIDs, in depth-first order of the tree they were taken from.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Number of leaves in the set.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// `true` for a tree with nothing running.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Flatten to a single `separator`-delimited string.
    ///
    /// UIDs must not contain `separator`; trees built from blueprints reject
    /// such node names with [`TreeError::SeparatorInName`](crate::TreeError).
    pub fn to_wire(&self, separator: char) -> String {
        let mut wire = String::new();
        for (index, id) in self.ids.iter().enumerate() {
            if index > 0 {
                wire.push(separator);
            }
            wire.push_str(id);
        }
        wire
    }

    /// Parse a flattened set. The empty string is the empty set.
    pub fn from_wire(wire: &str, separator: char) -> Self {
        if wire.is_empty() {
            return Self::default();
        }
        Self {
            ids: wire.split(separator).map(str::to_owned).collect(),
        }
    }
}

impl From<Vec<String>> for LeafSet {
    fn from(ids: Vec<String>) -> Self {
        Self::new(ids)
    }
}

impl std::fmt::Display for LeafSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire(TreeConfig::DEFAULT_SYNC_SEPARATOR))
    }
}

impl BehaviorTree {
    /// Active nodes without an active child, in depth-first canonical order.
    pub fn active_leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        if self.is_active(NodeId::ROOT) {
            self.collect_active_leaves(NodeId::ROOT, &mut leaves);
        }
        leaves
    }

    fn collect_active_leaves(&self, node: NodeId, leaves: &mut Vec<NodeId>) {
        let mut has_active_child = false;
        for &child in self.children(node) {
            if self.is_active(child) {
                has_active_child = true;
                self.collect_active_leaves(child, leaves);
            }
        }
        if !has_active_child {
            leaves.push(node);
        }
    }

    /// Snapshot of [`active_leaves`](Self::active_leaves) as UIDs.
    pub fn active_leaf_set(&self) -> LeafSet {
        LeafSet::new(
            self.active_leaves()
                .into_iter()
                .map(|id| self.path_uid(id))
                .collect(),
        )
    }

    /// Stop every running node that is neither a target nor an ancestor of
    /// one, then start the path to each inactive target.
    ///
    /// Nodes are stopped deepest first, with `silent` passed to each stop.
    /// Parents do not react to these stops; instead, after a non-silent sync,
    /// every wanted node left active without a running child picks up its
    /// work on the next tick (a composite advances, the root or a decorator
    /// starts its child). With `silent` set, nodes only update their
    /// bookkeeping. Returns `false` if a path could not be started; the nodes
    /// already changed keep their new state.
    pub fn sync_active_leaves(
        &mut self,
        targets: &[NodeId],
        blackboard: &mut Blackboard,
        silent: bool,
    ) -> bool {
        let mut wanted = BTreeSet::new();
        for &target in targets {
            if self.node(target).is_none() {
                tracing::warn!("Cannot synchronize to unknown node {:?}", target);
                return false;
            }
            let mut current = Some(target);
            while let Some(id) = current {
                if !wanted.insert(id) {
                    break;
                }
                current = self.parent(id);
            }
        }

        let mut stopped = 0;
        self.reconciling = true;
        for id in self.descendants(NodeId::ROOT).into_iter().rev() {
            if wanted.contains(&id) || !self.state(id).is_running() {
                continue;
            }
            self.request_stop_node(id, blackboard, silent);
            self.stop_node(id, false, blackboard, silent);
            stopped += 1;
        }
        self.reconciling = false;

        if !silent {
            for &id in &wanted {
                if self.is_stalled(id) {
                    self.defer(id, DeferredAction::Resume);
                }
            }
        }

        let mut started = 0;
        for &target in targets {
            if self.is_active(target) {
                continue;
            }
            if !self.start_node_path(target, blackboard, silent) {
                tracing::warn!(
                    "Synchronization of '{}' stopped at {}",
                    self.name(),
                    self.path_uid(target)
                );
                return false;
            }
            started += 1;
        }

        tracing::debug!(
            "Synchronized '{}' to {} leaves (stopped {}, started {} paths)",
            self.name(),
            targets.len(),
            stopped,
            started
        );
        true
    }

    /// An active inner node with no running child and nothing scheduled to
    /// start one.
    fn is_stalled(&self, node: NodeId) -> bool {
        if !self.is_active(node) || self.tag(node) == KindTag::Action {
            return false;
        }
        let child_running = self
            .children(node)
            .iter()
            .any(|&child| self.state(child).is_running());
        !child_running && !self.is_polling(node) && !self.has_pending_child_start(node)
    }

    pub(crate) fn resume_node(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        if !self.is_stalled(node) {
            return;
        }
        tracing::trace!("Resuming {:?} after synchronization", node);
        match self.tag(node) {
            KindTag::Sequence | KindTag::Selector => self.advance_composite(node, blackboard),
            KindTag::Observer => self.observer_started(node, blackboard),
            KindTag::WaitForCondition => self.wait_started(node, blackboard),
            KindTag::Root | KindTag::Inverter | KindTag::Succeeder => {
                match self.children(node).first().copied() {
                    Some(child) => {
                        self.start_node(child, blackboard, false);
                    }
                    None if node != NodeId::ROOT => {
                        self.stop_node(node, false, blackboard, false);
                    }
                    None => {}
                }
            }
            KindTag::Action => {}
        }
    }

    /// Start every inactive node from the root down to `node`.
    ///
    /// Composite ancestors are pointed at the started child so that they
    /// continue from it, and any pending "start my child" work of the path is
    /// cancelled. Returns `false` if `node` is detached from the root or a
    /// node on the path refuses to become active.
    pub fn start_node_path(
        &mut self,
        node: NodeId,
        blackboard: &mut Blackboard,
        silent: bool,
    ) -> bool {
        let mut path = vec![node];
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            path.push(parent);
            current = parent;
        }
        if current != NodeId::ROOT {
            return false;
        }
        path.reverse();

        let mut parent = None;
        for id in path {
            if self.is_active(id) {
                parent = Some(id);
                continue;
            }
            if let Some(parent) = parent {
                self.cancel_pending_child_start(parent);
                self.remove_wait_timer(parent);
                self.align_cursor(parent, id);
            }

            self.start_node(id, blackboard, silent);
            if self.state(id) != NodeState::Active {
                tracing::warn!("Path start refused by {}", self.path_uid(id));
                return false;
            }
            parent = Some(id);
        }
        true
    }

    /// [`sync_active_leaves`](Self::sync_active_leaves) with node UIDs.
    ///
    /// The registry is rebuilt first if the tree changed since the last
    /// lookup. Fails with [`TreeError::UnknownNode`](crate::TreeError) for
    /// an unresolvable UID, before any node is touched.
    pub fn sync_active_leaves_by_id<S: AsRef<str>>(
        &mut self,
        ids: &[S],
        blackboard: &mut Blackboard,
        silent: bool,
    ) -> Result<bool> {
        self.ensure_registry();
        let targets = ids
            .iter()
            .map(|id| self.node_by_uid(id.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.last_sync_ids = Some(ids.iter().map(|id| id.as_ref().to_owned()).collect());
        Ok(self.sync_active_leaves(&targets, blackboard, silent))
    }

    /// [`sync_active_leaves`](Self::sync_active_leaves) with a flattened
    /// [`LeafSet`].
    pub fn sync_active_leaves_wire(
        &mut self,
        wire: &str,
        separator: char,
        blackboard: &mut Blackboard,
        silent: bool,
    ) -> Result<bool> {
        let leaves = LeafSet::from_wire(wire, separator);
        self.sync_active_leaves_by_id(leaves.ids(), blackboard, silent)
    }
}
