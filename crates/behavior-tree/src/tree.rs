//! The root node and the arena it owns.
//!
//! [`BehaviorTree`] plays the role of the root node: it owns every node of
//! the tree, drives the per-tick update, keeps the UID registry used for
//! cross-tree lookups and restarts its single child whenever it completes.

use std::collections::{BTreeMap, HashMap, VecDeque};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::behavior::{Deferred, DeferredAction, TimerAction};
use crate::blackboard::Blackboard;
use crate::config::TreeConfig;
use crate::error::{Result, TreeError};
use crate::node::{Node, NodeId, NodeKind};
use crate::status::NodeState;
use crate::timer::{Clock, TimerService};

pub struct BehaviorTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) config: TreeConfig,
    pub(crate) clock: Clock,
    pub(crate) timers: TimerService<TimerAction>,
    pub(crate) deferred: VecDeque<Deferred>,
    pub(crate) rng: ChaCha8Rng,
    /// While silent, ticks are dropped and the tree is frozen in place.
    pub(crate) silent: bool,
    /// Observer decorators currently watching each blackboard key.
    pub(crate) subscriptions: BTreeMap<String, Vec<NodeId>>,
    pub(crate) last_sync_ids: Option<Vec<String>>,
    /// Set while a synchronization stops unwanted nodes.
    pub(crate) reconciling: bool,
    registry: HashMap<String, NodeId>,
    registry_stale: bool,
    pub(crate) next_listener: u64,
}

impl BehaviorTree {
    /// Create an empty tree with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, TreeConfig::default())
    }

    /// Create an empty tree; `config.seed` drives shuffles and timer jitter.
    pub fn with_config(name: impl Into<String>, config: TreeConfig) -> Self {
        Self {
            nodes: vec![Node::new(name, NodeKind::Root)],
            clock: Clock::new(),
            timers: TimerService::new(config.seed),
            deferred: VecDeque::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1)),
            silent: false,
            subscriptions: BTreeMap::new(),
            last_sync_ids: None,
            reconciling: false,
            registry: HashMap::new(),
            registry_stale: true,
            next_listener: 0,
            config,
        }
    }

    /// Handle of the root, always [`NodeId::ROOT`].
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// The root's name, which is also the first segment of every UID.
    pub fn name(&self) -> &str {
        self.nodes[0].name()
    }

    /// Configuration the tree was built with.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Elapsed time and tick count of this tree.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Read access to a node, `None` for a handle from another tree.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Number of nodes in the arena, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: the root is part of the arena.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Current state of `id`; unknown handles read as `Inactive`.
    pub fn state(&self, id: NodeId) -> NodeState {
        self.nodes
            .get(id.0)
            .map_or(NodeState::Inactive, |node| node.state)
    }

    /// `true` if `id` is `Active`; a `Stopping` node is not.
    pub fn is_active(&self, id: NodeId) -> bool {
        self.state(id) == NodeState::Active
    }

    /// Parent of `id`; `None` for the root, detached or unknown nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    /// Children of `id` in canonical order; empty for unknown handles.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id.0) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    pub(crate) fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.registry_stale = true;
        id
    }

    /// Attach the detached node `child` as the last child of `parent`.
    ///
    /// Attaching a node to the parent it already has is a no-op.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_handle(parent)?;
        self.check_handle(child)?;

        if self.nodes[child.0].is_root() {
            return Err(TreeError::IllegalReparent { node: child });
        }
        match self.nodes[child.0].parent {
            Some(current) if current == parent => return Ok(()),
            Some(current) => {
                return Err(TreeError::AlreadyParented {
                    child,
                    parent: current,
                });
            }
            None => {}
        }
        if child == parent || self.is_ancestor_of(child, parent) {
            return Err(TreeError::Cycle { child, parent });
        }

        let node_type = self.nodes[parent.0].node_type();
        if let Some(limit) = node_type.child_limit()
            && self.nodes[parent.0].children.len() >= limit
        {
            return Err(TreeError::ChildLimit {
                parent,
                kind: node_type,
                limit,
            });
        }

        let position = self.nodes[parent.0].children.len();
        self.nodes[parent.0].children.push(child);
        if let Some(composite) = self.nodes[parent.0].kind.composite_mut() {
            composite.push_child(position);
        }
        self.nodes[child.0].parent = Some(parent);
        self.registry_stale = true;
        Ok(())
    }

    fn check_handle(&self, id: NodeId) -> Result<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(TreeError::InvalidHandle(id))
        }
    }

    /// `true` if `ancestor` lies strictly above `node`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// `true` if any candidate is `id` itself or one of its descendants.
    pub fn is_ancestor_of_one_or_more(&self, id: NodeId, candidates: &[NodeId]) -> bool {
        candidates
            .iter()
            .any(|&candidate| candidate == id || self.is_ancestor_of(id, candidate))
    }

    /// First node named `name` in depth-first order from the root.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.descendants(NodeId::ROOT)
            .into_iter()
            .find(|&id| self.nodes[id.0].name() == name)
    }

    /// `id` and every node below it, in depth-first pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Path-based identifier, stable for a given tree shape.
    ///
    /// The root is identified by its name; every other node appends
    /// `/{index}:{name}` to its parent's id. A detached node is identified
    /// relative to the top of its own subtree.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidHandle`] if `id` does not belong to this tree.
    pub fn uid(&self, id: NodeId) -> Result<String> {
        self.check_handle(id)?;
        Ok(self.path_uid(id))
    }

    /// [`uid`](Self::uid) for a handle known to be in range.
    pub(crate) fn path_uid(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            let index = self
                .children(parent)
                .iter()
                .position(|&child| child == current)
                .unwrap_or_default();
            segments.push(format!("{}:{}", index, self.nodes[current.0].name()));
            current = parent;
        }
        segments.push(self.nodes[current.0].name().to_owned());
        segments.reverse();
        segments.join("/")
    }

    /// Rebuild the UID registry from the current tree shape.
    pub fn populate_registry(&mut self) {
        let registry = self
            .descendants(NodeId::ROOT)
            .into_iter()
            .map(|id| (self.path_uid(id), id))
            .collect();
        self.registry = registry;
        self.registry_stale = false;
    }

    pub(crate) fn ensure_registry(&mut self) {
        if self.registry_stale {
            self.populate_registry();
        }
    }

    /// Resolve a UID through the registry snapshot.
    pub fn node_by_uid(&self, uid: &str) -> Result<NodeId> {
        if self.registry_stale {
            return Err(TreeError::StaleRegistry);
        }
        self.registry
            .get(uid)
            .copied()
            .ok_or_else(|| TreeError::UnknownNode(uid.to_owned()))
    }

    /// `true` while ticks are dropped, after [`sleep`](Self::sleep) or a silent root start.
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Freeze the tree: ticks are dropped until [`wake`](Self::wake).
    pub fn sleep(&mut self) {
        self.silent = true;
    }

    /// Resume ticking after [`sleep`](Self::sleep).
    pub fn wake(&mut self) {
        self.silent = false;
    }

    /// Node IDs applied by the most recent id-based synchronization.
    pub fn last_sync_ids(&self) -> Option<&[String]> {
        self.last_sync_ids.as_deref()
    }

    /// Start the root; its child is started on the next tick.
    pub fn start(&mut self, blackboard: &mut Blackboard) -> bool {
        let started = self.start_node(NodeId::ROOT, blackboard, false);
        if started {
            tracing::debug!("Behavior tree '{}' started", self.name());
        }
        started
    }

    /// Ask the root to stop; completion may take further ticks.
    pub fn stop(&mut self, blackboard: &mut Blackboard) -> bool {
        self.request_stop_node(NodeId::ROOT, blackboard, false)
    }

    /// Advance the tree by one external frame.
    ///
    /// Deferred actions registered since the previous tick run first, in
    /// registration order, then running nodes are updated leaves-first.
    pub fn tick(&mut self, delta: f32, blackboard: &mut Blackboard) -> Result<()> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(TreeError::InvalidDelta(delta));
        }
        self.clock.advance(delta);
        if self.silent {
            return Ok(());
        }

        self.run_deferred(blackboard);
        self.update_recursively(NodeId::ROOT, blackboard);
        Ok(())
    }

    pub(crate) fn root_started(&mut self, silent: bool) {
        if silent {
            self.silent = true;
        } else {
            self.silent = false;
            self.defer(NodeId::ROOT, DeferredAction::StartFirstChild);
        }
    }

    pub(crate) fn root_stopping(&mut self, blackboard: &mut Blackboard) {
        let child_running = self
            .children(NodeId::ROOT)
            .first()
            .is_some_and(|&child| self.state(child).is_running());
        if child_running {
            self.stop_children(NodeId::ROOT, blackboard);
        } else {
            self.defer(NodeId::ROOT, DeferredAction::Stop { success: true });
        }
    }

    pub(crate) fn root_child_stopped(&mut self, success: bool) {
        // Restart one tick later so an instantly completing subtree cannot
        // recurse without bound.
        if self.state(NodeId::ROOT) == NodeState::Stopping {
            self.defer(NodeId::ROOT, DeferredAction::Stop { success });
        } else {
            self.defer(NodeId::ROOT, DeferredAction::StartFirstChild);
        }
    }
}

impl std::fmt::Debug for BehaviorTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorTree")
            .field("name", &self.name())
            .field("nodes", &self.nodes.len())
            .field("silent", &self.silent)
            .field("clock", &self.clock)
            .finish()
    }
}
