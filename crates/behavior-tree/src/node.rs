//! Arena-stored node records.
//!
//! A [`Node`] is the common state machine every tree element shares: its
//! lifecycle state, structural links and listener table. What the node *does*
//! when started, stopped or updated is selected by its [`NodeKind`].

use crate::action::ActionNode;
use crate::composite::CompositeNode;
use crate::decorator::{ObserverNode, WaitNode};
use crate::event::Listeners;
use crate::status::{NodeState, NodeType};

/// Handle to a node inside its owning tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The root node of every tree.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Behaviour attached to a node, with its per-activation state.
pub(crate) enum NodeKind {
    Root,
    Sequence(CompositeNode),
    Selector(CompositeNode),
    Observer(ObserverNode),
    WaitForCondition(WaitNode),
    Inverter,
    Succeeder,
    Action(ActionNode),
}

/// Data-free view of [`NodeKind`] used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KindTag {
    Root,
    Sequence,
    Selector,
    Observer,
    WaitForCondition,
    Inverter,
    Succeeder,
    Action,
}

impl NodeKind {
    pub(crate) fn tag(&self) -> KindTag {
        match self {
            NodeKind::Root => KindTag::Root,
            NodeKind::Sequence(_) => KindTag::Sequence,
            NodeKind::Selector(_) => KindTag::Selector,
            NodeKind::Observer(_) => KindTag::Observer,
            NodeKind::WaitForCondition(_) => KindTag::WaitForCondition,
            NodeKind::Inverter => KindTag::Inverter,
            NodeKind::Succeeder => KindTag::Succeeder,
            NodeKind::Action(_) => KindTag::Action,
        }
    }

    pub(crate) fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Sequence(_) | NodeKind::Selector(_) => NodeType::Composite,
            NodeKind::Root
            | NodeKind::Observer(_)
            | NodeKind::WaitForCondition(_)
            | NodeKind::Inverter
            | NodeKind::Succeeder => NodeType::Decorator,
            NodeKind::Action(_) => NodeType::Task,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Selector(_) => "selector",
            NodeKind::Observer(_) => "observer",
            NodeKind::WaitForCondition(_) => "wait_for_condition",
            NodeKind::Inverter => "inverter",
            NodeKind::Succeeder => "succeeder",
            NodeKind::Action(_) => "action",
        }
    }

    pub(crate) fn composite(&self) -> Option<&CompositeNode> {
        match self {
            NodeKind::Sequence(composite) | NodeKind::Selector(composite) => Some(composite),
            _ => None,
        }
    }

    pub(crate) fn composite_mut(&mut self) -> Option<&mut CompositeNode> {
        match self {
            NodeKind::Sequence(composite) | NodeKind::Selector(composite) => Some(composite),
            _ => None,
        }
    }
}

pub struct Node {
    name: String,
    pub(crate) kind: NodeKind,
    pub(crate) state: NodeState,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Incremented on every start; deferred work from older activations is dropped.
    pub(crate) epoch: u64,
    pub(crate) listeners: Listeners,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            state: NodeState::Inactive,
            parent: None,
            children: Vec::new(),
            epoch: 0,
            listeners: Listeners::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Short lowercase name of the node's behaviour, e.g. `"sequence"`.
    pub fn kind_label(&self) -> &'static str {
        self.kind.label()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind.label())
            .field("state", &self.state)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}
