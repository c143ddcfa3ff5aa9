//! Lifecycle notifications.
//!
//! Every node keeps an ordered table of listeners. Listeners observe events
//! synchronously, in registration order, before the node's own reaction runs.

use crate::node::NodeId;

/// What happened to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Started { silent: bool },
    Stopping { silent: bool },
    Stopped { success: bool, silent: bool },
    ChildStopped { child: NodeId, success: bool },
}

impl EventKind {
    pub fn is_silent(&self) -> bool {
        match *self {
            EventKind::Started { silent }
            | EventKind::Stopping { silent }
            | EventKind::Stopped { silent, .. } => silent,
            EventKind::ChildStopped { .. } => false,
        }
    }
}

/// A lifecycle event raised by `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEvent {
    pub node: NodeId,
    pub kind: EventKind,
}

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&NodeEvent)>;

/// Per-node listener table.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, id: u64, listener: Listener) -> ListenerId {
        let id = ListenerId(id);
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn emit(&mut self, event: &NodeEvent) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}
