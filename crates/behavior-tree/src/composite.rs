//! Composite nodes: [`sequence`](crate::builder::sequence) (AND logic) and
//! [`selector`](crate::builder::selector) (OR logic).
//!
//! # Semantics
//!
//! A composite walks its children one at a time, starting each only after the
//! previous one stopped:
//! - A sequence stops with failure as soon as a child fails, and with success
//!   once every child succeeded.
//! - A selector stops with success as soon as a child succeeds, and with
//!   failure once every child failed.
//!
//! Random composites shuffle a working copy of the iteration order on every
//! start; the canonical child list never changes.
//!
//! Starting a composite never starts its first child synchronously: the first
//! step is deferred to the next tick.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::behavior::DeferredAction;
use crate::blackboard::Blackboard;
use crate::node::{KindTag, NodeId, NodeKind};
use crate::status::NodeState;
use crate::tree::BehaviorTree;

/// Iteration state of a sequence or selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompositeNode {
    random: bool,
    /// Child positions in iteration order.
    order: Vec<usize>,
    /// Rank in `order` of the current child; `None` before the first one.
    cursor: Option<usize>,
}

impl CompositeNode {
    pub(crate) fn new(random: bool) -> Self {
        Self {
            random,
            order: Vec::new(),
            cursor: None,
        }
    }

    pub(crate) fn push_child(&mut self, position: usize) {
        self.order.push(position);
    }

    fn reset<R: Rng>(&mut self, rng: &mut R) {
        self.cursor = None;
        self.order.sort_unstable();
        if self.random {
            self.order.shuffle(rng);
        }
    }

    /// Move to the next child, returning its position if one remains.
    fn advance(&mut self) -> Option<usize> {
        let next = self
            .cursor
            .map_or(0, |rank| rank + 1)
            .min(self.order.len());
        self.cursor = Some(next);
        self.order.get(next).copied()
    }

    fn current(&self) -> Option<usize> {
        self.order.get(self.cursor?).copied()
    }

    fn rank_of(&self, position: usize) -> Option<usize> {
        self.order.iter().position(|&candidate| candidate == position)
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }
}

impl BehaviorTree {
    /// Child the composite is currently running (or last ran).
    pub fn current_child(&self, composite: NodeId) -> Option<NodeId> {
        let position = self.nodes.get(composite.0)?.kind.composite()?.current()?;
        self.children(composite).get(position).copied()
    }

    /// Children of `composite` in the order it will run them this activation.
    pub fn iteration_order(&self, composite: NodeId) -> Vec<NodeId> {
        let Some(order) = self
            .nodes
            .get(composite.0)
            .and_then(|node| node.kind.composite())
            .map(CompositeNode::order)
        else {
            return self.children(composite).to_vec();
        };
        order
            .iter()
            .filter_map(|&position| self.children(composite).get(position).copied())
            .collect()
    }

    pub(crate) fn composite_started(&mut self, node: NodeId, silent: bool) {
        if let Some(composite) = self.nodes[node.0].kind.composite_mut() {
            composite.reset(&mut self.rng);
        }
        if !silent {
            self.defer(node, DeferredAction::AdvanceComposite);
        }
    }

    /// Start the next child, or stop once the children are exhausted.
    pub(crate) fn advance_composite(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        let state = self.state(node);
        if !state.is_running() {
            return;
        }
        let result_when_exhausted = self.tag(node) == KindTag::Sequence;
        let Some(position) = self.nodes[node.0]
            .kind
            .composite_mut()
            .and_then(CompositeNode::advance)
        else {
            self.stop_node(node, result_when_exhausted, blackboard, false);
            return;
        };

        if state == NodeState::Stopping {
            self.stop_node(node, false, blackboard, false);
        } else if let Some(&child) = self.children(node).get(position) {
            self.start_node(child, blackboard, false);
        }
    }

    pub(crate) fn composite_stopping(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        if let Some(child) = self.current_child(node)
            && self.state(child).is_running()
        {
            if self.state(child) == NodeState::Active {
                self.request_stop_node(child, blackboard, false);
            }
            return;
        }

        let any_running = self
            .children(node)
            .iter()
            .any(|&child| self.state(child).is_running());
        if any_running {
            self.stop_children(node, blackboard);
        } else {
            self.stop_node(node, false, blackboard, false);
        }
    }

    pub(crate) fn composite_stopped(&mut self, node: NodeId) {
        let children = self.children(node).to_vec();
        for child in children {
            self.stop_observing(child);
        }
    }

    pub(crate) fn composite_child_stopped(
        &mut self,
        node: NodeId,
        success: bool,
        blackboard: &mut Blackboard,
    ) {
        match (self.tag(node), success) {
            (KindTag::Sequence, false) => {
                self.stop_node(node, false, blackboard, false);
            }
            (KindTag::Selector, true) => {
                self.stop_node(node, true, blackboard, false);
            }
            _ => self.advance_composite(node, blackboard),
        }
    }

    /// Interrupt the first active child ranked after `child` in `composite`.
    ///
    /// The iteration cursor is moved so that the composite resumes at `child`
    /// when `restart_child` is set, or treats its children as exhausted
    /// otherwise. Returns `false` if no lower-priority child was active.
    pub fn stop_next_child_in_priority_to(
        &mut self,
        composite: NodeId,
        child: NodeId,
        restart_child: bool,
        blackboard: &mut Blackboard,
    ) -> bool {
        let Some(position) = self.children(composite).iter().position(|&c| c == child) else {
            return false;
        };
        let Some(node) = self.nodes.get(composite.0) else {
            return false;
        };
        let Some(composite_state) = node.kind.composite() else {
            return false;
        };
        let Some(rank) = composite_state.rank_of(position) else {
            return false;
        };
        let order = composite_state.order.clone();

        for &later in &order[rank + 1..] {
            let candidate = self.children(composite)[later];
            if self.state(candidate) != NodeState::Active {
                continue;
            }
            if let Some(composite_state) = self.nodes[composite.0].kind.composite_mut() {
                composite_state.cursor = if restart_child {
                    rank.checked_sub(1)
                } else {
                    Some(order.len())
                };
            }
            tracing::trace!(
                "Composite {:?} interrupts {:?} in favour of {:?} (restart: {})",
                composite,
                candidate,
                child,
                restart_child
            );
            self.request_stop_node(candidate, blackboard, false);
            return true;
        }
        false
    }

    /// Point the composite's cursor at `child`, used when a child is started
    /// from outside the normal iteration (path starts during synchronization).
    pub(crate) fn align_cursor(&mut self, composite: NodeId, child: NodeId) {
        let Some(position) = self.children(composite).iter().position(|&c| c == child) else {
            return;
        };
        if let NodeKind::Sequence(state) | NodeKind::Selector(state) =
            &mut self.nodes[composite.0].kind
        {
            state.cursor = state.rank_of(position);
        }
    }
}
