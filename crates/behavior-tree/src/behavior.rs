//! Node lifecycle: start / request-stop / stop, deferred transitions and the
//! per-tick update pass.
//!
//! Every transition is state-guarded and reports an invalid request by
//! returning `false` instead of failing, because callers (composites probing
//! their children, the synchronizer) routinely attempt transitions without
//! knowing the current state.
//!
//! Listeners of a node are notified of a transition before the node's own
//! reaction runs, so observers always see `Started` before a synchronous
//! `Stopped`.

use crate::blackboard::Blackboard;
use crate::error::{Result, TreeError};
use crate::event::{EventKind, ListenerId, NodeEvent};
use crate::node::{KindTag, NodeId, NodeKind};
use crate::status::NodeState;
use crate::timer::{Fired, TimerId};
use crate::tree::BehaviorTree;

/// Work a timer performs when it fires.
pub(crate) enum TimerAction {
    /// Poll a wait-for-condition decorator's predicate.
    PollCondition,
    Callback(Box<dyn FnMut(&mut Blackboard)>),
}

pub(crate) enum DeferredAction {
    StartFirstChild,
    AdvanceComposite,
    Stop { success: bool },
    RequestStop,
    /// Pick up a node left without a running child by a synchronization.
    Resume,
    Run(Box<dyn FnOnce(&mut BehaviorTree, &mut Blackboard)>),
}

impl DeferredAction {
    fn starts_child(&self) -> bool {
        matches!(
            self,
            Self::StartFirstChild | Self::AdvanceComposite | Self::Resume
        )
    }
}

/// A transition postponed to the start of the next tick.
pub(crate) struct Deferred {
    node: NodeId,
    epoch: u64,
    /// Scheduled inside an activation; dropped if that activation ended.
    while_running: bool,
    action: DeferredAction,
}

impl BehaviorTree {
    pub(crate) fn defer(&mut self, node: NodeId, action: DeferredAction) {
        let Some(record) = self.nodes.get(node.0) else {
            return;
        };
        self.deferred.push_back(Deferred {
            node,
            epoch: record.epoch,
            while_running: record.state.is_running(),
            action,
        });
    }

    /// Run `action` at the start of the next tick, unless `node` has finished
    /// the activation it was scheduled in.
    pub fn run_on_next_tick(
        &mut self,
        node: NodeId,
        action: impl FnOnce(&mut BehaviorTree, &mut Blackboard) + 'static,
    ) {
        self.defer(node, DeferredAction::Run(Box::new(action)));
    }

    /// Queue [`stop_node`](Self::stop_node) for the next tick.
    pub fn stop_node_on_next_tick(&mut self, node: NodeId, success: bool) {
        self.defer(node, DeferredAction::Stop { success });
    }

    /// Queue [`request_stop_node`](Self::request_stop_node) for the next tick.
    pub fn request_stop_node_on_next_tick(&mut self, node: NodeId) {
        self.defer(node, DeferredAction::RequestStop);
    }

    /// Queue the start of the first child of `node` for the next tick.
    pub fn start_first_child_on_next_tick(&mut self, node: NodeId) {
        self.defer(node, DeferredAction::StartFirstChild);
    }

    /// Number of deferred actions waiting for the next tick.
    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Drain the actions registered before this tick, in FIFO order. Actions
    /// they register in turn wait for the following tick.
    pub(crate) fn run_deferred(&mut self, blackboard: &mut Blackboard) {
        let batch = std::mem::take(&mut self.deferred);
        for deferred in batch {
            let Some(record) = self.nodes.get(deferred.node.0) else {
                continue;
            };
            if record.epoch != deferred.epoch
                || (deferred.while_running && !record.state.is_running())
            {
                tracing::trace!(
                    "Dropping stale deferred action for node {:?}",
                    deferred.node
                );
                continue;
            }

            let node = deferred.node;
            match deferred.action {
                DeferredAction::StartFirstChild => {
                    if self.state(node) == NodeState::Active
                        && let Some(&child) = self.children(node).first()
                    {
                        self.start_node(child, blackboard, false);
                    }
                }
                DeferredAction::AdvanceComposite => self.advance_composite(node, blackboard),
                DeferredAction::Stop { success } => {
                    self.stop_node(node, success, blackboard, false);
                }
                DeferredAction::RequestStop => {
                    self.request_stop_node(node, blackboard, false);
                }
                DeferredAction::Resume => self.resume_node(node, blackboard),
                DeferredAction::Run(action) => action(self, blackboard),
            }
        }
    }

    /// Drop pending "start my child" work for `node`; used when the child is
    /// started explicitly instead.
    pub(crate) fn cancel_pending_child_start(&mut self, node: NodeId) {
        self.deferred
            .retain(|deferred| deferred.node != node || !deferred.action.starts_child());
    }

    pub(crate) fn has_pending_child_start(&self, node: NodeId) -> bool {
        self.deferred
            .iter()
            .any(|deferred| deferred.node == node && deferred.action.starts_child())
    }

    /// Schedule `callback` on `node`'s timer list.
    ///
    /// The timer fires while `node` is updated, `interval ± variance` seconds
    /// apart, `repeat` times (`-1` forever). It is removed when `node` stops.
    pub fn add_timer(
        &mut self,
        node: NodeId,
        interval: f32,
        variance: f32,
        repeat: i32,
        callback: impl FnMut(&mut Blackboard) + 'static,
    ) -> TimerId {
        let now = self.clock.elapsed();
        self.timers.add(
            node,
            now,
            interval,
            variance,
            repeat,
            TimerAction::Callback(Box::new(callback)),
        )
    }

    /// Cancel a timer. Returns `false` if it already expired or was removed.
    pub fn remove_timer(&mut self, timer: TimerId) -> bool {
        self.timers.remove(timer)
    }

    /// Live timers owned by `node`.
    pub fn timer_count(&self, node: NodeId) -> usize {
        self.timers.count_owned_by(node)
    }

    /// Whether the action at `node` reported `Blocked` on its last update.
    pub fn is_blocked(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node.0).map(|record| &record.kind),
            Some(NodeKind::Action(action)) if action.was_blocked()
        )
    }

    /// Register a lifecycle listener on `node`.
    pub fn subscribe(
        &mut self,
        node: NodeId,
        listener: impl FnMut(&NodeEvent) + 'static,
    ) -> Result<ListenerId> {
        let id = self.next_listener;
        let record = self
            .nodes
            .get_mut(node.0)
            .ok_or(TreeError::InvalidHandle(node))?;
        self.next_listener += 1;
        Ok(record.listeners.add(id, Box::new(listener)))
    }

    /// Remove a listener registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&mut self, node: NodeId, listener: ListenerId) -> bool {
        self.nodes
            .get_mut(node.0)
            .is_some_and(|record| record.listeners.remove(listener))
    }

    fn emit(&mut self, node: NodeId, kind: EventKind) {
        self.nodes[node.0].listeners.emit(&NodeEvent { node, kind });
    }

    pub(crate) fn tag(&self, node: NodeId) -> KindTag {
        self.nodes[node.0].kind.tag()
    }

    /// Activate `node`. Fails if the node is already running.
    ///
    /// A silent start only updates bookkeeping; the node does not begin its
    /// work (no child is started, no condition is polled).
    pub fn start_node(&mut self, node: NodeId, blackboard: &mut Blackboard, silent: bool) -> bool {
        let Some(record) = self.nodes.get_mut(node.0) else {
            return false;
        };
        if record.state.is_running() {
            return false;
        }
        record.state = NodeState::Active;
        record.epoch += 1;
        tracing::trace!(
            "Started {} '{}' ({:?}, silent: {})",
            record.kind.label(),
            record.name(),
            node,
            silent
        );

        self.emit(node, EventKind::Started { silent });

        match self.tag(node) {
            KindTag::Root => self.root_started(silent),
            KindTag::Sequence | KindTag::Selector => self.composite_started(node, silent),
            KindTag::Observer if !silent => self.observer_started(node, blackboard),
            KindTag::WaitForCondition if !silent => self.wait_started(node, blackboard),
            KindTag::Inverter | KindTag::Succeeder if !silent => {
                match self.children(node).first().copied() {
                    Some(child) => {
                        self.start_node(child, blackboard, false);
                    }
                    None => {
                        self.stop_node(node, false, blackboard, false);
                    }
                }
            }
            KindTag::Action => {
                if let NodeKind::Action(action) = &mut self.nodes[node.0].kind {
                    action.reset();
                }
            }
            _ => {}
        }
        true
    }

    /// Ask an active node to shut down. Completion is signalled later through
    /// [`stop_node`](Self::stop_node), possibly several ticks afterwards.
    pub fn request_stop_node(
        &mut self,
        node: NodeId,
        blackboard: &mut Blackboard,
        silent: bool,
    ) -> bool {
        let Some(record) = self.nodes.get_mut(node.0) else {
            return false;
        };
        if record.state != NodeState::Active {
            return false;
        }
        record.state = NodeState::Stopping;
        tracing::trace!(
            "Stopping {} '{}' ({:?}, silent: {})",
            record.kind.label(),
            record.name(),
            node,
            silent
        );

        self.emit(node, EventKind::Stopping { silent });
        if silent {
            return true;
        }

        match self.tag(node) {
            KindTag::Root => self.root_stopping(blackboard),
            KindTag::Sequence | KindTag::Selector => self.composite_stopping(node, blackboard),
            KindTag::Observer | KindTag::Inverter | KindTag::Succeeder => {
                self.decorator_stopping(node, blackboard);
            }
            KindTag::WaitForCondition => self.wait_stopping(node),
            KindTag::Action => {
                let success = match &mut self.nodes[node.0].kind {
                    NodeKind::Action(action) => action.cancel(blackboard),
                    _ => false,
                };
                self.stop_node(node, success, blackboard, false);
            }
        }
        true
    }

    /// Complete the current activation of `node` with `success`.
    ///
    /// Removes every timer the node owns and, unless `silent`, lets the parent
    /// react to the completion.
    pub fn stop_node(
        &mut self,
        node: NodeId,
        success: bool,
        blackboard: &mut Blackboard,
        silent: bool,
    ) -> bool {
        let Some(record) = self.nodes.get_mut(node.0) else {
            return false;
        };
        if !record.state.is_running() {
            return false;
        }
        record.state = NodeState::Inactive;
        tracing::trace!(
            "Stopped {} '{}' ({:?}, success: {}, silent: {})",
            record.kind.label(),
            record.name(),
            node,
            success,
            silent
        );
        let parent = record.parent;

        self.timers.remove_owned_by(node);
        match self.tag(node) {
            KindTag::Sequence | KindTag::Selector => self.composite_stopped(node),
            KindTag::WaitForCondition => self.wait_stopped(node),
            _ => {}
        }

        self.emit(node, EventKind::Stopped { success, silent });
        if !silent && let Some(parent) = parent {
            self.child_stopped(parent, node, success, blackboard);
        }
        true
    }

    /// Request a stop from every active child of `node`.
    pub fn stop_children(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        let children = self.children(node).to_vec();
        for child in children {
            if self.state(child) == NodeState::Active {
                self.request_stop_node(child, blackboard, false);
            }
        }
    }

    fn child_stopped(
        &mut self,
        parent: NodeId,
        child: NodeId,
        success: bool,
        blackboard: &mut Blackboard,
    ) {
        self.emit(parent, EventKind::ChildStopped { child, success });
        // While a synchronization unwinds a branch, parents are reconciled by
        // the synchronizer instead of reacting.
        if self.reconciling || !self.state(parent).is_running() {
            return;
        }

        match self.tag(parent) {
            KindTag::Root => self.root_child_stopped(success),
            KindTag::Sequence | KindTag::Selector => {
                self.composite_child_stopped(parent, success, blackboard);
            }
            KindTag::Observer => self.observer_child_stopped(parent, success, blackboard),
            KindTag::WaitForCondition => {
                self.defer(parent, DeferredAction::Stop { success });
            }
            KindTag::Inverter => {
                self.stop_node(parent, !success, blackboard, false);
            }
            KindTag::Succeeder => {
                self.stop_node(parent, true, blackboard, false);
            }
            KindTag::Action => {}
        }
    }

    /// Update running children depth-first, then `node` itself, so leaf state
    /// changes are visible before ancestors act within the same tick.
    pub(crate) fn update_recursively(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        if node == NodeId::ROOT && self.silent {
            return;
        }
        let children = self.children(node).to_vec();
        for child in children {
            if self.state(child).is_running() {
                self.update_recursively(child, blackboard);
            }
        }
        self.update_node(node, blackboard);
    }

    fn update_node(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        if !self.state(node).is_running() {
            return;
        }
        self.fire_timers(node, blackboard);

        if self.state(node) != NodeState::Active {
            return;
        }
        let finished = match &mut self.nodes[node.0].kind {
            NodeKind::Action(action) => action.update(blackboard),
            _ => None,
        };
        if let Some(success) = finished {
            self.stop_node(node, success, blackboard, false);
        }
    }

    fn fire_timers(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        let now = self.clock.elapsed();
        for Fired { id, mut action } in self.timers.take_due(node, now) {
            if !self.state(node).is_running() {
                break;
            }
            match &mut action {
                TimerAction::PollCondition => self.poll_wait_condition(node, blackboard),
                TimerAction::Callback(callback) => callback(blackboard),
            }
            self.timers.restore(Fired { id, action });
        }
    }
}
