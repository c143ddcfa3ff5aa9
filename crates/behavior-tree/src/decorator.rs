//! Decorator nodes.
//!
//! Decorators wrap a single child and modify its result or when it runs:
//!
//! - Observer: guards its child with a [`Condition`] and reacts to blackboard
//!   changes according to its [`AbortRule`]
//! - Wait-for-condition: polls a predicate on a timer and starts its child once
//!   it holds
//! - Inverter (NOT logic) and Succeeder (error suppression), whose reactions
//!   live with the rest of the lifecycle dispatch

use std::collections::BTreeSet;

use crate::behavior::{DeferredAction, TimerAction};
use crate::blackboard::Blackboard;
use crate::condition::Condition;
use crate::node::{NodeId, NodeKind};
use crate::status::{NodeState, NodeType};
use crate::timer::{REPEAT_FOREVER, TimerId};
use crate::tree::BehaviorTree;

/// When an observer interrupts itself or its lower-priority siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum AbortRule {
    /// Never interrupts anything; the condition is only checked on start.
    #[default]
    None,
    /// Stops itself when the condition becomes false while active.
    #[strum(serialize = "self")]
    SelfOnly,
    /// Stops the active lower-priority sibling when the condition becomes true.
    LowerPriority,
    /// `SelfOnly` and `LowerPriority`.
    Both,
    /// As `LowerPriority`, and the composite restarts this observer at once.
    LowerPriorityRestart,
    /// `LowerPriorityRestart` and `SelfOnly`.
    Restart,
}

impl AbortRule {
    pub fn stops_self(self) -> bool {
        matches!(self, AbortRule::SelfOnly | AbortRule::Both | AbortRule::Restart)
    }

    pub fn stops_lower_priority(self) -> bool {
        matches!(
            self,
            AbortRule::LowerPriority
                | AbortRule::Both
                | AbortRule::LowerPriorityRestart
                | AbortRule::Restart
        )
    }

    pub fn restarts(self) -> bool {
        matches!(self, AbortRule::LowerPriorityRestart | AbortRule::Restart)
    }

    /// Whether the observer must watch the blackboard at all.
    pub fn is_reactive(self) -> bool {
        self != AbortRule::None
    }
}

pub(crate) struct ObserverNode {
    condition: Box<dyn Condition>,
    rule: AbortRule,
    observing: bool,
}

impl ObserverNode {
    pub(crate) fn new(condition: Box<dyn Condition>, rule: AbortRule) -> Self {
        Self {
            condition,
            rule,
            observing: false,
        }
    }
}

type Predicate = Box<dyn Fn(&Blackboard) -> bool>;

pub(crate) struct WaitNode {
    condition: Predicate,
    interval: f32,
    variance: f32,
    timer: Option<TimerId>,
}

impl WaitNode {
    pub(crate) fn new(condition: Predicate, interval: f32, variance: f32) -> Self {
        Self {
            condition,
            interval,
            variance,
            timer: None,
        }
    }
}

impl BehaviorTree {
    /// Whether the observer at `node` is currently subscribed to its keys.
    pub fn is_observing(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node.0).map(|record| &record.kind),
            Some(NodeKind::Observer(observer)) if observer.observing
        )
    }

    /// Observers subscribed to `key`.
    pub fn observers_of(&self, key: &str) -> &[NodeId] {
        match self.subscriptions.get(key) {
            Some(observers) => observers,
            None => &[],
        }
    }

    fn start_observing(&mut self, node: NodeId) {
        let keys = match &mut self.nodes[node.0].kind {
            NodeKind::Observer(observer) if !observer.observing => {
                observer.observing = true;
                observer.condition.observed_keys().to_vec()
            }
            _ => return,
        };
        for key in keys {
            let subscribers = self.subscriptions.entry(key).or_default();
            if !subscribers.contains(&node) {
                subscribers.push(node);
            }
        }
    }

    /// Drop the blackboard subscriptions of `node`; a no-op for anything but
    /// an observing observer.
    pub(crate) fn stop_observing(&mut self, node: NodeId) {
        let keys = match self.nodes.get_mut(node.0).map(|record| &mut record.kind) {
            Some(NodeKind::Observer(observer)) if observer.observing => {
                observer.observing = false;
                observer.condition.observed_keys().to_vec()
            }
            _ => return,
        };
        for key in keys {
            if let Some(subscribers) = self.subscriptions.get_mut(&key) {
                subscribers.retain(|&subscriber| subscriber != node);
                if subscribers.is_empty() {
                    self.subscriptions.remove(&key);
                }
            }
        }
    }

    fn observer_condition(
        &self,
        node: NodeId,
        blackboard: &Blackboard,
    ) -> Option<(AbortRule, bool)> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Observer(observer) => {
                Some((observer.rule, observer.condition.is_met(blackboard)))
            }
            _ => None,
        }
    }

    pub(crate) fn observer_started(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        let Some((rule, met)) = self.observer_condition(node, blackboard) else {
            return;
        };
        if rule.is_reactive() {
            self.start_observing(node);
        }

        match self.children(node).first().copied() {
            Some(child) if met => {
                self.start_node(child, blackboard, false);
            }
            _ => {
                self.stop_node(node, false, blackboard, false);
            }
        }
    }

    /// Shared stop-request handling of single-child decorators: forward the
    /// request to an active child, or stop at once if the child is idle.
    pub(crate) fn decorator_stopping(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        let child_state = self
            .children(node)
            .first()
            .map(|&child| (child, self.state(child)));
        match child_state {
            Some((child, NodeState::Active)) => {
                self.request_stop_node(child, blackboard, false);
            }
            Some((_, NodeState::Stopping)) => {}
            _ => {
                self.stop_node(node, false, blackboard, false);
            }
        }
    }

    pub(crate) fn observer_child_stopped(
        &mut self,
        node: NodeId,
        success: bool,
        blackboard: &mut Blackboard,
    ) {
        if let Some(NodeKind::Observer(observer)) = self.nodes.get(node.0).map(|r| &r.kind)
            && !observer.rule.stops_lower_priority()
        {
            self.stop_observing(node);
        }
        self.stop_node(node, success, blackboard, false);
    }

    /// Re-check the observer at `node` after one of its keys changed.
    pub fn evaluate_observer(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        let Some((rule, met)) = self.observer_condition(node, blackboard) else {
            return;
        };
        let state = self.state(node);

        if state == NodeState::Active && !met && rule.stops_self() {
            tracing::trace!("Observer {:?} aborts itself", node);
            self.request_stop_node(node, blackboard, false);
            return;
        }
        if state != NodeState::Inactive || !met || !rule.stops_lower_priority() {
            return;
        }

        // Find the branch of the nearest composite ancestor holding `node`.
        let mut branch = node;
        let mut ancestor = self.parent(node);
        while let Some(parent) = ancestor {
            if self.nodes[parent.0].node_type() == NodeType::Composite {
                break;
            }
            branch = parent;
            ancestor = self.parent(parent);
        }
        let Some(composite) = ancestor else {
            return;
        };

        let restart = rule.restarts();
        if restart {
            self.stop_observing(node);
        }
        let preempted = self.stop_next_child_in_priority_to(composite, branch, restart, blackboard);
        if restart && !preempted && self.state(node) == NodeState::Inactive {
            self.start_observing(node);
        }
    }

    /// Evaluate every observer subscribed to one of `keys`.
    ///
    /// Called by the tree owner with the keys returned by
    /// [`Blackboard::update`]. Ignored while the tree is silent.
    pub fn notify_changes(&mut self, keys: &[String], blackboard: &mut Blackboard) {
        if self.silent {
            return;
        }
        let observers: BTreeSet<NodeId> = keys
            .iter()
            .filter_map(|key| self.subscriptions.get(key))
            .flatten()
            .copied()
            .collect();
        for node in observers {
            if self.is_observing(node) {
                self.evaluate_observer(node, blackboard);
            }
        }
    }

    pub(crate) fn wait_started(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        let NodeKind::WaitForCondition(wait) = &self.nodes[node.0].kind else {
            return;
        };
        if (wait.condition)(blackboard) {
            self.defer(node, DeferredAction::StartFirstChild);
            return;
        }

        let (interval, variance) = (wait.interval, wait.variance);
        let now = self.clock.elapsed();
        let timer = self.timers.add(
            node,
            now,
            interval,
            variance,
            REPEAT_FOREVER,
            TimerAction::PollCondition,
        );
        if let NodeKind::WaitForCondition(wait) = &mut self.nodes[node.0].kind {
            wait.timer = Some(timer);
        }
    }

    pub(crate) fn poll_wait_condition(&mut self, node: NodeId, blackboard: &mut Blackboard) {
        if self.state(node) != NodeState::Active {
            return;
        }
        let NodeKind::WaitForCondition(wait) = &mut self.nodes[node.0].kind else {
            return;
        };
        if !(wait.condition)(blackboard) {
            return;
        }
        if let Some(timer) = wait.timer.take() {
            self.timers.remove(timer);
        }

        match self.children(node).first().copied() {
            Some(child) => {
                self.start_node(child, blackboard, false);
            }
            None => {
                self.stop_node(node, false, blackboard, false);
            }
        }
    }

    pub(crate) fn wait_stopping(&mut self, node: NodeId) {
        self.remove_wait_timer(node);
        let child_state = self
            .children(node)
            .first()
            .map(|&child| (child, self.state(child)));
        match child_state {
            Some((child, NodeState::Active)) => {
                self.defer(child, DeferredAction::RequestStop);
            }
            Some((_, NodeState::Stopping)) => {}
            _ => self.defer(node, DeferredAction::Stop { success: false }),
        }
    }

    pub(crate) fn wait_stopped(&mut self, node: NodeId) {
        if let NodeKind::WaitForCondition(wait) = &mut self.nodes[node.0].kind {
            wait.timer = None;
        }
    }

    /// Whether the wait-for-condition node at `node` has a poll timer.
    pub(crate) fn is_polling(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node.0).map(|record| &record.kind),
            Some(NodeKind::WaitForCondition(wait)) if wait.timer.is_some()
        )
    }

    /// Cancel the polling timer of a wait-for-condition node, if any.
    pub(crate) fn remove_wait_timer(&mut self, node: NodeId) {
        if let Some(NodeKind::WaitForCondition(wait)) =
            self.nodes.get_mut(node.0).map(|record| &mut record.kind)
            && let Some(timer) = wait.timer.take()
        {
            self.timers.remove(timer);
        }
    }
}
