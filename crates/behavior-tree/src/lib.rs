//! Tick-driven, event-based behavior tree engine.
//!
//! This library composes reactive agent logic out of composite, decorator and
//! task nodes, each a small state machine coordinated by its parent and by a
//! root that owns the whole tree.
//!
//! - **Deferred transitions**: work that would re-enter the tree (restarting a
//!   child, completing a stop) runs at the start of the next tick, in order
//! - **Cooperative cancellation**: a stop is requested and completes later
//! - **Reactive decorators**: observers re-evaluate on blackboard changes and
//!   may abort themselves or preempt lower-priority siblings
//! - **Leaf synchronization**: a follower tree reconciles its active nodes with
//!   a leader's published leaf set
//!
//! # Architecture
//!
//! - [`BehaviorTree`]: the root node and the arena owning every [`Node`]
//! - [`NodeState`]: `Inactive`, `Active` or `Stopping`
//! - Composite nodes: [`sequence`], [`selector`] and their random variants
//! - Decorator nodes: [`observer`], [`wait_for_condition`], [`inverter`],
//!   [`succeeder`]
//! - Task nodes: [`action`] wrapping a [`Task`]
//! - [`TreeManager`]: owns trees and blackboards and drives the current pair
//!
//! # Example
//!
//! ```
//! use behavior_tree::builder::{action, observer, selector};
//! use behavior_tree::{
//!     AbortRule, BehaviorTree, BlackboardCondition, NodeId, NodeState, Task, TreeManager,
//! };
//!
//! let tree = BehaviorTree::from_blueprint(
//!     "Guard",
//!     selector(vec![
//!         observer(
//!             BlackboardCondition::is_set("enemy"),
//!             AbortRule::LowerPriority,
//!             action("Attack", Task::instant(|_| true)),
//!         ),
//!         action("Patrol", Task::instant(|_| true)),
//!     ]),
//!     Default::default(),
//! )
//! .unwrap();
//!
//! let mut manager = TreeManager::default();
//! manager.insert_tree(tree);
//! manager.add_blackboard();
//! manager.start_tree().unwrap();
//! manager.update(0.1).unwrap();
//! let tree = manager.current_tree().unwrap();
//! assert_eq!(tree.state(NodeId::ROOT), NodeState::Active);
//! ```

pub mod action;
pub mod behavior;
pub mod blackboard;
pub mod builder;
pub mod composite;
pub mod condition;
pub mod config;
pub mod decorator;
pub mod error;
pub mod event;
pub mod manager;
pub mod node;
pub mod status;
pub mod sync;
pub mod timer;
pub mod tree;

// Re-export core types for ergonomic API
pub use action::Task;
pub use blackboard::{Blackboard, Value};
pub use builder::{
    Blueprint, action, inverter, observer, random_selector, random_sequence, selector, sequence,
    succeeder, wait_for_condition,
};
pub use condition::{BlackboardCondition, Condition, FnCondition, Operator};
pub use config::TreeConfig;
pub use decorator::AbortRule;
pub use error::{Result, TreeError};
pub use event::{EventKind, ListenerId, NodeEvent};
pub use manager::{BlackboardKey, TreeKey, TreeManager};
pub use node::{Node, NodeId};
pub use status::{ActionRequest, ActionResult, NodeState, NodeType};
pub use sync::LeafSet;
pub use timer::{Clock, REPEAT_FOREVER, TimerId};
pub use tree::BehaviorTree;
