//! Builder utilities for ergonomic behavior tree construction.
//!
//! This module provides helper functions to describe a tree declaratively.
//! Instead of allocating every node and linking it with
//! [`add_child`](BehaviorTree::add_child), you can write:
//!
//! ```
//! use behavior_tree::builder::{action, selector, sequence};
//! use behavior_tree::{BehaviorTree, Task, TreeConfig};
//!
//! let tree = BehaviorTree::from_blueprint(
//!     "Guard",
//!     selector(vec![
//!         sequence(vec![
//!             action("Spot", Task::instant(|board| board.is_set("enemy"))),
//!             action("Attack", Task::instant(|_| true)),
//!         ]),
//!         action("Patrol", Task::instant(|_| true)),
//!     ]),
//!     TreeConfig::default(),
//! )
//! .unwrap();
//! assert_eq!(tree.len(), 6);
//! ```

use crate::action::{ActionNode, Task};
use crate::blackboard::Blackboard;
use crate::composite::CompositeNode;
use crate::condition::Condition;
use crate::config::TreeConfig;
use crate::decorator::{AbortRule, ObserverNode, WaitNode};
use crate::error::{Result, TreeError};
use crate::node::{Node, NodeId, NodeKind};
use crate::tree::BehaviorTree;

/// Description of a subtree, turned into arena nodes by
/// [`BehaviorTree::create`] or [`BehaviorTree::attach`].
pub struct Blueprint {
    name: String,
    kind: NodeKind,
    children: Vec<Blueprint>,
}

impl Blueprint {
    fn new(name: &str, kind: NodeKind, children: Vec<Blueprint>) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            children,
        }
    }

    /// Replace the default name (the node kind) with `name`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes this blueprint expands to.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Blueprint::size).sum::<usize>()
    }
}

impl std::fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint")
            .field("name", &self.name)
            .field("kind", &self.kind.label())
            .field("children", &self.children)
            .finish()
    }
}

/// Creates a sequence node: runs children in order until one fails.
pub fn sequence(children: Vec<Blueprint>) -> Blueprint {
    Blueprint::new("Sequence", NodeKind::Sequence(CompositeNode::new(false)), children)
}

/// Creates a selector node: runs children in order until one succeeds.
pub fn selector(children: Vec<Blueprint>) -> Blueprint {
    Blueprint::new("Selector", NodeKind::Selector(CompositeNode::new(false)), children)
}

/// Creates a sequence that shuffles its children on every start.
pub fn random_sequence(children: Vec<Blueprint>) -> Blueprint {
    Blueprint::new(
        "RandomSequence",
        NodeKind::Sequence(CompositeNode::new(true)),
        children,
    )
}

/// Creates a selector that shuffles its children on every start.
pub fn random_selector(children: Vec<Blueprint>) -> Blueprint {
    Blueprint::new(
        "RandomSelector",
        NodeKind::Selector(CompositeNode::new(true)),
        children,
    )
}

/// Creates an observer guarding `child` with `condition`.
pub fn observer(
    condition: impl Condition + 'static,
    rule: AbortRule,
    child: Blueprint,
) -> Blueprint {
    Blueprint::new(
        "Observer",
        NodeKind::Observer(ObserverNode::new(Box::new(condition), rule)),
        vec![child],
    )
}

/// Creates a decorator that polls `predicate` every `interval ± variance`
/// seconds and starts `child` once it holds.
pub fn wait_for_condition(
    predicate: impl Fn(&Blackboard) -> bool + 'static,
    interval: f32,
    variance: f32,
    child: Blueprint,
) -> Blueprint {
    Blueprint::new(
        "WaitForCondition",
        NodeKind::WaitForCondition(WaitNode::new(Box::new(predicate), interval, variance)),
        vec![child],
    )
}

/// Creates an inverter node.
pub fn inverter(child: Blueprint) -> Blueprint {
    Blueprint::new("Inverter", NodeKind::Inverter, vec![child])
}

/// Creates a succeeder node, which reports success whatever its child does.
pub fn succeeder(child: Blueprint) -> Blueprint {
    Blueprint::new("Succeeder", NodeKind::Succeeder, vec![child])
}

/// Creates an action leaf running `task`.
pub fn action(name: impl Into<String>, task: Task) -> Blueprint {
    Blueprint::new("Action", NodeKind::Action(ActionNode::new(task)), Vec::new()).named(name)
}

impl BehaviorTree {
    /// Build a tree named `name` whose single root child is `blueprint`.
    pub fn from_blueprint(
        name: impl Into<String>,
        blueprint: Blueprint,
        config: TreeConfig,
    ) -> Result<Self> {
        let name = name.into();
        if name.contains(config.sync_separator) {
            return Err(TreeError::SeparatorInName {
                name,
                separator: config.sync_separator,
            });
        }
        let mut tree = Self::with_config(name, config);
        tree.attach(NodeId::ROOT, blueprint)?;
        tree.populate_registry();
        Ok(tree)
    }

    /// Allocate `blueprint` as a detached subtree, returning its top node.
    ///
    /// Node names may not contain the tree's sync separator, since the
    /// flattened leaf set could not be split back into UIDs.
    pub fn create(&mut self, blueprint: Blueprint) -> Result<NodeId> {
        check_names(&blueprint, self.config.sync_separator)?;
        self.allocate(blueprint)
    }

    fn allocate(&mut self, blueprint: Blueprint) -> Result<NodeId> {
        let Blueprint {
            name,
            kind,
            children,
        } = blueprint;
        let id = self.push_node(Node::new(name, kind));
        for child in children {
            let child = self.allocate(child)?;
            self.add_child(id, child)?;
        }
        Ok(id)
    }

    /// Allocate `blueprint` and attach it as the last child of `parent`.
    pub fn attach(&mut self, parent: NodeId, blueprint: Blueprint) -> Result<NodeId> {
        if self.node(parent).is_none() {
            return Err(TreeError::InvalidHandle(parent));
        }
        let id = self.create(blueprint)?;
        self.add_child(parent, id)?;
        Ok(id)
    }
}

fn check_names(blueprint: &Blueprint, separator: char) -> Result<()> {
    if blueprint.name.contains(separator) {
        return Err(TreeError::SeparatorInName {
            name: blueprint.name.clone(),
            separator,
        });
    }
    blueprint
        .children
        .iter()
        .try_for_each(|child| check_names(child, separator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::BlackboardCondition;
    use crate::status::NodeType;

    fn leaf(name: &str) -> Blueprint {
        action(name, Task::fire(|_| {}))
    }

    #[test]
    fn default_names_follow_the_node_kind() {
        assert_eq!(sequence(vec![]).name(), "Sequence");
        assert_eq!(random_selector(vec![]).name(), "RandomSelector");
        assert_eq!(inverter(leaf("A")).name(), "Inverter");
        assert_eq!(leaf("A").name(), "A");
        assert_eq!(selector(vec![]).named("Root Choice").name(), "Root Choice");
    }

    #[test]
    fn from_blueprint_links_children_in_order() {
        let tree = BehaviorTree::from_blueprint(
            "Guard",
            selector(vec![
                observer(
                    BlackboardCondition::is_set("enemy"),
                    AbortRule::LowerPriority,
                    leaf("Attack"),
                ),
                succeeder(leaf("Patrol")),
            ]),
            TreeConfig::default(),
        )
        .unwrap();

        let choice = tree.children(NodeId::ROOT)[0];
        let names: Vec<_> = tree
            .children(choice)
            .iter()
            .map(|&id| tree.node(id).unwrap().name().to_owned())
            .collect();
        assert_eq!(names, vec!["Observer", "Succeeder"]);
        assert_eq!(tree.node(choice).unwrap().node_type(), NodeType::Composite);
        assert_eq!(tree.len(), 6);

        let patrol = tree.find("Patrol").unwrap();
        assert_eq!(
            tree.node_by_uid("Guard/0:Selector/1:Succeeder/0:Patrol"),
            Ok(patrol)
        );
    }

    #[test]
    fn attach_rejects_unknown_parents() {
        let mut tree = BehaviorTree::new("Root");
        assert_eq!(
            tree.attach(NodeId(7), leaf("A")),
            Err(TreeError::InvalidHandle(NodeId(7)))
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn names_containing_the_separator_are_rejected() {
        let mut tree = BehaviorTree::new("Root");
        assert_eq!(
            tree.attach(NodeId::ROOT, sequence(vec![leaf("Look|Listen")])),
            Err(TreeError::SeparatorInName {
                name: "Look|Listen".into(),
                separator: '|',
            })
        );
        assert_eq!(tree.len(), 1);

        let err = BehaviorTree::from_blueprint("Camp|North", leaf("A"), TreeConfig::default())
            .unwrap_err();
        assert!(matches!(err, TreeError::SeparatorInName { separator: '|', .. }));

        let config = TreeConfig {
            sync_separator: ';',
            ..TreeConfig::default()
        };
        assert!(BehaviorTree::from_blueprint("Root", leaf("Look|Listen"), config).is_ok());
    }

    #[test]
    fn blueprint_size_counts_every_node() {
        let blueprint = sequence(vec![leaf("A"), inverter(leaf("B")), selector(vec![])]);
        assert_eq!(blueprint.size(), 5);
    }
}
