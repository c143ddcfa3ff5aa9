//! Owner of trees and blackboards that drives the selected pair each frame.

use crate::blackboard::Blackboard;
use crate::config::TreeConfig;
use crate::error::{Result, TreeError};
use crate::tree::BehaviorTree;

/// Handle to a tree registered with a [`TreeManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeKey(u64);

/// Handle to a blackboard registered with a [`TreeManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlackboardKey(u64);

/// Holds any number of trees and blackboards, one of each being current.
///
/// Each [`update`](Self::update) ticks the current tree against the current
/// blackboard, then flushes the blackboard's pending changes to the tree's
/// observers. The first tree or blackboard added becomes current; removing the
/// current one selects the first remaining.
pub struct TreeManager {
    trees: Vec<(TreeKey, BehaviorTree)>,
    blackboards: Vec<(BlackboardKey, Blackboard)>,
    current_tree: Option<TreeKey>,
    current_blackboard: Option<BlackboardKey>,
    /// Used when no blackboard is registered.
    scratch: Blackboard,
    config: TreeConfig,
    next_key: u64,
}

impl TreeManager {
    /// Create an empty manager; trees made by [`add_tree`](Self::add_tree) use `config`.
    pub fn new(config: TreeConfig) -> Self {
        Self {
            trees: Vec::new(),
            blackboards: Vec::new(),
            current_tree: None,
            current_blackboard: None,
            scratch: Blackboard::new(),
            config,
            next_key: 0,
        }
    }

    fn next_key(&mut self) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    /// Create an empty tree named `name` using the manager's configuration.
    pub fn add_tree(&mut self, name: impl Into<String>) -> TreeKey {
        let tree = BehaviorTree::with_config(name, self.config.clone());
        self.insert_tree(tree)
    }

    /// Register an already built tree.
    pub fn insert_tree(&mut self, tree: BehaviorTree) -> TreeKey {
        let key = TreeKey(self.next_key());
        self.trees.push((key, tree));
        if self.current_tree.is_none() {
            self.current_tree = Some(key);
        }
        key
    }

    /// Unregister a tree. If it was current, the first remaining tree
    /// becomes current.
    pub fn remove_tree(&mut self, key: TreeKey) -> Option<BehaviorTree> {
        let index = self.trees.iter().position(|(k, _)| *k == key)?;
        let (_, tree) = self.trees.remove(index);
        if self.current_tree == Some(key) {
            self.current_tree = self.trees.first().map(|(k, _)| *k);
        }
        Some(tree)
    }

    /// Register an empty blackboard; the first one becomes current.
    pub fn add_blackboard(&mut self) -> BlackboardKey {
        let key = BlackboardKey(self.next_key());
        self.blackboards.push((key, Blackboard::new()));
        if self.current_blackboard.is_none() {
            self.current_blackboard = Some(key);
        }
        key
    }

    /// Unregister a blackboard. If it was current, the first remaining
    /// blackboard becomes current.
    pub fn remove_blackboard(&mut self, key: BlackboardKey) -> Option<Blackboard> {
        let index = self.blackboards.iter().position(|(k, _)| *k == key)?;
        let (_, blackboard) = self.blackboards.remove(index);
        if self.current_blackboard == Some(key) {
            self.current_blackboard = self.blackboards.first().map(|(k, _)| *k);
        }
        Some(blackboard)
    }

    /// Select the tree driven by [`update`](Self::update). Returns `false` for
    /// a key that is not registered.
    pub fn set_current_tree(&mut self, key: TreeKey) -> bool {
        let known = self.trees.iter().any(|(k, _)| *k == key);
        if known {
            self.current_tree = Some(key);
        }
        known
    }

    /// Select the blackboard driven by [`update`](Self::update). Returns `false`
    /// for a key that is not registered.
    pub fn set_current_blackboard(&mut self, key: BlackboardKey) -> bool {
        let known = self.blackboards.iter().any(|(k, _)| *k == key);
        if known {
            self.current_blackboard = Some(key);
        }
        known
    }

    /// Look up a registered tree.
    pub fn tree(&self, key: TreeKey) -> Option<&BehaviorTree> {
        self.trees.iter().find(|(k, _)| *k == key).map(|(_, tree)| tree)
    }

    /// Mutable access to a registered tree.
    pub fn tree_mut(&mut self, key: TreeKey) -> Option<&mut BehaviorTree> {
        find_mut(&mut self.trees, key)
    }

    /// Look up a registered blackboard.
    pub fn blackboard(&self, key: BlackboardKey) -> Option<&Blackboard> {
        self.blackboards
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, blackboard)| blackboard)
    }

    /// Mutable access to a registered blackboard, e.g. to feed it game state.
    pub fn blackboard_mut(&mut self, key: BlackboardKey) -> Option<&mut Blackboard> {
        find_mut(&mut self.blackboards, key)
    }

    /// Key of the tree [`update`](Self::update) drives, if any.
    pub fn current_tree_key(&self) -> Option<TreeKey> {
        self.current_tree
    }

    /// Key of the blackboard [`update`](Self::update) uses, if any.
    pub fn current_blackboard_key(&self) -> Option<BlackboardKey> {
        self.current_blackboard
    }

    /// The tree [`update`](Self::update) drives.
    pub fn current_tree(&self) -> Option<&BehaviorTree> {
        self.tree(self.current_tree?)
    }

    /// Mutable access to the tree [`update`](Self::update) drives.
    pub fn current_tree_mut(&mut self) -> Option<&mut BehaviorTree> {
        let key = self.current_tree?;
        self.tree_mut(key)
    }

    /// Number of registered trees.
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Number of registered blackboards.
    pub fn blackboard_count(&self) -> usize {
        self.blackboards.len()
    }

    /// Start the current tree.
    ///
    /// Returns `Ok(false)` if the tree has no child to run or is already
    /// running. The root's child is started on the next update.
    ///
    /// # Errors
    ///
    /// [`TreeError::NoCurrentTree`] if no tree is registered.
    pub fn start_tree(&mut self) -> Result<bool> {
        let key = self.current_tree.ok_or(TreeError::NoCurrentTree)?;
        let (tree, blackboard) = self.current_pair(key)?;
        if tree.children(tree.root()).is_empty() {
            return Ok(false);
        }
        Ok(tree.start(blackboard))
    }

    /// Advance the current tree by `delta` seconds.
    ///
    /// Does nothing when no tree is registered.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidDelta`] for a negative or non-finite `delta`.
    pub fn update(&mut self, delta: f32) -> Result<()> {
        let Some(key) = self.current_tree else {
            return Ok(());
        };
        let (tree, blackboard) = self.current_pair(key)?;
        tree.tick(delta, blackboard)?;
        let changed = blackboard.update();
        if !changed.is_empty() {
            tree.notify_changes(&changed, blackboard);
        }
        Ok(())
    }

    fn current_pair(&mut self, key: TreeKey) -> Result<(&mut BehaviorTree, &mut Blackboard)> {
        let tree = find_mut(&mut self.trees, key).ok_or(TreeError::NoCurrentTree)?;
        let blackboard = match self.current_blackboard {
            Some(board) => match find_mut(&mut self.blackboards, board) {
                Some(blackboard) => blackboard,
                None => &mut self.scratch,
            },
            None => &mut self.scratch,
        };
        Ok((tree, blackboard))
    }
}

impl Default for TreeManager {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

fn find_mut<K: PartialEq, T>(entries: &mut [(K, T)], key: K) -> Option<&mut T> {
    entries
        .iter_mut()
        .find(|(k, _)| *k == key)
        .map(|(_, value)| value)
}
