//! State and result enums shared by every node.

/// Lifecycle state of a node.
///
/// `Inactive -> Active -> Stopping -> Inactive`. A node may be reactivated any
/// number of times; `Stopping` is only reachable from `Active` and means a stop
/// was requested but has not completed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum NodeState {
    #[default]
    Inactive,
    Active,
    Stopping,
}

impl NodeState {
    /// Returns `true` while the node is inside an activation, i.e. it has been
    /// started and has not yet completed its stop.
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, NodeState::Active | NodeState::Stopping)
    }
}

/// Structural category of a node, fixed at construction.
///
/// - `Task` nodes are leaves and never have children.
/// - `Decorator` nodes have at most one child.
/// - `Composite` nodes have any number of children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum NodeType {
    Task,
    Composite,
    Decorator,
}

impl NodeType {
    /// Maximum number of children a node of this type may own.
    pub fn child_limit(self) -> Option<usize> {
        match self {
            NodeType::Task => Some(0),
            NodeType::Decorator => Some(1),
            NodeType::Composite => None,
        }
    }
}

/// Result reported by multi-tick action callables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum ActionResult {
    /// The action completed successfully.
    Success,
    /// The action could not be completed.
    Failed,
    /// The action cannot make progress this tick; it will be restarted.
    Blocked,
    /// The action is still running.
    Progress,
}

impl ActionResult {
    /// Returns `true` for results that end the action.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionResult::Success | ActionResult::Failed)
    }

    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, ActionResult::Success)
    }
}

/// Request passed to request-style action callables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum ActionRequest {
    Start,
    Update,
    Cancel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_covers_active_and_stopping() {
        assert!(!NodeState::Inactive.is_running());
        assert!(NodeState::Active.is_running());
        assert!(NodeState::Stopping.is_running());
    }

    #[test]
    fn child_limits_follow_node_type() {
        assert_eq!(NodeType::Task.child_limit(), Some(0));
        assert_eq!(NodeType::Decorator.child_limit(), Some(1));
        assert_eq!(NodeType::Composite.child_limit(), None);
    }

    #[test]
    fn only_success_and_failed_are_terminal() {
        assert!(ActionResult::Success.is_terminal());
        assert!(ActionResult::Failed.is_terminal());
        assert!(!ActionResult::Blocked.is_terminal());
        assert!(!ActionResult::Progress.is_terminal());
        assert_eq!(NodeState::Stopping.to_string(), "stopping");
    }
}
