//! Leaf tasks backed by external callables.
//!
//! [`Task`] is the only contract between the engine and concrete game logic.
//! Four callable shapes are supported:
//!
//! - [`Task::instant`]: returns `bool` and completes on its first update
//! - [`Task::cancellable`]: called every update with `cancel = false`, and once
//!   with `cancel = true` when the node is asked to stop
//! - [`Task::request`]: receives [`ActionRequest::Start`], `Update` or `Cancel`
//! - [`Task::fire`]: runs once and always succeeds

use crate::blackboard::Blackboard;
use crate::status::{ActionRequest, ActionResult};

type InstantFn = Box<dyn FnMut(&mut Blackboard) -> bool>;
type CancellableFn = Box<dyn FnMut(&mut Blackboard, bool) -> ActionResult>;
type RequestFn = Box<dyn FnMut(&mut Blackboard, ActionRequest) -> ActionResult>;
type FireFn = Box<dyn FnMut(&mut Blackboard)>;

pub enum Task {
    Instant(InstantFn),
    Cancellable(CancellableFn),
    Request(RequestFn),
    Fire(FireFn),
}

impl Task {
    pub fn instant(f: impl FnMut(&mut Blackboard) -> bool + 'static) -> Self {
        Task::Instant(Box::new(f))
    }

    pub fn cancellable(f: impl FnMut(&mut Blackboard, bool) -> ActionResult + 'static) -> Self {
        Task::Cancellable(Box::new(f))
    }

    pub fn request(
        f: impl FnMut(&mut Blackboard, ActionRequest) -> ActionResult + 'static,
    ) -> Self {
        Task::Request(Box::new(f))
    }

    pub fn fire(f: impl FnMut(&mut Blackboard) + 'static) -> Self {
        Task::Fire(Box::new(f))
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            Task::Instant(_) => "Instant",
            Task::Cancellable(_) => "Cancellable",
            Task::Request(_) => "Request",
            Task::Fire(_) => "Fire",
        };
        f.write_str(shape)
    }
}

/// Per-activation bookkeeping of an action leaf.
pub(crate) struct ActionNode {
    task: Task,
    was_blocked: bool,
    result: ActionResult,
    request: ActionRequest,
}

impl ActionNode {
    pub(crate) fn new(task: Task) -> Self {
        Self {
            task,
            was_blocked: false,
            result: ActionResult::Progress,
            request: ActionRequest::Start,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.was_blocked = false;
        self.result = ActionResult::Progress;
        self.request = ActionRequest::Start;
    }

    pub(crate) fn was_blocked(&self) -> bool {
        self.was_blocked
    }

    /// Run one update. Returns the success flag once the task has finished.
    pub(crate) fn update(&mut self, blackboard: &mut Blackboard) -> Option<bool> {
        self.result = match &mut self.task {
            Task::Fire(f) => {
                f(blackboard);
                ActionResult::Success
            }
            Task::Instant(f) => {
                if f(blackboard) {
                    ActionResult::Success
                } else {
                    ActionResult::Failed
                }
            }
            Task::Cancellable(f) => f(blackboard, false),
            Task::Request(f) => f(blackboard, self.request),
        };

        match self.result {
            ActionResult::Blocked => {
                // Re-issue Start once the task unblocks.
                self.was_blocked = true;
                self.request = ActionRequest::Start;
                None
            }
            ActionResult::Progress => {
                self.was_blocked = false;
                self.request = ActionRequest::Update;
                None
            }
            result => Some(result.is_success()),
        }
    }

    /// Signal cancellation and return the success flag the node stops with.
    pub(crate) fn cancel(&mut self, blackboard: &mut Blackboard) -> bool {
        match &mut self.task {
            Task::Cancellable(f) => self.result = f(blackboard, true),
            Task::Request(f) => self.result = f(blackboard, ActionRequest::Cancel),
            Task::Instant(_) | Task::Fire(_) => {}
        }
        self.result.is_success()
    }
}
