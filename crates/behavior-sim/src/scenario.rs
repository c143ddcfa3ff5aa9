//! The guard scenario driven by the simulator.
use behavior_tree::builder::{
    action, observer, random_selector, selector, sequence, wait_for_condition,
};
use behavior_tree::{
    AbortRule, ActionResult, Blackboard, BlackboardCondition, Blueprint, Operator, Task,
};

/// Scripted blackboard writes, keyed by the frame they happen before.
pub const SCRIPT: &[(u64, &str, Event)] = &[
    (5, "noise", Event::Set),
    (9, "footsteps", Event::Set),
    (14, "noise", Event::Clear),
    (20, "enemy", Event::Set),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Set,
    Clear,
}

pub fn apply_script(frame: u64, blackboard: &mut Blackboard) {
    for &(at, key, event) in SCRIPT {
        if at != frame {
            continue;
        }
        tracing::info!("frame {frame}: {event:?} '{key}'");
        match event {
            Event::Set => blackboard.set(key, true),
            Event::Clear => {
                blackboard.unset(key);
            }
        }
    }
}

/// A guard that fights when an enemy is known, searches on noise and
/// otherwise idles.
pub fn guard() -> Blueprint {
    selector(vec![
        observer(
            BlackboardCondition::is_set("enemy"),
            AbortRule::LowerPriorityRestart,
            sequence(vec![strike("Aim", 2), strike("Shoot", 3), retreat()]).named("Combat"),
        )
        .named("Alert"),
        observer(
            BlackboardCondition::is_set("noise"),
            AbortRule::Both,
            sequence(vec![
                strike("Look", 2),
                wait_for_condition(
                    |board: &Blackboard| board.is_set("footsteps"),
                    0.5,
                    0.1,
                    counter("Listen", "listens"),
                ),
            ])
            .named("Search"),
        )
        .named("Curious"),
        random_selector(vec![
            counter("Sit", "rests"),
            observer(
                BlackboardCondition::new("rests", Operator::Greater, 4),
                AbortRule::None,
                counter("Stretch", "stretches"),
            ),
        ])
        .named("Idle"),
    ])
    .named("Guard")
}

/// Runs for `frames` updates, then succeeds.
fn strike(name: &str, frames: u32) -> Blueprint {
    let mut left = frames;
    action(
        name,
        Task::cancellable(move |_, cancel| {
            if cancel {
                left = frames;
                return ActionResult::Failed;
            }
            left = left.saturating_sub(1);
            if left == 0 {
                left = frames;
                ActionResult::Success
            } else {
                ActionResult::Progress
            }
        }),
    )
}

/// Clears the enemy once the fight is over.
fn retreat() -> Blueprint {
    action(
        "Retreat",
        Task::instant(|board| {
            board.unset("enemy");
            true
        }),
    )
}

/// Never finishes on its own; bumps `key` every update.
fn counter(name: &str, key: &'static str) -> Blueprint {
    action(
        name,
        Task::cancellable(move |board, cancel| {
            if cancel {
                return ActionResult::Failed;
            }
            let count = board.get_int(key).unwrap_or(0);
            board.set(key, count + 1);
            ActionResult::Progress
        }),
    )
}
