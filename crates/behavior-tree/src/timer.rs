//! Tree clock and per-node timer scheduling.
//!
//! Each tree owns one [`Clock`], advanced once per external tick, and one
//! [`TimerService`]. Timers belong to a node and only fire while that node is
//! updated, so a frozen subtree freezes its timers as well.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::node::NodeId;

/// Repeat count meaning "fire forever".
pub const REPEAT_FOREVER: i32 = -1;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Monotonic time source shared by all timers of a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Clock {
    elapsed: f64,
    ticks: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one external frame of `delta` seconds.
    pub fn advance(&mut self, delta: f32) {
        self.elapsed += f64::from(delta);
        self.ticks += 1;
    }

    /// Seconds elapsed since the clock was created.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of frames the clock has been advanced.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

struct Timer<A> {
    id: TimerId,
    owner: NodeId,
    interval: f32,
    variance: f32,
    /// `-1` for infinite, otherwise firings left.
    remaining: i32,
    due: f64,
    /// `None` while the action is being executed by the caller.
    action: Option<A>,
}

/// A timer that came due, with its action moved out for execution.
///
/// Hand it back through [`TimerService::restore`] so repeating timers keep
/// their action.
pub struct Fired<A> {
    pub id: TimerId,
    pub action: A,
}

/// Scheduler for delayed and periodic actions owned by nodes.
pub struct TimerService<A> {
    timers: Vec<Timer<A>>,
    next_id: u64,
    rng: ChaCha8Rng,
}

impl<A> TimerService<A> {
    pub fn new(seed: u64) -> Self {
        Self {
            timers: Vec::new(),
            next_id: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Schedule `action` to fire `interval ± variance` seconds after `now`.
    ///
    /// `repeat` is the number of firings: `-1` repeats forever and `0` yields an
    /// already-exhausted timer that is never stored.
    pub fn add(
        &mut self,
        owner: NodeId,
        now: f64,
        interval: f32,
        variance: f32,
        repeat: i32,
        action: A,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        if repeat == 0 {
            return id;
        }

        let due = now + self.jittered(interval, variance);
        self.timers.push(Timer {
            id,
            owner,
            interval,
            variance,
            remaining: repeat.max(REPEAT_FOREVER),
            due,
            action: Some(action),
        });
        id
    }

    /// Remove a timer. Returns `false` if it had already fired out or was removed.
    pub fn remove(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        self.timers.len() != before
    }

    /// Remove every timer owned by `owner`, returning how many were dropped.
    pub fn remove_owned_by(&mut self, owner: NodeId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.owner != owner);
        before - self.timers.len()
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.timers.iter().any(|timer| timer.id == id)
    }

    /// Number of live timers owned by `owner`.
    pub fn count_owned_by(&self, owner: NodeId) -> usize {
        self.timers.iter().filter(|timer| timer.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Collect every timer of `owner` due at `now`, in creation order.
    ///
    /// Each fired timer fires once per call and is rescheduled from `now`.
    /// Exhausted timers are removed before their action is returned.
    pub fn take_due(&mut self, owner: NodeId, now: f64) -> Vec<Fired<A>> {
        let mut fired = Vec::new();
        let mut exhausted = Vec::new();

        for index in 0..self.timers.len() {
            let (interval, variance) = {
                let timer = &self.timers[index];
                if timer.owner != owner || timer.due > now || timer.action.is_none() {
                    continue;
                }
                (timer.interval, timer.variance)
            };
            let next_due = now + self.jittered(interval, variance);

            let timer = &mut self.timers[index];
            if timer.remaining > 0 {
                timer.remaining -= 1;
            }
            timer.due = next_due;
            if let Some(action) = timer.action.take() {
                fired.push(Fired {
                    id: timer.id,
                    action,
                });
            }
            if timer.remaining == 0 {
                exhausted.push(timer.id);
            }
        }

        self.timers.retain(|timer| !exhausted.contains(&timer.id));
        fired
    }

    /// Give a fired action back to its timer, unless the timer was removed or
    /// exhausted in the meantime.
    pub fn restore(&mut self, fired: Fired<A>) {
        if let Some(timer) = self
            .timers
            .iter_mut()
            .find(|timer| timer.id == fired.id && timer.action.is_none())
        {
            timer.action = Some(fired.action);
        }
    }

    fn jittered(&mut self, interval: f32, variance: f32) -> f64 {
        let variance = variance.abs();
        let offset = if variance > 0.0 {
            self.rng.gen_range(-variance..=variance)
        } else {
            0.0
        };
        f64::from((interval + offset).max(0.0))
    }
}
