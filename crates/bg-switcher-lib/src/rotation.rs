// SPDX-License-Identifier: MPL-2.0

//! Scheduling of the periodic rotation task.
//!
//! A [`RotationScheduler`] owns the repeating timer; the switcher only keeps
//! the [`RotationToken`] it was given. Ticks are delivered back through
//! [`RotationHost::on_rotation_tick`], and a tick carrying a token that is no
//! longer current is dropped by the receiver.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::error::SwitcherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RotationToken(pub(crate) u64);

pub trait RotationScheduler {
    /// Starts a task that ticks every `interval` until cancelled.
    fn schedule(&mut self, interval: Duration) -> Result<RotationToken, SwitcherError>;

    /// Cancels `token`. No tick for it may be delivered afterwards.
    fn cancel(&mut self, token: RotationToken);
}

/// Receiver of rotation ticks.
pub trait RotationHost {
    fn on_rotation_tick(&mut self, token: RotationToken);
}

#[derive(Debug)]
struct ManualTask {
    token: RotationToken,
    interval: Duration,
    next_due: Duration,
}

#[derive(Debug, Default)]
struct ClockState {
    now: Duration,
    next_token: u64,
    tasks: Vec<ManualTask>,
}

/// Virtual clock. Time only moves through [`ManualClock::advance`].
///
/// Clones share the same clock, so one handle can be moved into a switcher
/// while another drives time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Rc<RefCell<ClockState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the clock was created.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    pub fn active_tasks(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    /// Moves time forward by `by`, delivering every tick that falls due to
    /// `host` in order. Returns how many ticks were delivered.
    pub fn advance<H: RotationHost>(&self, host: &mut H, by: Duration) -> usize {
        let target = self.now() + by;
        let mut delivered = 0;

        loop {
            // state must not be borrowed while the host runs; it may
            // schedule or cancel from inside the tick
            let due = {
                let mut state = self.state.borrow_mut();
                let Some(task) = state
                    .tasks
                    .iter_mut()
                    .filter(|task| task.next_due <= target)
                    .min_by_key(|task| (task.next_due, task.token))
                else {
                    break;
                };
                let (token, at) = (task.token, task.next_due);
                task.next_due += task.interval;
                state.now = at;
                token
            };

            host.on_rotation_tick(due);
            delivered += 1;
        }

        self.state.borrow_mut().now = target;
        delivered
    }
}

impl RotationScheduler for ManualClock {
    fn schedule(&mut self, interval: Duration) -> Result<RotationToken, SwitcherError> {
        if interval.is_zero() {
            return Err(SwitcherError::InvalidInterval);
        }
        let mut state = self.state.borrow_mut();
        state.next_token += 1;
        let token = RotationToken(state.next_token);
        let next_due = state.now + interval;
        state.tasks.push(ManualTask {
            token,
            interval,
            next_due,
        });
        Ok(token)
    }

    fn cancel(&mut self, token: RotationToken) {
        self.state
            .borrow_mut()
            .tasks
            .retain(|task| task.token != token);
    }
}
