// SPDX-License-Identifier: MPL-2.0

use std::collections::HashMap;
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, RegistrationToken};

use crate::error::SwitcherError;
use crate::rotation::{RotationHost, RotationScheduler, RotationToken};

/// Rotation scheduler backed by calloop timer sources.
///
/// Each scheduled task is a repeating [`Timer`] inserted into the loop; ticks
/// are forwarded to the loop data through [`RotationHost`]. Cancelling removes
/// the source from the loop, so no tick is dispatched afterwards.
pub struct CalloopScheduler<D: 'static> {
    handle: LoopHandle<'static, D>,
    next_token: u64,
    sources: HashMap<RotationToken, RegistrationToken>,
}

impl<D: 'static> std::fmt::Debug for CalloopScheduler<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalloopScheduler")
            .field("active", &self.sources.len())
            .finish_non_exhaustive()
    }
}

impl<D: 'static> CalloopScheduler<D> {
    pub fn new(handle: LoopHandle<'static, D>) -> Self {
        Self {
            handle,
            next_token: 0,
            sources: HashMap::new(),
        }
    }
}

impl<D: RotationHost + 'static> RotationScheduler for CalloopScheduler<D> {
    fn schedule(&mut self, interval: Duration) -> Result<RotationToken, SwitcherError> {
        if interval.is_zero() {
            return Err(SwitcherError::InvalidInterval);
        }
        self.next_token += 1;
        let token = RotationToken(self.next_token);

        let registration = self
            .handle
            .insert_source(Timer::from_duration(interval), move |_, _, host: &mut D| {
                host.on_rotation_tick(token);
                TimeoutAction::ToDuration(interval)
            })
            .map_err(|err| SwitcherError::Schedule(err.error.to_string()))?;

        tracing::trace!(?token, ?interval, "rotation timer inserted");
        self.sources.insert(token, registration);
        Ok(token)
    }

    fn cancel(&mut self, token: RotationToken) {
        if let Some(registration) = self.sources.remove(&token) {
            self.handle.remove(registration);
            tracing::trace!(?token, "rotation timer removed");
        }
    }
}
