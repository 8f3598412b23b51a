// SPDX-License-Identifier: MPL-2.0

//! Caller-owned holder for at most one live switcher.
//!
//! Every operation is a silent no-op while the slot is empty, and failures are
//! logged rather than returned, so embedders can call into it unconditionally.

use bg_switcher_config::Options;

use crate::error::SwitcherError;
use crate::rotation::{RotationHost, RotationScheduler, RotationToken};
use crate::sink::PresentationSink;
use crate::stylesheet::{Stylesheet, references_switcher};
use crate::switcher::BackgroundSwitcher;

pub struct SwitcherSlot<P: PresentationSink, S: RotationScheduler> {
    instance: Option<BackgroundSwitcher<P, S>>,
}

impl<P: PresentationSink, S: RotationScheduler> Default for SwitcherSlot<P, S> {
    fn default() -> Self {
        Self { instance: None }
    }
}

impl<P: PresentationSink, S: RotationScheduler> std::fmt::Debug for SwitcherSlot<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitcherSlot")
            .field("instance", &self.instance)
            .finish()
    }
}

impl<P: PresentationSink, S: RotationScheduler> SwitcherSlot<P, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destroys the current instance, if any, then constructs a new one.
    pub fn init(
        &mut self,
        options: Options,
        sink: P,
        scheduler: S,
    ) -> Result<&mut BackgroundSwitcher<P, S>, SwitcherError> {
        if let Some(previous) = self.instance.take() {
            previous.destroy();
        }
        let switcher = BackgroundSwitcher::new(options, sink, scheduler)?;
        Ok(self.instance.insert(switcher))
    }

    /// Constructs a default instance if any of `sheets` was written for the
    /// switcher. Returns whether an instance was created.
    pub fn auto_init(
        &mut self,
        sheets: &[Stylesheet],
        sink: P,
        scheduler: S,
    ) -> Result<bool, SwitcherError> {
        if !references_switcher(sheets) {
            tracing::debug!("no stylesheet references the switcher, skipping auto init");
            return Ok(false);
        }
        self.init(Options::bootstrap(), sink, scheduler)?;
        tracing::info!("background switcher initialised automatically");
        Ok(true)
    }

    pub fn instance(&self) -> Option<&BackgroundSwitcher<P, S>> {
        self.instance.as_ref()
    }

    pub fn instance_mut(&mut self) -> Option<&mut BackgroundSwitcher<P, S>> {
        self.instance.as_mut()
    }

    pub fn destroy(&mut self) {
        if let Some(instance) = self.instance.take() {
            instance.destroy();
        }
    }

    fn with(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut BackgroundSwitcher<P, S>) -> Result<(), SwitcherError>,
    ) {
        let Some(instance) = self.instance.as_mut() else {
            tracing::trace!(operation, "no switcher instance");
            return;
        };
        match f(instance) {
            Ok(()) => {}
            // already reported where the index was checked
            Err(SwitcherError::Range { .. }) => {}
            Err(err) => tracing::error!(operation, %err, "switcher operation failed"),
        }
    }

    pub fn switch_background(&mut self, index: usize) {
        self.with("switch_background", |s| s.select(index));
    }

    pub fn random_background(&mut self) {
        self.with("random_background", BackgroundSwitcher::select_random);
    }

    pub fn next_background(&mut self) {
        self.with("next_background", BackgroundSwitcher::select_next);
    }

    pub fn prev_background(&mut self) {
        self.with("prev_background", BackgroundSwitcher::select_previous);
    }

    pub fn toggle_thumbs(&mut self, show: Option<bool>) {
        self.with("toggle_thumbs", |s| s.set_thumb_visibility(show));
    }

    pub fn start_auto_rotate(&mut self) {
        self.with("start_auto_rotate", BackgroundSwitcher::start_auto_rotate);
    }

    pub fn stop_auto_rotate(&mut self) {
        self.with("stop_auto_rotate", |s| {
            s.stop_auto_rotate();
            Ok(())
        });
    }

    pub fn set_auto_rotate_interval(&mut self, ms: u64) {
        self.with("set_auto_rotate_interval", |s| s.set_auto_rotate_interval(ms));
    }

    pub fn on_thumb_click(&mut self, position: usize) {
        self.with("on_thumb_click", |s| s.on_thumb_click(position));
    }

    pub fn attach(&mut self) {
        self.with("attach", BackgroundSwitcher::attach);
    }
}

impl<P: PresentationSink, S: RotationScheduler> RotationHost for SwitcherSlot<P, S> {
    fn on_rotation_tick(&mut self, token: RotationToken) {
        if let Some(instance) = self.instance.as_mut() {
            instance.on_rotation_tick(token);
        }
    }
}
