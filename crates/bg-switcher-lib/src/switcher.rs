// SPDX-License-Identifier: MPL-2.0

//! The background switcher component.

use bg_switcher_config::{BACKGROUND_COUNT, Config, DEFAULT_INDEX};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SwitcherError;
use crate::markup::{background_class, plugin_markup};
use crate::rotation::{RotationHost, RotationScheduler, RotationToken};
use crate::sink::{Display, PresentationChange, PresentationSink};

const _: () = assert!(BACKGROUND_COUNT > 1, "random selection needs a choice");

/// Cycles the page background among [`BACKGROUND_COUNT`] choices.
///
/// All effects go through the sink `P`; the periodic rotation task lives in
/// the scheduler `S`. The component is torn down by [`BackgroundSwitcher::destroy`]
/// or when dropped.
pub struct BackgroundSwitcher<P: PresentationSink, S: RotationScheduler> {
    config: Config,
    sink: P,
    scheduler: S,
    rng: StdRng,
    current_index: usize,
    rotation: Option<RotationToken>,
    /// `Some` only if thumbnail markup was created; holds its visibility.
    thumbs_visible: Option<bool>,
    bound: bool,
    torn_down: bool,
}

impl<P: PresentationSink, S: RotationScheduler> std::fmt::Debug for BackgroundSwitcher<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSwitcher")
            .field("config", &self.config)
            .field("current_index", &self.current_index)
            .field("rotation", &self.rotation)
            .field("thumbs_visible", &self.thumbs_visible)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl<P: PresentationSink, S: RotationScheduler> BackgroundSwitcher<P, S> {
    pub fn new(config: impl Into<Config>, sink: P, scheduler: S) -> Result<Self, SwitcherError> {
        Self::with_rng(config, sink, scheduler, StdRng::from_os_rng())
    }

    /// Like [`BackgroundSwitcher::new`] with a caller-provided random source.
    pub fn with_rng(
        config: impl Into<Config>,
        mut sink: P,
        scheduler: S,
        rng: StdRng,
    ) -> Result<Self, SwitcherError> {
        let config = config.into();

        if !sink.has_container(&config.container) {
            tracing::error!(container = %config.container, "container not found");
            return Err(SwitcherError::Configuration(format!(
                "container {} does not exist",
                config.container
            )));
        }

        sink.apply(PresentationChange::InsertMarkup {
            container: config.container.clone(),
            markup: plugin_markup(&config),
        })?;

        let mut switcher = Self {
            thumbs_visible: config.enable_thumbs.then_some(true),
            config,
            sink,
            scheduler,
            rng,
            current_index: DEFAULT_INDEX,
            rotation: None,
            bound: false,
            torn_down: false,
        };

        // Errors from here on drop `switcher`, which removes the markup again.
        if switcher.sink.is_attached(&switcher.config.container) {
            switcher.attach()?;
        } else if switcher.thumbs_visible.is_some() {
            tracing::debug!("thumbnail markup not attached yet, waiting for attach()");
        }

        if switcher.config.auto_rotate {
            switcher.start_auto_rotate()?;
        }

        switcher.select(DEFAULT_INDEX)?;

        tracing::debug!(?switcher, "background switcher constructed");
        Ok(switcher)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_rotating(&self) -> bool {
        self.rotation.is_some()
    }

    /// `None` if thumbnails were never created.
    pub fn thumbs_visible(&self) -> Option<bool> {
        self.thumbs_visible
    }

    /// Whether thumbnail clicks are being handled.
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Binds thumbnail clicks once the inserted markup is live.
    ///
    /// Hosts whose sink attaches markup asynchronously call this from their
    /// ready notification. Calling it again is a no-op.
    pub fn attach(&mut self) -> Result<(), SwitcherError> {
        if self.bound || self.thumbs_visible.is_none() {
            return Ok(());
        }
        self.bound = true;
        tracing::debug!(thumbs = BACKGROUND_COUNT, "thumbnail controls bound");
        self.update_thumbnail_selection(self.current_index)
    }

    /// Makes background `index` (1-based) the active one.
    pub fn select(&mut self, index: usize) -> Result<(), SwitcherError> {
        if !(1..=BACKGROUND_COUNT).contains(&index) {
            tracing::error!(index, "background index out of range");
            return Err(SwitcherError::Range { index });
        }

        for i in (1..=BACKGROUND_COUNT).filter(|i| *i != index) {
            self.sink
                .apply(PresentationChange::RemoveRootClass(background_class(i)))?;
        }
        self.sink
            .apply(PresentationChange::AddRootClass(background_class(index)))?;
        // the root class is the selection; thumbnails only mirror it
        self.current_index = index;

        tracing::debug!(
            index,
            classes = ?self.sink.root_classes(),
            bg = ?self.sink.computed_variable("--bg"),
            "switched background"
        );

        self.update_thumbnail_selection(index).inspect_err(|err| {
            tracing::warn!(index, %err, "thumbnails out of sync with background");
        })
    }

    fn update_thumbnail_selection(&mut self, index: usize) -> Result<(), SwitcherError> {
        if self.thumbs_visible.is_none() {
            return Ok(());
        }
        for position in 1..=BACKGROUND_COUNT {
            let selected = position == index;
            self.sink.apply(PresentationChange::ThumbState {
                position,
                selected,
                checked: selected,
            })?;
        }
        Ok(())
    }

    /// Selects uniformly among every background except the current one.
    pub fn select_random(&mut self) -> Result<(), SwitcherError> {
        let mut index = self.rng.random_range(1..BACKGROUND_COUNT);
        if index >= self.current_index {
            index += 1;
        }
        self.select(index)
    }

    pub fn select_next(&mut self) -> Result<(), SwitcherError> {
        self.select(self.current_index % BACKGROUND_COUNT + 1)
    }

    pub fn select_previous(&mut self) -> Result<(), SwitcherError> {
        let index = if self.current_index <= 1 {
            BACKGROUND_COUNT
        } else {
            self.current_index - 1
        };
        self.select(index)
    }

    /// Shows or hides the thumbnail list; `None` toggles.
    pub fn set_thumb_visibility(&mut self, show: Option<bool>) -> Result<(), SwitcherError> {
        let Some(visible) = self.thumbs_visible else {
            return Ok(());
        };
        let visible = show.unwrap_or(!visible);
        let display = if visible { Display::Flex } else { Display::Hidden };
        self.sink.apply(PresentationChange::ThumbsDisplay(display))?;
        self.thumbs_visible = Some(visible);
        Ok(())
    }

    /// Starts rotating unless rotation is disabled or already running.
    pub fn start_auto_rotate(&mut self) -> Result<(), SwitcherError> {
        if !self.config.auto_rotate {
            tracing::debug!("auto-rotate disabled by configuration");
            return Ok(());
        }
        if self.rotation.is_some() {
            return Ok(());
        }
        let token = self.scheduler.schedule(self.config.interval())?;
        tracing::debug!(interval_ms = self.config.auto_rotate_interval, "auto-rotate started");
        self.rotation = Some(token);
        Ok(())
    }

    pub fn stop_auto_rotate(&mut self) {
        if let Some(token) = self.rotation.take() {
            self.scheduler.cancel(token);
            tracing::debug!("auto-rotate stopped");
        }
    }

    pub fn restart_auto_rotate(&mut self) -> Result<(), SwitcherError> {
        self.stop_auto_rotate();
        self.start_auto_rotate()
    }

    /// Changes the interval; a running rotation picks it up immediately.
    pub fn set_auto_rotate_interval(&mut self, ms: u64) -> Result<(), SwitcherError> {
        if ms == 0 {
            tracing::error!("auto-rotate interval must be positive");
            return Err(SwitcherError::InvalidInterval);
        }
        self.config.auto_rotate_interval = ms;
        if self.rotation.is_some() {
            self.restart_auto_rotate()?;
        }
        Ok(())
    }

    /// Handles activation of the thumbnail at `position` (1-based).
    ///
    /// Manual selection resets the rotation clock.
    pub fn on_thumb_click(&mut self, position: usize) -> Result<(), SwitcherError> {
        if !self.bound {
            tracing::debug!(position, "thumbnail click before attach ignored");
            return Ok(());
        }
        tracing::debug!(position, "thumbnail clicked");
        self.select(position)?;
        self.restart_auto_rotate()
    }

    pub fn add_custom_background(
        &mut self,
        thumbnail: &str,
        full_size: &str,
    ) -> Result<(), SwitcherError> {
        tracing::warn!(thumbnail, full_size, "custom backgrounds are not available");
        Err(SwitcherError::Unsupported("adding custom backgrounds"))
    }

    /// Stops rotation and removes the inserted markup.
    pub fn destroy(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.stop_auto_rotate();
        if let Err(err) = self.sink.apply(PresentationChange::RemoveMarkup {
            container: self.config.container.clone(),
        }) {
            tracing::warn!(%err, "failed to remove switcher markup");
        }
        tracing::debug!("background switcher destroyed");
    }
}

impl<P: PresentationSink, S: RotationScheduler> RotationHost for BackgroundSwitcher<P, S> {
    fn on_rotation_tick(&mut self, token: RotationToken) {
        if self.rotation != Some(token) {
            tracing::trace!(?token, "stale rotation tick");
            return;
        }
        if let Err(err) = self.select_random() {
            tracing::error!(%err, "rotation failed");
        }
    }
}

impl<P: PresentationSink, S: RotationScheduler> Drop for BackgroundSwitcher<P, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::PLUGIN_CLASS;
    use crate::rotation::ManualClock;
    use crate::sink::{MemorySink, SinkError};
    use bg_switcher_config::{Container, Options};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    type Shared = Rc<RefCell<MemorySink>>;

    struct Fixture {
        sink: Shared,
        clock: ManualClock,
        switcher: BackgroundSwitcher<Shared, ManualClock>,
    }

    fn fixture(options: Options) -> Fixture {
        fixture_with_sink(options, MemorySink::new())
    }

    fn fixture_with_sink(options: Options, sink: MemorySink) -> Fixture {
        let sink = Rc::new(RefCell::new(sink));
        let clock = ManualClock::new();
        let switcher = BackgroundSwitcher::with_rng(
            options,
            sink.clone(),
            clock.clone(),
            StdRng::seed_from_u64(7),
        )
        .unwrap();
        Fixture {
            sink,
            clock,
            switcher,
        }
    }

    fn root_backgrounds(sink: &Shared) -> Vec<String> {
        sink.root_classes()
            .into_iter()
            .filter(|c| c.starts_with("bg-"))
            .collect()
    }

    #[test]
    fn construction_applies_default_selection() {
        let f = fixture(Options::default());

        assert_eq!(f.switcher.current_index(), DEFAULT_INDEX);
        assert_eq!(root_backgrounds(&f.sink), vec!["bg-4"]);
        assert_eq!(f.sink.borrow().selected_thumbs(), vec![4]);
        assert!(f.switcher.is_rotating());
        assert!(f.switcher.is_bound());
        assert!(f.sink.borrow().plugin(&Container::default()).is_some());
    }

    #[test]
    fn invalid_container_inserts_nothing() {
        let sink = Rc::new(RefCell::new(MemorySink::new()));
        let clock = ManualClock::new();
        let result = BackgroundSwitcher::new(
            Options::default().container(Container::from("#nowhere")),
            sink.clone(),
            clock.clone(),
        );

        assert!(matches!(result, Err(SwitcherError::Configuration(_))));
        assert_eq!(sink.borrow().applied(), 0);
        assert_eq!(clock.active_tasks(), 0);
    }

    #[test]
    fn select_every_index() {
        let mut f = fixture(Options::default().auto_rotate(false));

        for index in 1..=BACKGROUND_COUNT {
            f.switcher.select(index).unwrap();
            assert_eq!(f.switcher.current_index(), index);
            assert_eq!(root_backgrounds(&f.sink), vec![background_class(index)]);
            assert_eq!(f.sink.borrow().selected_thumbs(), vec![index]);
            assert_eq!(f.sink.borrow().checked_thumbs(), vec![index]);
        }
    }

    #[test]
    fn out_of_range_leaves_state_unchanged() {
        let mut f = fixture(Options::default().auto_rotate(false));
        f.switcher.select(6).unwrap();
        let applied = f.sink.borrow().applied();

        for index in [0, 10] {
            assert!(matches!(
                f.switcher.select(index),
                Err(SwitcherError::Range { index: i }) if i == index
            ));
        }

        assert_eq!(f.switcher.current_index(), 6);
        assert_eq!(f.sink.borrow().applied(), applied);
        assert_eq!(root_backgrounds(&f.sink), vec!["bg-6"]);
    }

    #[test]
    fn selection_stays_consistent_when_thumbnails_vanish() {
        let mut f = fixture(Options::default().auto_rotate(false));
        f.sink
            .borrow_mut()
            .apply(PresentationChange::RemoveMarkup {
                container: Container::default(),
            })
            .unwrap();

        let result = f.switcher.select(5);

        assert!(matches!(
            result,
            Err(SwitcherError::Sink(SinkError::MissingElement(_)))
        ));
        assert_eq!(f.switcher.current_index(), 5);
        assert_eq!(root_backgrounds(&f.sink), vec![background_class(5)]);
        assert_eq!(f.switcher.sink().root_classes(), vec!["bg-5"]);
    }

    #[test]
    fn reselecting_current_index_is_harmless() {
        let mut f = fixture(Options::default().auto_rotate(false));
        f.switcher.select(4).unwrap();
        assert_eq!(f.switcher.current_index(), 4);
        assert_eq!(root_backgrounds(&f.sink), vec!["bg-4"]);
        assert_eq!(f.sink.borrow().selected_thumbs(), vec![4]);
    }

    #[test]
    fn next_and_previous_wrap_around() {
        let mut f = fixture(Options::default().auto_rotate(false));

        f.switcher.select(9).unwrap();
        f.switcher.select_next().unwrap();
        assert_eq!(f.switcher.current_index(), 1);

        f.switcher.select_previous().unwrap();
        assert_eq!(f.switcher.current_index(), 9);

        f.switcher.select_previous().unwrap();
        assert_eq!(f.switcher.current_index(), 8);
    }

    #[test]
    fn random_never_repeats_previous_index() {
        let mut f = fixture(Options::default().auto_rotate(false));
        let mut seen = std::collections::BTreeSet::new();

        for _ in 0..500 {
            let before = f.switcher.current_index();
            f.switcher.select_random().unwrap();
            let after = f.switcher.current_index();
            assert_ne!(before, after);
            assert!((1..=BACKGROUND_COUNT).contains(&after));
            seen.insert(after);
        }

        assert_eq!(seen.len(), BACKGROUND_COUNT);
    }

    #[test]
    fn rotates_once_per_interval_until_stopped() {
        let mut f = fixture(Options::default());
        let interval = Duration::from_millis(10_000);

        let mut previous = f.switcher.current_index();
        for _ in 0..5 {
            assert_eq!(f.clock.advance(&mut f.switcher, interval), 1);
            assert_ne!(f.switcher.current_index(), previous);
            previous = f.switcher.current_index();
        }
        assert_eq!(
            f.clock
                .advance(&mut f.switcher, Duration::from_millis(9_999)),
            0
        );

        f.switcher.stop_auto_rotate();
        let applied = f.sink.borrow().applied();
        assert_eq!(
            f.clock
                .advance(&mut f.switcher, Duration::from_secs(3_600)),
            0
        );
        assert_eq!(f.switcher.current_index(), previous);
        assert_eq!(f.sink.borrow().applied(), applied);
        assert!(!f.switcher.is_rotating());
    }

    #[test]
    fn start_is_idempotent() {
        let mut f = fixture(Options::default());
        f.switcher.start_auto_rotate().unwrap();
        f.switcher.start_auto_rotate().unwrap();

        assert_eq!(f.clock.active_tasks(), 1);
        assert_eq!(
            f.clock
                .advance(&mut f.switcher, Duration::from_millis(10_000)),
            1
        );
    }

    #[test]
    fn start_respects_disabled_rotation() {
        let mut f = fixture(Options::default().auto_rotate(false));
        f.switcher.start_auto_rotate().unwrap();
        assert!(!f.switcher.is_rotating());
        assert_eq!(f.clock.active_tasks(), 0);
    }

    #[test]
    fn new_interval_applies_immediately() {
        let mut f = fixture(Options::default());
        f.clock.advance(&mut f.switcher, Duration::from_millis(7_000));

        f.switcher.set_auto_rotate_interval(5_000).unwrap();

        assert_eq!(f.clock.active_tasks(), 1);
        assert_eq!(
            f.clock
                .advance(&mut f.switcher, Duration::from_millis(4_999)),
            0
        );
        assert_eq!(
            f.clock.advance(&mut f.switcher, Duration::from_millis(1)),
            1
        );
        assert_eq!(
            f.clock
                .advance(&mut f.switcher, Duration::from_millis(20_000)),
            4
        );
    }

    #[test]
    fn interval_change_while_stopped_does_not_start() {
        let mut f = fixture(Options::default());
        f.switcher.stop_auto_rotate();

        f.switcher.set_auto_rotate_interval(5_000).unwrap();

        assert!(!f.switcher.is_rotating());
        assert_eq!(f.switcher.config().auto_rotate_interval, 5_000);

        f.switcher.start_auto_rotate().unwrap();
        assert_eq!(
            f.clock
                .advance(&mut f.switcher, Duration::from_millis(5_000)),
            1
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut f = fixture(Options::default());
        assert!(matches!(
            f.switcher.set_auto_rotate_interval(0),
            Err(SwitcherError::InvalidInterval)
        ));
        assert_eq!(f.switcher.config().auto_rotate_interval, 10_000);
        assert!(f.switcher.is_rotating());
    }

    #[test]
    fn stale_ticks_are_ignored() {
        let mut f = fixture(Options::default());
        let applied = f.sink.borrow().applied();

        f.switcher.on_rotation_tick(RotationToken(999));

        assert_eq!(f.switcher.current_index(), DEFAULT_INDEX);
        assert_eq!(f.sink.borrow().applied(), applied);
    }

    #[test]
    fn click_selects_without_rotation_when_disabled() {
        let mut f = fixture(
            Options::default()
                .auto_rotate(false)
                .enable_thumbs(true),
        );
        assert_eq!(f.switcher.current_index(), 4);

        f.switcher.on_thumb_click(2).unwrap();

        assert_eq!(f.switcher.current_index(), 2);
        assert_eq!(f.sink.borrow().selected_thumbs(), vec![2]);
        assert_eq!(f.sink.borrow().checked_thumbs(), vec![2]);
        assert!(!f.switcher.is_rotating());
        assert_eq!(f.clock.active_tasks(), 0);
    }

    #[test]
    fn click_resets_rotation_clock() {
        let mut f = fixture(Options::default());
        f.clock.advance(&mut f.switcher, Duration::from_millis(8_000));

        f.switcher.on_thumb_click(7).unwrap();
        assert_eq!(f.switcher.current_index(), 7);

        assert_eq!(
            f.clock
                .advance(&mut f.switcher, Duration::from_millis(9_000)),
            0
        );
        assert_eq!(f.switcher.current_index(), 7);
        assert_eq!(
            f.clock
                .advance(&mut f.switcher, Duration::from_millis(1_000)),
            1
        );
        assert_ne!(f.switcher.current_index(), 7);
    }

    #[test]
    fn clicks_wait_for_attach() {
        let mut f = fixture_with_sink(
            Options::default().auto_rotate(false),
            MemorySink::new().detached(),
        );
        assert!(!f.switcher.is_bound());

        f.switcher.on_thumb_click(2).unwrap();
        assert_eq!(f.switcher.current_index(), 4);

        f.sink.borrow_mut().set_attached(true);
        f.switcher.attach().unwrap();
        f.switcher.attach().unwrap();
        f.switcher.on_thumb_click(2).unwrap();

        assert!(f.switcher.is_bound());
        assert_eq!(f.switcher.current_index(), 2);
        assert_eq!(f.sink.borrow().selected_thumbs(), vec![2]);
    }

    #[test]
    fn invalid_click_is_reported() {
        let mut f = fixture(Options::default().auto_rotate(false));
        assert!(matches!(
            f.switcher.on_thumb_click(12),
            Err(SwitcherError::Range { index: 12 })
        ));
        assert_eq!(f.switcher.current_index(), 4);
    }

    #[test]
    fn thumb_visibility_toggles_and_sets() {
        let mut f = fixture(Options::default().auto_rotate(false));
        assert_eq!(f.switcher.thumbs_visible(), Some(true));

        f.switcher.set_thumb_visibility(None).unwrap();
        assert_eq!(f.switcher.thumbs_visible(), Some(false));
        assert_eq!(f.sink.borrow().thumbs_display(), Some("none"));

        f.switcher.set_thumb_visibility(None).unwrap();
        assert_eq!(f.sink.borrow().thumbs_display(), Some("flex"));

        f.switcher.set_thumb_visibility(Some(true)).unwrap();
        assert_eq!(f.switcher.thumbs_visible(), Some(true));
        assert_eq!(f.sink.borrow().thumbs_display(), Some("flex"));
    }

    #[test]
    fn without_thumbs_visibility_is_a_no_op() {
        let mut f = fixture(Options::default().enable_thumbs(false).auto_rotate(false));
        let applied = f.sink.borrow().applied();

        f.switcher.set_thumb_visibility(None).unwrap();
        f.switcher.on_thumb_click(3).unwrap();

        assert_eq!(f.switcher.thumbs_visible(), None);
        assert_eq!(f.sink.borrow().applied(), applied);
        assert_eq!(f.switcher.current_index(), 4);
    }

    #[test]
    fn custom_backgrounds_are_unsupported() {
        let mut f = fixture(Options::default().auto_rotate(false));
        assert!(matches!(
            f.switcher.add_custom_background("thumb.jpg", "full.jpg"),
            Err(SwitcherError::Unsupported(_))
        ));
    }

    #[test]
    fn destroy_removes_markup_and_timer() {
        let f = fixture(Options::default());
        let Fixture {
            sink,
            clock,
            switcher,
        } = f;

        switcher.destroy();

        assert!(sink.borrow().plugin(&Container::default()).is_none());
        assert!(
            sink.borrow()
                .children(&Container::default())
                .iter()
                .all(|c| !c.has_class(PLUGIN_CLASS))
        );
        assert_eq!(clock.active_tasks(), 0);
    }

    #[test]
    fn drop_tears_down() {
        let Fixture { sink, clock, switcher } = fixture(Options::default());
        drop(switcher);

        assert!(sink.borrow().plugin(&Container::default()).is_none());
        assert_eq!(clock.active_tasks(), 0);
    }

    #[test]
    fn diagnostics_read_custom_property() {
        let sheet = crate::stylesheet::Stylesheet::parse(".bg-4 { --bg: url(img/4.jpg) }");
        let f = fixture_with_sink(
            Options::default().auto_rotate(false),
            MemorySink::new().with_stylesheet(&sheet),
        );
        assert_eq!(
            f.switcher.sink().computed_variable("--bg").as_deref(),
            Some("url(img/4.jpg)")
        );
    }
}
