// SPDX-License-Identifier: MPL-2.0

pub mod error;
pub mod markup;
pub mod rotation;
pub mod sink;
pub mod slot;
pub mod stylesheet;
pub mod switcher;
pub mod timer_source;

pub use bg_switcher_config::{BACKGROUND_COUNT, Config, Container, DEFAULT_INDEX, Options};
pub use error::SwitcherError;
pub use rotation::{ManualClock, RotationHost, RotationScheduler, RotationToken};
pub use sink::{Display, MemorySink, PresentationChange, PresentationSink, SinkError};
pub use slot::SwitcherSlot;
pub use stylesheet::Stylesheet;
pub use switcher::BackgroundSwitcher;
pub use timer_source::CalloopScheduler;
