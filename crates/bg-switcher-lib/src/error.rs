// SPDX-License-Identifier: MPL-2.0

use bg_switcher_config::BACKGROUND_COUNT;

use crate::sink::SinkError;

#[derive(Debug, thiserror::Error)]
pub enum SwitcherError {
    #[error("background index {index} is outside 1..={}", BACKGROUND_COUNT)]
    Range { index: usize },
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("auto-rotate interval must be positive")]
    InvalidInterval,
    #[error("failed to schedule rotation: {0}")]
    Schedule(String),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}
