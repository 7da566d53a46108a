use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::score::{PASS_THRESHOLD, Score};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown tracking mode: {0}")]
pub struct TrackingModeError(String);

/// Policy deciding whether an outcome marks the session complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    #[default]
    None,
    Manual,
    View,
    /// Any accepted outcome completes.
    Complete,
    /// Completes when `scaled >= 0.5`.
    #[serde(alias = "completePass")]
    CompletePass,
    /// Completes only when `scaled == 1.0`.
    #[serde(alias = "completeFull")]
    CompleteFull,
}

impl TrackingMode {
    /// Whether the watcher reacts to outcome events at all.
    ///
    /// `none`, `manual` and `view` are driven by other triggers.
    #[must_use]
    pub fn evaluates_outcomes(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::CompletePass | Self::CompleteFull
        )
    }

    /// Whether the widget's in-progress state is persisted for resuming.
    #[must_use]
    pub fn saves_state(self) -> bool {
        self.evaluates_outcomes()
    }

    /// Whether an accepted outcome with the given score completes the session.
    #[must_use]
    pub fn is_satisfied_by(self, score: Option<&Score>) -> bool {
        match self {
            Self::Complete => true,
            Self::CompletePass => score.is_some_and(|s| s.scaled() >= PASS_THRESHOLD),
            #[allow(clippy::float_cmp)]
            Self::CompleteFull => score.is_some_and(|s| s.scaled() == 1.0),
            Self::None | Self::Manual | Self::View => false,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Manual => "manual",
            Self::View => "view",
            Self::Complete => "complete",
            Self::CompletePass => "completepass",
            Self::CompleteFull => "completefull",
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackingMode {
    type Err = TrackingModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "manual" => Ok(Self::Manual),
            "view" => Ok(Self::View),
            "complete" => Ok(Self::Complete),
            "completepass" => Ok(Self::CompletePass),
            "completefull" => Ok(Self::CompleteFull),
            _ => Err(TrackingModeError(s.to_owned())),
        }
    }
}
