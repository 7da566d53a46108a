use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("scaled score must be within [0, 1], got {0}")]
    ScaledOutOfRange(f64),

    #[error("score values must be finite")]
    NotFinite,
}

//
// ─── SCORE ────────────────────────────────────────────────────────────────────
//

/// Boundary below which an outcome counts as failed.
pub const PASS_THRESHOLD: f64 = 0.5;

/// Score reported with an outcome statement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    raw: f64,
    max: f64,
    scaled: f64,
}

impl Score {
    /// Create a validated score.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::NotFinite` for NaN or infinite inputs and
    /// `ScoreError::ScaledOutOfRange` when `scaled` is outside `[0, 1]`.
    pub fn new(raw: f64, max: f64, scaled: f64) -> Result<Self, ScoreError> {
        if !(raw.is_finite() && max.is_finite() && scaled.is_finite()) {
            return Err(ScoreError::NotFinite);
        }
        if !(0.0..=1.0).contains(&scaled) {
            return Err(ScoreError::ScaledOutOfRange(scaled));
        }
        Ok(Self { raw, max, scaled })
    }

    #[must_use]
    pub fn raw(&self) -> f64 {
        self.raw
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    #[must_use]
    pub fn scaled(&self) -> f64 {
        self.scaled
    }

    #[must_use]
    pub fn tier(&self) -> ScoreTier {
        ScoreTier::from_scaled(self.scaled)
    }

    /// Pass/fail split used for branching, independent of the tracking mode.
    #[must_use]
    pub fn branch_outcome(&self) -> BranchOutcome {
        if self.scaled < PASS_THRESHOLD {
            BranchOutcome::Fail
        } else {
            BranchOutcome::Pass
        }
    }
}

/// Qualitative grade of a scaled score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreTier {
    /// `scaled < 0.5`
    Fail,
    /// `0.5 <= scaled < 1.0`
    PartialPass,
    /// `scaled == 1.0`
    FullPass,
}

impl ScoreTier {
    #[must_use]
    pub fn from_scaled(scaled: f64) -> Self {
        if scaled < PASS_THRESHOLD {
            Self::Fail
        } else if scaled < 1.0 {
            Self::PartialPass
        } else {
            Self::FullPass
        }
    }
}

/// Which branch of the rules an outcome selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BranchOutcome {
    Pass,
    Fail,
}
