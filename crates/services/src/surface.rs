//! Structured content the watcher shows inside a session's container.

use watch_core::model::BranchOutcome;

/// Edit-mode status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Widget is ready and the watcher is listening.
    Checking,
    /// A relevant outcome statement was seen.
    EventDetected,
}

/// Label of the follow-up control offered after a non-forced branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKind {
    Continue,
    Rewatch,
}

impl From<BranchOutcome> for ChoiceKind {
    fn from(outcome: BranchOutcome) -> Self {
        match outcome {
            BranchOutcome::Pass => Self::Continue,
            BranchOutcome::Fail => Self::Rewatch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchChoice {
    pub kind: ChoiceKind,
    pub target_ms: u64,
}

/// The learner's answer to a `BranchChoice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchDecision {
    /// Seek to the target and resume playback.
    Continue,
    Dismiss,
}

/// Snapshot of everything the watcher renders for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentArea {
    indicator: Option<Indicator>,
    branch_text: Option<String>,
    choice: Option<BranchChoice>,
}

impl ContentArea {
    #[must_use]
    pub fn indicator(&self) -> Option<Indicator> {
        self.indicator
    }

    /// Rendered branch text. At most one block exists at a time.
    #[must_use]
    pub fn branch_text(&self) -> Option<&str> {
        self.branch_text.as_deref()
    }

    #[must_use]
    pub fn choice(&self) -> Option<BranchChoice> {
        self.choice
    }

    /// The widget must not take pointer input while a choice is pending.
    #[must_use]
    pub fn interaction_locked(&self) -> bool {
        self.choice.is_some()
    }

    pub fn set_indicator(&mut self, indicator: Indicator) {
        self.indicator = Some(indicator);
    }

    /// Replace any previous branch text.
    pub fn replace_branch_text(&mut self, html: String) {
        self.branch_text = Some(html);
    }

    /// Replace any pending choice.
    pub fn offer_choice(&mut self, choice: BranchChoice) {
        self.choice = Some(choice);
    }

    pub fn take_choice(&mut self) -> Option<BranchChoice> {
        self.choice.take()
    }
}
