use crate::model::branch::{Navigation, RichText};
use crate::model::outcome::OutcomeEvent;
use crate::model::score::BranchOutcome;
use crate::model::session::Session;

/// Branch side effects selected for one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchReaction {
    pub outcome: BranchOutcome,
    /// Forced seek or a manual choice, never both.
    pub navigation: Option<Navigation>,
    /// Independent of `navigation`.
    pub text: Option<RichText>,
}

impl BranchReaction {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.navigation.is_none() && self.text.is_none()
    }
}

/// What the watcher should do in response to an accepted outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reaction {
    pub completes: bool,
    pub branch: Option<BranchReaction>,
}

impl Reaction {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.completes && self.branch.is_none()
    }
}

/// Decide the reaction to an accepted outcome.
///
/// `completed` is true once the session has completed, either before attach or from an
/// earlier event; a completed session reacts to nothing.
#[must_use]
pub fn plan_reaction(session: &Session, completed: bool, event: &OutcomeEvent) -> Reaction {
    let mode = session.tracking_mode();
    if completed || !mode.evaluates_outcomes() {
        return Reaction::none();
    }

    let completes = mode.is_satisfied_by(event.score());

    let branch = match (session.branch_rules(), event.score()) {
        (Some(rules), Some(score)) => {
            let outcome = score.branch_outcome();
            let action = rules.for_outcome(outcome);
            let reaction = BranchReaction {
                outcome,
                navigation: action.navigation(),
                text: action.display_text().cloned(),
            };
            (!reaction.is_empty()).then_some(reaction)
        }
        _ => None,
    };

    Reaction { completes, branch }
}
