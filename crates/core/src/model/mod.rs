mod branch;
mod completion;
mod ids;
mod outcome;
mod reaction;
mod score;
mod session;
mod tracking;

pub use branch::{BranchAction, BranchRules, BranchRulesError, Navigation, RichText, TextFormat};
pub use completion::{CompletionResult, ScoreSummary};
pub use ids::{ContainerRef, ParseIdError, SessionId, UserId};
pub use outcome::{OutcomeEvent, StatementError, VERB_ANSWERED, VERB_COMPLETED, Verb, classify};
pub use reaction::{BranchReaction, Reaction, plan_reaction};
pub use score::{BranchOutcome, PASS_THRESHOLD, Score, ScoreError, ScoreTier};
pub use session::{BranchRulesInput, Session, SessionConfigError, SessionDraft};
pub use tracking::{TrackingMode, TrackingModeError};
