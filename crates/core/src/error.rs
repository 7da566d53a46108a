use thiserror::Error;

use crate::model::{BranchRulesError, ScoreError, SessionConfigError, StatementError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    SessionConfig(#[from] SessionConfigError),
    #[error(transparent)]
    BranchRules(#[from] BranchRulesError),
    #[error(transparent)]
    Statement(#[from] StatementError),
    #[error(transparent)]
    Score(#[from] ScoreError),
}
