use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::outcome::OutcomeEvent;
use crate::model::score::{Score, ScoreTier};
use crate::model::session::Session;

/// Raw points reported by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub raw: f64,
    pub max: f64,
}

impl From<&Score> for ScoreSummary {
    fn from(score: &Score) -> Self {
        Self {
            raw: score.raw(),
            max: score.max(),
        }
    }
}

/// Result of a completed session. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    final_score: f64,
    duration_ms: u64,
    completed_at_epoch_ms: i64,
    score_summary: Option<ScoreSummary>,
    tier: Option<ScoreTier>,
    history: Vec<OutcomeEvent>,
}

impl CompletionResult {
    /// Build the result for the event that completed `session`.
    ///
    /// `history` is every accepted event so far, including `event`.
    #[must_use]
    pub fn from_outcome(
        session: &Session,
        event: &OutcomeEvent,
        history: Vec<OutcomeEvent>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let score = event.score();
        let final_score = match score {
            Some(score) if session.partial_credit_enabled() => {
                round_points(session.max_points() * score.scaled())
            }
            _ => session.max_points(),
        };

        let elapsed = (completed_at - session.viewing_started_at())
            .num_milliseconds()
            .max(0);
        let elapsed = u64::try_from(elapsed).unwrap_or(0);

        Self {
            final_score,
            duration_ms: session.prior_duration_ms().saturating_add(elapsed),
            completed_at_epoch_ms: completed_at.timestamp_millis(),
            score_summary: score.map(ScoreSummary::from),
            tier: score.map(Score::tier),
            history,
        }
    }

    #[must_use]
    pub fn final_score(&self) -> f64 {
        self.final_score
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    #[must_use]
    pub fn completed_at_epoch_ms(&self) -> i64 {
        self.completed_at_epoch_ms
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.completed_at_epoch_ms)
    }

    #[must_use]
    pub fn score_summary(&self) -> Option<ScoreSummary> {
        self.score_summary
    }

    #[must_use]
    pub fn tier(&self) -> Option<ScoreTier> {
        self.tier
    }

    #[must_use]
    pub fn history(&self) -> &[OutcomeEvent] {
        &self.history
    }
}

/// Points are awarded with two decimals.
fn round_points(points: f64) -> f64 {
    (points * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::SessionId;
    use crate::model::outcome::Verb;
    use crate::model::session::SessionDraft;
    use crate::model::tracking::TrackingMode;
    use crate::time::fixed_now;
    use chrono::Duration;
    use serde_json::Value;

    fn event(scaled: f64) -> OutcomeEvent {
        let score = Score::new(scaled * 10.0, 10.0, scaled).unwrap();
        OutcomeEvent::new(Verb::Completed, false, false, Some(score), Value::Null)
    }

    fn session(partial: bool) -> Session {
        SessionDraft {
            partial_credit_enabled: partial,
            max_points: 10.0,
            prior_duration_ms: 4_000,
            viewing_started_at: Some(fixed_now()),
            ..SessionDraft::new(SessionId::new(1), TrackingMode::CompletePass)
        }
        .validate(fixed_now())
        .unwrap()
    }

    #[test]
    fn partial_credit_scales_points() {
        let ev = event(0.7);
        let result =
            CompletionResult::from_outcome(&session(true), &ev, vec![ev.clone()], fixed_now());
        assert_eq!(result.final_score(), 7.0);
        assert_eq!(result.tier(), Some(ScoreTier::PartialPass));
    }

    #[test]
    fn without_partial_credit_full_points_are_awarded() {
        let ev = event(0.3);
        let result = CompletionResult::from_outcome(&session(false), &ev, vec![], fixed_now());
        assert_eq!(result.final_score(), 10.0);
    }

    #[test]
    fn duration_adds_prior_and_elapsed() {
        let ev = event(1.0);
        let done = fixed_now() + Duration::seconds(30);
        let result = CompletionResult::from_outcome(&session(false), &ev, vec![ev.clone()], done);
        assert_eq!(result.duration_ms(), 34_000);
        assert_eq!(result.completed_at(), Some(done));
        assert_eq!(result.history().len(), 1);
        let summary = result.score_summary().unwrap();
        assert_eq!((summary.raw, summary.max), (10.0, 10.0));
    }

    #[test]
    fn clock_skew_never_yields_negative_duration() {
        let ev = event(1.0);
        let before = fixed_now() - Duration::seconds(5);
        let result = CompletionResult::from_outcome(&session(false), &ev, vec![], before);
        assert_eq!(result.duration_ms(), 4_000);
    }
}
