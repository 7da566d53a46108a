use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::score::{Score, ScoreError};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum StatementError {
    #[error("statement is not a JSON object")]
    NotAnObject,

    #[error("statement score is missing `scaled` and cannot derive it from raw/max")]
    MissingScaled,

    #[error(transparent)]
    Score(#[from] ScoreError),
}

//
// ─── VERB ─────────────────────────────────────────────────────────────────────
//

pub const VERB_COMPLETED: &str = "http://adlnet.gov/expapi/verbs/completed";
pub const VERB_ANSWERED: &str = "http://adlnet.gov/expapi/verbs/answered";

/// Marker the widget puts in the object id of statements emitted by nested content.
const SUB_CONTENT_MARKER: &str = "subContentId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verb {
    Completed,
    Answered,
    Other,
}

impl Verb {
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        match id {
            VERB_COMPLETED | "completed" => Self::Completed,
            VERB_ANSWERED | "answered" => Self::Answered,
            _ => Self::Other,
        }
    }

    /// Only completion-like verbs can carry the session outcome.
    #[must_use]
    pub fn is_relevant(self) -> bool {
        matches!(self, Self::Completed | Self::Answered)
    }
}

//
// ─── OUTCOME EVENT ────────────────────────────────────────────────────────────
//

/// One statement reported by the embedded widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeEvent {
    verb: Verb,
    is_sub_content: bool,
    has_parent_context: bool,
    score: Option<Score>,
    raw_payload: Value,
}

impl OutcomeEvent {
    /// Build an event from explicit parts; mostly useful for hosts that decode statements
    /// themselves.
    #[must_use]
    pub fn new(
        verb: Verb,
        is_sub_content: bool,
        has_parent_context: bool,
        score: Option<Score>,
        raw_payload: Value,
    ) -> Self {
        Self {
            verb,
            is_sub_content,
            has_parent_context,
            score,
            raw_payload,
        }
    }

    /// Decode an xAPI statement.
    ///
    /// # Errors
    ///
    /// Returns `StatementError` if the statement is not an object or carries an invalid score.
    pub fn from_statement(statement: &Value) -> Result<Self, StatementError> {
        let obj = statement.as_object().ok_or(StatementError::NotAnObject)?;

        let verb = obj
            .get("verb")
            .and_then(|v| v.get("id"))
            .and_then(Value::as_str)
            .map_or(Verb::Other, Verb::from_id);

        let is_sub_content = obj
            .get("object")
            .and_then(|o| o.get("id"))
            .and_then(Value::as_str)
            .is_some_and(|id| id.contains(SUB_CONTENT_MARKER));

        let has_parent_context = obj
            .get("context")
            .and_then(|c| c.get("contextActivities"))
            .and_then(|a| a.get("parent"))
            .is_some_and(|p| match p {
                Value::Array(items) => !items.is_empty(),
                Value::Null => false,
                _ => true,
            });

        let score = obj
            .get("result")
            .and_then(|r| r.get("score"))
            .map(decode_score)
            .transpose()?;

        Ok(Self {
            verb,
            is_sub_content,
            has_parent_context,
            score,
            raw_payload: statement.clone(),
        })
    }

    #[must_use]
    pub fn verb(&self) -> Verb {
        self.verb
    }

    #[must_use]
    pub fn is_sub_content(&self) -> bool {
        self.is_sub_content
    }

    #[must_use]
    pub fn has_parent_context(&self) -> bool {
        self.has_parent_context
    }

    #[must_use]
    pub fn score(&self) -> Option<&Score> {
        self.score.as_ref()
    }

    #[must_use]
    pub fn raw_payload(&self) -> &Value {
        &self.raw_payload
    }

    /// True when this event may carry the top-level outcome.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.verb.is_relevant() && !self.is_sub_content && !self.has_parent_context
    }
}

fn decode_score(score: &Value) -> Result<Score, StatementError> {
    let field = |name: &str| score.get(name).and_then(Value::as_f64);
    let raw = field("raw");
    let max = field("max");
    let scaled = match (field("scaled"), raw, max) {
        (Some(scaled), _, _) => scaled,
        (None, Some(raw), Some(max)) if max > 0.0 => raw / max,
        _ => return Err(StatementError::MissingScaled),
    };
    let max = max.unwrap_or(1.0);
    let raw = raw.unwrap_or(scaled * max);
    Ok(Score::new(raw, max, scaled)?)
}

/// Decide whether a raw statement is a top-level outcome.
///
/// Returns `None` for irrelevant verbs, nested sub-content, parent roll-ups and statements
/// that cannot be decoded.
#[must_use]
pub fn classify(statement: &Value) -> Option<OutcomeEvent> {
    let event = OutcomeEvent::from_statement(statement).ok()?;
    event.is_accepted().then_some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn statement(verb: &str, object_id: &str, scaled: f64) -> Value {
        json!({
            "verb": { "id": verb },
            "object": { "id": object_id },
            "result": { "score": { "raw": scaled * 4.0, "max": 4.0, "scaled": scaled } }
        })
    }

    #[test]
    fn accepts_top_level_completed() {
        let event = classify(&statement(VERB_COMPLETED, "https://lms/h5p/1", 0.75)).unwrap();
        assert_eq!(event.verb(), Verb::Completed);
        assert_eq!(event.score().unwrap().raw(), 3.0);
    }

    #[test]
    fn ignores_other_verbs() {
        let stmt = statement("http://adlnet.gov/expapi/verbs/interacted", "https://lms/h5p/1", 1.0);
        assert!(classify(&stmt).is_none());
    }

    #[test]
    fn ignores_sub_content_regardless_of_score() {
        let stmt = statement(
            VERB_ANSWERED,
            "https://lms/h5p/1?subContentId=8f2c",
            1.0,
        );
        assert!(classify(&stmt).is_none());
        let event = OutcomeEvent::from_statement(&stmt).unwrap();
        assert!(event.is_sub_content());
    }

    #[test]
    fn ignores_parent_rollups() {
        let mut stmt = statement(VERB_COMPLETED, "https://lms/h5p/1", 1.0);
        stmt["context"] = json!({ "contextActivities": { "parent": [{ "id": "https://lms/h5p/0" }] } });
        assert!(classify(&stmt).is_none());
    }

    #[test]
    fn empty_parent_list_is_not_a_rollup() {
        let mut stmt = statement(VERB_COMPLETED, "https://lms/h5p/1", 1.0);
        stmt["context"] = json!({ "contextActivities": { "parent": [] } });
        assert!(classify(&stmt).is_some());
    }

    #[test]
    fn derives_scaled_from_raw_and_max() {
        let stmt = json!({
            "verb": { "id": VERB_ANSWERED },
            "object": { "id": "x" },
            "result": { "score": { "raw": 2, "max": 8 } }
        });
        let event = classify(&stmt).unwrap();
        assert_eq!(event.score().unwrap().scaled(), 0.25);
    }

    #[test]
    fn statement_without_result_has_no_score() {
        let stmt = json!({ "verb": { "id": VERB_COMPLETED }, "object": { "id": "x" } });
        let event = classify(&stmt).unwrap();
        assert!(event.score().is_none());
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let stmt = statement(VERB_COMPLETED, "x", 1.4);
        assert!(matches!(
            OutcomeEvent::from_statement(&stmt),
            Err(StatementError::Score(ScoreError::ScaledOutOfRange(_)))
        ));
        assert!(classify(&stmt).is_none());
    }
}
