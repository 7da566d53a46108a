//! Completion reporting.

use async_trait::async_trait;
use serde::Serialize;

use watch_core::model::{CompletionResult, ScoreTier, SessionId};
use watch_core::time::format_duration;

use crate::error::SinkError;

/// Receives the single completion of a session.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    /// # Errors
    ///
    /// Returns `SinkError` if the host could not record the completion.
    async fn report_completion(
        &self,
        session: SessionId,
        result: &CompletionResult,
    ) -> Result<(), SinkError>;
}

/// Marker shown next to a completion in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportMarker {
    Failed,
    Passed,
    Perfect,
}

impl From<ScoreTier> for ReportMarker {
    fn from(tier: ScoreTier) -> Self {
        match tier {
            ScoreTier::Fail => Self::Failed,
            ScoreTier::PartialPass => Self::Passed,
            ScoreTier::FullPass => Self::Perfect,
        }
    }
}

/// Display-ready view of a `CompletionResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub completed_at: String,
    pub duration: String,
    pub score: Option<String>,
    pub points: String,
    pub marker: Option<ReportMarker>,
}

impl CompletionReport {
    #[must_use]
    pub fn from_result(result: &CompletionResult) -> Self {
        let completed_at = result
            .completed_at()
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();
        let score = result
            .score_summary()
            .map(|s| format!("{}/{}", s.raw, s.max));
        Self {
            completed_at,
            duration: format_duration(result.duration_ms()),
            score,
            points: format!("{:.2}", result.final_score()),
            marker: result.tier().map(ReportMarker::from),
        }
    }
}
