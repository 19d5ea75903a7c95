use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use tracing::{info, warn};

use super::domain::{ApplicationId, ApplicationStatus, EvaluationRecord, TenderApplication};
use super::error::{ConflictReason, ProcurementError};
use super::repository::ApplicationRepository;
use super::validation;

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 100;

/// How re-evaluation treats a status that moves backward in the lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Backward transitions are stored and logged.
    #[default]
    Permissive,
    /// Backward transitions are rejected as conflicts.
    Monotonic,
}

impl StatusPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "permissive" => Some(Self::Permissive),
            "monotonic" => Some(Self::Monotonic),
            _ => None,
        }
    }
}

/// Evaluation payload as posted by an officer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationRequest {
    pub submission_id: Option<String>,
    pub score: Option<Number>,
    pub status: Option<String>,
    pub comments: Option<String>,
    pub evaluated_at: Option<String>,
}

struct ValidatedEvaluation {
    application_id: ApplicationId,
    score: u8,
    status: ApplicationStatus,
    comments: String,
    evaluated_at: Option<DateTime<Utc>>,
}

impl EvaluationRequest {
    fn validate(self) -> Result<ValidatedEvaluation, ProcurementError> {
        let application_id = ApplicationId(validation::required("submissionId", self.submission_id)?);

        let raw_score = self
            .score
            .ok_or_else(|| ProcurementError::validation("score is required"))?;
        let score = integer_score(&raw_score).ok_or_else(|| {
            ProcurementError::validation(format!("score must be an integer, got {raw_score}"))
        })?;
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(ProcurementError::validation(format!(
                "score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
            )));
        }

        let raw_status = validation::required("status", self.status)?;
        let status = ApplicationStatus::parse(&raw_status).ok_or_else(|| {
            ProcurementError::validation(format!("unknown status '{raw_status}'"))
        })?;

        let evaluated_at = validation::optional(self.evaluated_at)
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .map_err(|err| {
                        ProcurementError::validation(format!(
                            "evaluatedAt '{raw}' is not an RFC 3339 timestamp ({err})"
                        ))
                    })
            })
            .transpose()?;

        Ok(ValidatedEvaluation {
            application_id,
            score: score as u8,
            status,
            comments: self.comments.unwrap_or_default().trim().to_string(),
            evaluated_at,
        })
    }
}

/// Whole-number scores only; `85.0` is accepted, `85.5` is not.
fn integer_score(raw: &Number) -> Option<i64> {
    if let Some(value) = raw.as_i64() {
        return Some(value);
    }
    raw.as_f64()
        .filter(|value| value.is_finite() && value.fract() == 0.0)
        .filter(|value| value.abs() < i64::MAX as f64)
        .map(|value| value as i64)
}

/// Projection returned by evaluation endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationView {
    pub application_id: ApplicationId,
    pub score: Option<u8>,
    pub status: ApplicationStatus,
    pub evaluation: Option<EvaluationRecord>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&TenderApplication> for EvaluationView {
    fn from(application: &TenderApplication) -> Self {
        Self {
            application_id: application.id.clone(),
            score: application.score,
            status: application.status,
            evaluation: application.evaluation.clone(),
            last_updated: application.last_updated,
            created_at: application.created_at,
        }
    }
}

/// Records officer verdicts on applications.
pub struct EvaluationService {
    applications: Arc<dyn ApplicationRepository>,
    policy: StatusPolicy,
}

impl EvaluationService {
    pub fn new(applications: Arc<dyn ApplicationRepository>, policy: StatusPolicy) -> Self {
        Self {
            applications,
            policy,
        }
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    pub fn evaluate(
        &self,
        request: EvaluationRequest,
        evaluated_by: &str,
    ) -> Result<EvaluationView, ProcurementError> {
        self.evaluate_at(request, evaluated_by, Utc::now())
    }

    /// Overwrite score, status and evaluation details. Fields are validated before the
    /// application is looked up.
    pub fn evaluate_at(
        &self,
        request: EvaluationRequest,
        evaluated_by: &str,
        now: DateTime<Utc>,
    ) -> Result<EvaluationView, ProcurementError> {
        let ValidatedEvaluation {
            application_id,
            score,
            status,
            comments,
            evaluated_at,
        } = request.validate()?;
        let policy = self.policy;

        let (previous, application) = self.applications.modify_with(&application_id, |application| {
            let previous = application.status;
            if policy == StatusPolicy::Monotonic && previous.regresses_to(status) {
                return Err(ConflictReason::StatusRegression {
                    from: previous,
                    to: status,
                }
                .into());
            }

            application.score = Some(score);
            application.status = status;
            application.evaluation = Some(EvaluationRecord {
                comments,
                evaluated_by: evaluated_by.to_string(),
                evaluated_at: evaluated_at.unwrap_or(now),
            });
            application.last_updated = now;
            Ok(previous)
        })?;

        if previous.regresses_to(status) {
            warn!(
                application_id = %application_id.0,
                from = previous.label(),
                to = status.label(),
                "evaluation moved application status backward"
            );
        }

        info!(
            application_id = %application.id.0,
            score,
            status = status.label(),
            evaluated_by,
            "evaluation recorded"
        );
        Ok(EvaluationView::from(&application))
    }

    pub fn get_evaluation(
        &self,
        application_id: &ApplicationId,
    ) -> Result<EvaluationView, ProcurementError> {
        self.applications
            .fetch(application_id)?
            .map(|application| EvaluationView::from(&application))
            .ok_or_else(|| ProcurementError::not_found("application", application_id.0.clone()))
    }
}
