use axum::http::StatusCode;

use super::documents::DocumentStoreError;
use super::domain::ApplicationStatus;
use super::repository::RepositoryError;

/// Business rule that rejected an otherwise well-formed request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictReason {
    #[error("tender closed")]
    TenderClosed,
    #[error("deadline passed")]
    DeadlinePassed,
    #[error("duplicate application")]
    DuplicateApplication,
    #[error("status cannot move from {from} to {to}")]
    StatusRegression {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

/// Error taxonomy shared by intake, evaluation, documents and notifications.
#[derive(Debug, thiserror::Error)]
pub enum ProcurementError {
    #[error("{0}")]
    Validation(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Conflict(ConflictReason),
    #[error("external service failure: {0}")]
    ExternalService(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcurementError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable discriminator for clients.
    pub const fn kind(&self) -> &'static str {
        match self {
            ProcurementError::Validation(_) => "validation_error",
            ProcurementError::NotFound { .. } => "not_found",
            ProcurementError::Conflict(_) => "conflict",
            ProcurementError::ExternalService(_) => "external_service_error",
            ProcurementError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProcurementError::Validation(_) => StatusCode::BAD_REQUEST,
            ProcurementError::NotFound { .. } => StatusCode::NOT_FOUND,
            // Closed tenders and passed deadlines are reported as bad requests by the portal.
            ProcurementError::Conflict(
                ConflictReason::TenderClosed | ConflictReason::DeadlinePassed,
            ) => StatusCode::BAD_REQUEST,
            ProcurementError::Conflict(_) => StatusCode::CONFLICT,
            ProcurementError::ExternalService(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProcurementError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ConflictReason> for ProcurementError {
    fn from(value: ConflictReason) -> Self {
        Self::Conflict(value)
    }
}

impl From<RepositoryError> for ProcurementError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::DuplicateApplication => {
                Self::Conflict(ConflictReason::DuplicateApplication)
            }
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            other @ (RepositoryError::DuplicateApplicationNumber(_)
            | RepositoryError::Unavailable(_)) => Self::Internal(other.to_string()),
        }
    }
}

impl From<DocumentStoreError> for ProcurementError {
    fn from(value: DocumentStoreError) -> Self {
        Self::ExternalService(value.to_string())
    }
}
