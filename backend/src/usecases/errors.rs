use thiserror::Error;

/// Failure taxonomy shared by every use case. Quota exhaustion is not in
/// here on purpose: running out of scans is an `allowed: false` result,
/// never an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("webhook signature verification failed")]
    SignatureInvalid,
    #[error("external lookup failed: {0}")]
    ExternalLookupFailed(String),
    #[error("concurrent modification, retry the request")]
    Concurrency,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidPlan(_) | EngineError::SignatureInvalid => StatusCode::BAD_REQUEST,
            EngineError::ExternalLookupFailed(_) => StatusCode::BAD_GATEWAY,
            EngineError::Concurrency => StatusCode::CONFLICT,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, EngineError>;

/// True when the underlying database error is a tripped uniqueness
/// constraint, i.e. this caller lost a race it can retry.
pub(crate) fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<diesel::result::Error>(),
        Some(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ))
    )
}
