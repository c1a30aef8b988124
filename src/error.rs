use thiserror::Error;

/// Error vocabulary shared by the scheduling core and the storage adapter.
///
/// Validation and conflict errors are produced before any write is attempted;
/// storage failures are converted at the boundary and never leave the
/// in-memory snapshot partially updated.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::UnprocessableEntity(_) => "unprocessable_entity",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Dependency(_) => "dependency",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(AppError::Conflict("x".to_string()).kind(), "conflict");
        assert_eq!(AppError::Dependency("x".to_string()).kind(), "dependency");
    }

    #[test]
    fn display_is_the_message() {
        let error = AppError::BadRequest("Invalid ISO date.".to_string());
        assert_eq!(error.to_string(), "Invalid ISO date.");
    }
}
