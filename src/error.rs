use crate::api::{ErrorCategory, ErrorResponse, MarketId, PredictionId};
use crate::validation::ValidationError;
use axum::http::StatusCode;
use axum::Json;
use log::{debug, error};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("verification rejected: {0}")]
    InvalidVerification(String),
    #[error("an active market already exists for prediction {0}")]
    DuplicateMarket(PredictionId),
    #[error("prediction {0} was already recorded")]
    DuplicatePrediction(PredictionId),
    #[error("market {0} is closed for betting")]
    MarketClosed(MarketId),
    #[error("market {0} is already closed")]
    AlreadyClosed(MarketId),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{collaborator} did not answer within {timeout:?}")]
    UpstreamTimeout {
        collaborator: &'static str,
        timeout: Duration,
    },
    #[error("{collaborator} failed: {source:#}")]
    Upstream {
        collaborator: &'static str,
        source: anyhow::Error,
    },
    #[error("invariant violated on market {market}: {detail}")]
    InvariantViolation { market: MarketId, detail: String },
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}
impl MarketError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::InvalidVerification(_) => ErrorCategory::Validation,
            Self::DuplicateMarket(_)
            | Self::DuplicatePrediction(_)
            | Self::MarketClosed(_)
            | Self::AlreadyClosed(_) => ErrorCategory::Conflict,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::UpstreamTimeout { .. } => ErrorCategory::UpstreamTimeout,
            Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::InvariantViolation { .. } => ErrorCategory::InvariantViolation,
            Self::Storage(_) => ErrorCategory::Internal,
        }
    }
    /// Stable name clients can match on.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.kind(),
            Self::InvalidVerification(_) => "InvalidVerification",
            Self::DuplicateMarket(_) => "DuplicateMarket",
            Self::DuplicatePrediction(_) => "DuplicatePrediction",
            Self::MarketClosed(_) => "MarketClosed",
            Self::AlreadyClosed(_) => "AlreadyClosed",
            Self::NotFound { .. } => "NotFound",
            Self::UpstreamTimeout { .. } => "UpstreamTimeout",
            Self::Upstream { .. } => "UpstreamFailure",
            Self::InvariantViolation { .. } => "InvariantViolation",
            Self::Storage(_) => "StorageFailure",
        }
    }
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. } | Self::Upstream { .. })
    }
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidVerification(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => match self.category() {
                ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                ErrorCategory::Conflict => StatusCode::CONFLICT,
                ErrorCategory::NotFound => StatusCode::NOT_FOUND,
                ErrorCategory::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorCategory::Upstream => StatusCode::BAD_GATEWAY,
                ErrorCategory::InvariantViolation | ErrorCategory::Internal => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            category: self.category(),
            kind: self.kind().to_string(),
            reason: self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

pub fn map_market_err(e: MarketError) -> (StatusCode, Json<ErrorResponse>) {
    match e.category() {
        ErrorCategory::InvariantViolation | ErrorCategory::Internal => error!("Error: {:#}", e),
        _ => debug!("Error: {:#}", e),
    }
    (e.status_code(), Json(e.to_response()))
}

#[cfg(test)]
mod test {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn every_rejection_has_a_kind_and_reason() {
        let market = Uuid::new_v4();
        let e = MarketError::AlreadyClosed(market);
        let response = e.to_response();
        assert_eq!(response.category, ErrorCategory::Conflict);
        assert_eq!(response.kind, "AlreadyClosed");
        assert!(response.reason.contains(&market.to_string()));
        assert_eq!(e.status_code(), StatusCode::CONFLICT);
        assert!(!e.is_retryable());
    }
    #[test]
    fn validation_errors_keep_their_own_kind() {
        let e: MarketError = crate::validation::validate_amount("0.999").unwrap_err().into();
        assert_eq!(e.kind(), "TooManyDecimals");
        assert_eq!(e.category(), ErrorCategory::Validation);
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
    }
    #[test]
    fn timeouts_are_retryable() {
        let e = MarketError::UpstreamTimeout {
            collaborator: "verification oracle",
            timeout: Duration::from_millis(50),
        };
        assert!(e.is_retryable());
        assert_eq!(e.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            MarketError::InvalidVerification("confidence".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
