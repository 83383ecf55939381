use thiserror::Error;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::SqliteDatabaseError;
use crate::traits::RefundProcessorError;

/// The error taxonomy exposed by the engine APIs.
#[derive(Debug, Clone, Error)]
pub enum DispatchGatewayError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("External service error: {0}")]
    ExternalServiceError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(feature = "sqlite")]
impl From<SqliteDatabaseError> for DispatchGatewayError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::BookingNotFound(id) => Self::NotFound(format!("Booking {id} not found")),
            SqliteDatabaseError::PaymentNotFound(id) => Self::NotFound(format!("Payment #{id} not found")),
            SqliteDatabaseError::PayoutNotFound(id) => Self::NotFound(format!("Payout #{id} not found")),
            SqliteDatabaseError::PaymentAlreadyRefunded(id) => {
                Self::InvalidState(format!("Payment #{id} has already been refunded"))
            },
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<RefundProcessorError> for DispatchGatewayError {
    fn from(e: RefundProcessorError) -> Self {
        Self::ExternalServiceError(e.to_string())
    }
}
