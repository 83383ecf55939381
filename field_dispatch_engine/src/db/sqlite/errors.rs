use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Could not encode column value: {0}")]
    EncodingError(String),
    #[error("Booking {0} not found")]
    BookingNotFound(String),
    #[error("Payment #{0} not found")]
    PaymentNotFound(i64),
    #[error("Payment #{0} has already been refunded")]
    PaymentAlreadyRefunded(i64),
    #[error("Payout #{0} not found")]
    PayoutNotFound(i64),
}

impl From<serde_json::Error> for SqliteDatabaseError {
    fn from(e: serde_json::Error) -> Self {
        Self::EncodingError(e.to_string())
    }
}
