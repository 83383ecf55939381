use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid response from processor: {0}")]
    ResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Refund rejected. Error {status}. {message}")]
    RefundRejected { status: u16, message: String },
}
