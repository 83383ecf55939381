use serde::{Deserialize, Serialize};

/// The request body for a refund call.
#[derive(Debug, Clone, Serialize)]
pub struct RefundCall {
    /// The processor's reference for the original charge.
    pub charge: String,
    /// The amount to refund, in cents.
    pub amount: i64,
}

/// The processor's record of an accepted refund.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundReceipt {
    /// The processor's reference for the refund transaction.
    pub id: String,
    pub charge: String,
    pub amount: i64,
    pub status: String,
}
