use fdg_common::MoneyCents;
use serde::{Deserialize, Serialize};

use crate::db_types::{Payment, ProviderPayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPaymentResult {
    Inserted(i64),
    AlreadyExists(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPayoutResult {
    Inserted(i64),
    AlreadyExists(i64),
}

/// The refund values written against a payment row inside the atomic refund transaction. The
/// amounts have already been validated by the settlement API.
#[derive(Debug, Clone)]
pub struct RefundUpdate {
    pub payment_id: i64,
    pub refund_amount: MoneyCents,
    pub refunded_by: String,
    pub reason: String,
}

/// What happened on the payout side of a refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PayoutAdjustment {
    /// The standard payout was still pending; its amount was reduced in place.
    AdjustedPending { payout_id: i64, previous_amount: MoneyCents, new_amount: MoneyCents },
    /// The standard payout was already paid out; a negative clawback record was created.
    ClawbackCreated(ProviderPayout),
    /// No standard payout existed for the booking.
    NoPayout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub payment: Payment,
    pub adjustment: PayoutAdjustment,
}

/// Result of one batch settlement run: the standard payouts marked paid, and the clawbacks for
/// the same providers settled in the same transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub payouts_settled: Vec<i64>,
    pub clawbacks_settled: Vec<i64>,
}
