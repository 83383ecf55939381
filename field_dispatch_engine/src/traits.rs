//! The seams between the engine and the outside world.
//!
//! Storage backends implement the `*Management` traits, re-exported here from [`crate::db::traits`].
//! [`RefundProcessor`] is the outbound port to the external payment processor: the settlement API
//! calls it before touching the database, and the server crate supplies a concrete client.

use fdg_common::MoneyCents;
use thiserror::Error;

pub use crate::db::traits::{
    DispatchManagement,
    InsertPaymentResult,
    InsertPayoutResult,
    PaymentManagement,
    PayoutAdjustment,
    RefundOutcome,
    RefundUpdate,
    SettlementBatch,
    SettlementManagement,
};

#[derive(Debug, Clone, Error)]
pub enum RefundProcessorError {
    #[error("The payment processor rejected the refund: {0}")]
    RefundRejected(String),
    #[error("Could not reach the payment processor: {0}")]
    Unreachable(String),
}

/// A client capable of issuing refunds against the external card processor.
///
/// `refund` returns the processor's reference for the refund transaction on success. Implementations
/// must not retry internally on rejection; the settlement API treats any error as an abort signal
/// and leaves the local records untouched.
#[allow(async_fn_in_trait)]
pub trait RefundProcessor: Clone {
    async fn refund(&self, processor_ref: &str, amount: MoneyCents) -> Result<String, RefundProcessorError>;
}
