use crate::{
    db::traits::{InsertPayoutResult, RefundOutcome, RefundUpdate, SettlementBatch},
    db_types::{BookingId, NewPayout, ProviderPayout},
};

/// Payout storage plus the two operations that must be transactional: refund application and
/// batch settlement.
#[allow(async_fn_in_trait)]
pub trait SettlementManagement: Clone {
    type Error: std::error::Error;

    /// The standard payout for the booking, if one has been created.
    async fn standard_payout_for_booking(&self, booking_id: &BookingId) -> Result<Option<ProviderPayout>, Self::Error>;

    /// Inserts a payout row. For standard payouts, the partial unique index on the booking id
    /// turns a duplicate insert into `AlreadyExists`.
    async fn insert_payout(&self, payout: NewPayout) -> Result<InsertPayoutResult, Self::Error>;

    async fn fetch_payout(&self, id: i64) -> Result<Option<ProviderPayout>, Self::Error>;

    async fn pending_clawbacks_for_provider(&self, provider_id: i64) -> Result<Vec<ProviderPayout>, Self::Error>;

    /// In a single atomic transaction:
    /// * re-checks that the payment has not been refunded (rejecting without mutation otherwise),
    /// * marks the payment refunded with the given values, and
    /// * applies the payout-side effect: a pending standard payout is reduced proportionally
    ///   (clamped to zero), a paid one spawns a negative clawback row, and no payout means no
    ///   payout-side effect.
    async fn apply_refund(&self, update: RefundUpdate) -> Result<RefundOutcome, Self::Error>;

    /// In a single atomic transaction, marks the given pending standard payouts as paid together
    /// with every pending clawback belonging to the same providers. A provider is never paid
    /// their standard amount while an outstanding clawback remains unsettled.
    async fn settle_payout_batch(&self, payout_ids: &[i64]) -> Result<SettlementBatch, Self::Error>;
}
