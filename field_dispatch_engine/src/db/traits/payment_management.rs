use fdg_common::MoneyCents;

use crate::{
    db::traits::InsertPaymentResult,
    db_types::{BookingId, NewPayment, Payment, PaymentMethod, PaymentStatus},
};

/// Payment row lifecycle: idempotent ingestion and guarded status transitions.
///
/// The atomic refund path lives in [`super::SettlementManagement::apply_refund`] because it must
/// mutate payment and payout rows in one transaction.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement: Clone {
    type Error: std::error::Error;

    /// Inserts a payment row. If a payment for the same booking and method already exists, the
    /// existing row id is returned and nothing is changed.
    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, Self::Error>;

    async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, Self::Error>;

    /// The most recent payment row for the booking, regardless of status.
    async fn payment_for_booking(&self, booking_id: &BookingId) -> Result<Option<Payment>, Self::Error>;

    async fn confirmed_payment_for_booking(&self, booking_id: &BookingId) -> Result<Option<Payment>, Self::Error>;

    async fn payment_by_processor_ref(&self, processor_ref: &str) -> Result<Option<Payment>, Self::Error>;

    async fn payment_by_booking_and_method(
        &self,
        booking_id: &BookingId,
        method: PaymentMethod,
    ) -> Result<Option<Payment>, Self::Error>;

    /// Marks the payment Confirmed and stores the external processor reference, if given.
    async fn confirm_payment(&self, id: i64, processor_ref: Option<&str>) -> Result<(), Self::Error>;

    async fn update_payment_status(&self, id: i64, status: PaymentStatus) -> Result<(), Self::Error>;

    /// Marks the payment refunded without touching payouts. Used by the event paths (charge
    /// refunded, dispute lost) that do not run the settlement reconciler.
    async fn mark_payment_refunded(
        &self,
        id: i64,
        amount: MoneyCents,
        refunded_by: &str,
        reason: &str,
    ) -> Result<(), Self::Error>;
}
