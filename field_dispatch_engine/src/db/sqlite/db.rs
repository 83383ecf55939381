use std::fmt::Debug;

use fdg_common::MoneyCents;
use log::{debug, trace};
use sqlx::SqlitePool;

use crate::{
    db::{
        sqlite::{bookings, dispatch_log, new_pool, payments, payouts, providers, SqliteDatabaseError},
        traits::{
            DispatchManagement,
            InsertPaymentResult,
            InsertPayoutResult,
            PaymentManagement,
            PayoutAdjustment,
            RefundOutcome,
            RefundUpdate,
            SettlementBatch,
            SettlementManagement,
        },
    },
    db_types::{
        Booking,
        BookingId,
        DispatchLogEntry,
        NewDispatchLogEntry,
        NewPayment,
        NewPayout,
        Payment,
        PaymentMethod,
        PaymentStatus,
        PayoutStatus,
        Provider,
        ProviderPayout,
        Service,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl DispatchManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bookings::fetch_booking(booking_id, &mut conn).await
    }

    async fn fetch_service(&self, service_id: i64) -> Result<Option<Service>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bookings::fetch_service(service_id, &mut conn).await
    }

    async fn fetch_provider(&self, provider_id: i64) -> Result<Option<Provider>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        providers::fetch_provider(provider_id, &mut conn).await
    }

    async fn available_providers(&self, exclude: &[i64]) -> Result<Vec<Provider>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        providers::available_providers(exclude, &mut conn).await
    }

    async fn assign_provider(&self, booking_id: &BookingId, provider_id: i64) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bookings::assign_provider(booking_id, provider_id, &mut conn).await
    }

    async fn revert_assignment(&self, booking_id: &BookingId) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bookings::revert_assignment(booking_id, &mut conn).await
    }

    async fn set_booking_final_price(&self, booking_id: &BookingId, price: MoneyCents) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bookings::set_final_price(booking_id, price, &mut conn).await
    }

    async fn annotate_booking_dispute(
        &self,
        booking_id: &BookingId,
        reason: &str,
        external_dispute_id: Option<&str>,
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bookings::annotate_dispute(booking_id, reason, external_dispute_id, &mut conn).await
    }

    async fn insert_dispatch_log(&self, entry: NewDispatchLogEntry) -> Result<i64, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        dispatch_log::append(entry, &mut conn).await
    }

    async fn dispatch_history(&self, booking_id: &BookingId) -> Result<Vec<DispatchLogEntry>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        dispatch_log::history_for_booking(booking_id, &mut conn).await
    }
}

impl PaymentManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::idempotent_insert(payment, &mut conn).await
    }

    async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(id, &mut conn).await
    }

    async fn payment_for_booking(&self, booking_id: &BookingId) -> Result<Option<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_for_booking(booking_id, &mut conn).await
    }

    async fn confirmed_payment_for_booking(&self, booking_id: &BookingId) -> Result<Option<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_confirmed_for_booking(booking_id, &mut conn).await
    }

    async fn payment_by_processor_ref(&self, processor_ref: &str) -> Result<Option<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_by_processor_ref(processor_ref, &mut conn).await
    }

    async fn payment_by_booking_and_method(
        &self,
        booking_id: &BookingId,
        method: PaymentMethod,
    ) -> Result<Option<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_by_booking_and_method(booking_id, method, &mut conn).await
    }

    async fn confirm_payment(&self, id: i64, processor_ref: Option<&str>) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::confirm(id, processor_ref, &mut conn).await
    }

    async fn update_payment_status(&self, id: i64, status: PaymentStatus) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::update_status(id, status, &mut conn).await
    }

    async fn mark_payment_refunded(
        &self,
        id: i64,
        amount: MoneyCents,
        refunded_by: &str,
        reason: &str,
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let applied = payments::mark_refunded(id, amount, refunded_by, reason, &mut conn).await?;
        if !applied {
            return Err(SqliteDatabaseError::PaymentAlreadyRefunded(id));
        }
        Ok(())
    }
}

impl SettlementManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn standard_payout_for_booking(&self, booking_id: &BookingId) -> Result<Option<ProviderPayout>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payouts::standard_for_booking(booking_id, &mut conn).await
    }

    async fn insert_payout(&self, payout: NewPayout) -> Result<InsertPayoutResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payouts::idempotent_insert(payout, &mut conn).await
    }

    async fn fetch_payout(&self, id: i64) -> Result<Option<ProviderPayout>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payouts::fetch_payout(id, &mut conn).await
    }

    async fn pending_clawbacks_for_provider(&self, provider_id: i64) -> Result<Vec<ProviderPayout>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payouts::pending_clawbacks_for_provider(provider_id, &mut conn).await
    }

    /// The refund transaction. The payment's refunded state is re-checked inside the transaction
    /// so that a concurrent refund of the same payment cannot double-apply: the second caller
    /// sees the refund marker and rolls back without mutating anything.
    async fn apply_refund(&self, update: RefundUpdate) -> Result<RefundOutcome, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_payment(update.payment_id, &mut tx)
            .await?
            .ok_or(SqliteDatabaseError::PaymentNotFound(update.payment_id))?;
        if payment.is_refunded() {
            return Err(SqliteDatabaseError::PaymentAlreadyRefunded(payment.id));
        }
        let applied = payments::mark_refunded(
            payment.id,
            update.refund_amount,
            &update.refunded_by,
            &update.reason,
            &mut tx,
        )
        .await?;
        if !applied {
            return Err(SqliteDatabaseError::PaymentAlreadyRefunded(payment.id));
        }

        let adjustment = match payouts::standard_for_booking(&payment.booking_id, &mut tx).await? {
            Some(payout) if payout.status == PayoutStatus::Pending => {
                let reduction = payout.amount.prorated_by(update.refund_amount, payment.amount);
                let new_amount = (payout.amount - reduction).max_zero();
                let note = format!(
                    "Reduced from {} to {new_amount} after refund of {} on payment #{}: {}",
                    payout.amount, update.refund_amount, payment.id, update.reason
                );
                payouts::adjust_pending_amount(payout.id, new_amount, &note, &mut tx).await?;
                debug!("🗃️ Pending payout #{} reduced from {} to {new_amount}", payout.id, payout.amount);
                PayoutAdjustment::AdjustedPending {
                    payout_id: payout.id,
                    previous_amount: payout.amount,
                    new_amount,
                }
            },
            Some(payout) => {
                // Already disbursed. The provider owes the proportional share back.
                let owed = payout.amount.prorated_by(update.refund_amount, payment.amount);
                let note = format!(
                    "Clawback of {owed} against payout #{} after refund of {} on payment #{}: {}",
                    payout.id, update.refund_amount, payment.id, update.reason
                );
                let clawback = NewPayout::clawback(&payout, -owed, note);
                let id = match payouts::idempotent_insert(clawback, &mut tx).await? {
                    InsertPayoutResult::Inserted(id) => id,
                    InsertPayoutResult::AlreadyExists(id) => id,
                };
                let row = payouts::fetch_payout(id, &mut tx).await?.ok_or(SqliteDatabaseError::PayoutNotFound(id))?;
                debug!("🗃️ Clawback payout #{id} of {owed} created against paid payout #{}", payout.id);
                PayoutAdjustment::ClawbackCreated(row)
            },
            None => PayoutAdjustment::NoPayout,
        };

        let payment = payments::fetch_payment(payment.id, &mut tx)
            .await?
            .ok_or(SqliteDatabaseError::PaymentNotFound(update.payment_id))?;
        tx.commit().await?;
        Ok(RefundOutcome { payment, adjustment })
    }

    /// The batch settlement transaction. Standard payouts and the clawbacks of the same providers
    /// transition to Paid together or not at all.
    async fn settle_payout_batch(&self, payout_ids: &[i64]) -> Result<SettlementBatch, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let standard = payouts::pending_standard_by_ids(payout_ids, &mut tx).await?;
        let standard_ids = standard.iter().map(|p| p.id).collect::<Vec<_>>();
        let mut provider_ids = standard.iter().map(|p| p.provider_id).collect::<Vec<_>>();
        provider_ids.sort_unstable();
        provider_ids.dedup();
        let clawbacks = payouts::pending_clawbacks_for_providers(&provider_ids, &mut tx).await?;
        let clawback_ids = clawbacks.iter().map(|p| p.id).collect::<Vec<_>>();
        payouts::mark_paid(&standard_ids, &mut tx).await?;
        payouts::mark_paid(&clawback_ids, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Settled {} standard payouts and {} clawbacks for {} providers",
            standard_ids.len(),
            clawback_ids.len(),
            provider_ids.len()
        );
        Ok(SettlementBatch { payouts_settled: standard_ids, clawbacks_settled: clawback_ids })
    }
}
