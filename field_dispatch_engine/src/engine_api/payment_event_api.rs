//! Idempotent application of external payment-lifecycle events.
//!
//! The upstream processor redelivers events on any non-success response and makes no ordering
//! guarantee, so every handler re-checks current state before mutating and the reconciler always
//! acknowledges events it cannot map. A bounded id cache short-circuits duplicates within one
//! process lifetime; the state guards are what make replay safe across restarts.

use fdg_common::MoneyCents;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    db::traits::{DispatchManagement, InsertPaymentResult, PaymentManagement, SettlementManagement},
    db_types::{BookingId, NewPayment, Payment, PaymentMethod, PaymentStatus},
    engine_api::{errors::DispatchGatewayError, payout_api::PayoutApi},
    events::{AuditEvent, EventProducers},
    helpers::RecentEventCache,
};

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutCompletedData {
    pub booking_id: BookingId,
    /// The total charged, in cents. Also becomes the booking's final price.
    pub amount: i64,
    pub processor_ref: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutExpiredData {
    pub booking_id: BookingId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeRefundedData {
    pub processor_ref: Option<String>,
    pub booking_id: Option<BookingId>,
    pub method: Option<String>,
    /// Refunded amount in cents. Absent means the full payment amount.
    pub amount_refunded: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentFailedData {
    pub booking_id: BookingId,
    pub reason: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisputeData {
    pub processor_ref: Option<String>,
    pub booking_id: Option<BookingId>,
    pub dispute_id: String,
    pub reason: Option<String>,
    /// The disputed amount in cents, when the processor reports one.
    pub amount: Option<i64>,
    /// Present on dispute.updated events: "won" or "lost".
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundsEventData {
    pub processor_ref: Option<String>,
    pub booking_id: Option<BookingId>,
    pub amount: Option<i64>,
}

/// The closed set of event types the reconciler maps to effects. Everything else lands in
/// `Unhandled` and is acknowledged without mutation.
#[derive(Debug, Clone)]
pub enum PaymentEventKind {
    CheckoutCompleted(CheckoutCompletedData),
    CheckoutExpired(CheckoutExpiredData),
    ChargeRefunded(ChargeRefundedData),
    PaymentFailed(PaymentFailedData),
    DisputeOpened(DisputeData),
    DisputeUpdated(DisputeData),
    FundsWithdrawn(FundsEventData),
    FundsReinstated(FundsEventData),
    Unhandled(String),
}

impl TryFrom<&PaymentEvent> for PaymentEventKind {
    type Error = DispatchGatewayError;

    fn try_from(event: &PaymentEvent) -> Result<Self, Self::Error> {
        let data = event.data.clone();
        let malformed = |e: serde_json::Error| {
            DispatchGatewayError::ValidationError(format!("Malformed {} payload: {e}", event.event_type))
        };
        let kind = match event.event_type.as_str() {
            "checkout.completed" => Self::CheckoutCompleted(serde_json::from_value(data).map_err(malformed)?),
            "checkout.expired" => Self::CheckoutExpired(serde_json::from_value(data).map_err(malformed)?),
            "charge.refunded" => Self::ChargeRefunded(serde_json::from_value(data).map_err(malformed)?),
            "payment.failed" => Self::PaymentFailed(serde_json::from_value(data).map_err(malformed)?),
            "dispute.opened" => Self::DisputeOpened(serde_json::from_value(data).map_err(malformed)?),
            "dispute.updated" => Self::DisputeUpdated(serde_json::from_value(data).map_err(malformed)?),
            "funds.withdrawn" => Self::FundsWithdrawn(serde_json::from_value(data).map_err(malformed)?),
            "funds.reinstated" => Self::FundsReinstated(serde_json::from_value(data).map_err(malformed)?),
            other => Self::Unhandled(other.to_string()),
        };
        Ok(kind)
    }
}

/// What an event delivery did once accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The event changed state (or produced its audit record).
    Applied,
    /// The event id was seen recently and the delivery was short-circuited.
    Duplicate,
    /// The event was acknowledged but state was already as requested, or no matching record exists.
    Ignored,
}

pub struct PaymentEventApi<B> {
    db: B,
    payouts: PayoutApi<B>,
    cache: RecentEventCache,
    producers: EventProducers,
}

impl<B> PaymentEventApi<B>
where
    B: DispatchManagement + PaymentManagement + SettlementManagement + Clone,
    DispatchGatewayError: From<<B as DispatchManagement>::Error>
        + From<<B as PaymentManagement>::Error>
        + From<<B as SettlementManagement>::Error>,
{
    pub fn new(db: B, cache: RecentEventCache, producers: EventProducers) -> Self {
        let payouts = PayoutApi::new(db.clone(), producers.clone());
        Self { db, payouts, cache, producers }
    }

    /// Applies one delivered event. Callers should acknowledge the delivery for every `Ok`
    /// outcome; only genuine errors (malformed payloads, storage failures) warrant a retry.
    pub async fn handle_event(&self, event: PaymentEvent) -> Result<EventOutcome, DispatchGatewayError> {
        if self.cache.observe(&event.id) {
            debug!("📨 Duplicate delivery of event {} ({}). Short-circuiting.", event.id, event.event_type);
            return Ok(EventOutcome::Duplicate);
        }
        let kind = PaymentEventKind::try_from(&event)?;
        match kind {
            PaymentEventKind::CheckoutCompleted(data) => self.on_checkout_completed(data).await,
            PaymentEventKind::CheckoutExpired(data) => self.on_checkout_expired(data).await,
            PaymentEventKind::ChargeRefunded(data) => self.on_charge_refunded(data).await,
            PaymentEventKind::PaymentFailed(data) => self.on_payment_failed(data).await,
            PaymentEventKind::DisputeOpened(data) => self.on_dispute_opened(data).await,
            PaymentEventKind::DisputeUpdated(data) => self.on_dispute_updated(data).await,
            PaymentEventKind::FundsWithdrawn(data) => self.on_funds_withdrawn(data).await,
            PaymentEventKind::FundsReinstated(data) => self.on_funds_reinstated(data).await,
            PaymentEventKind::Unhandled(event_type) => {
                debug!("📨 Unhandled event type {event_type}. Acknowledging without mutation.");
                Ok(EventOutcome::Ignored)
            },
        }
    }

    async fn on_checkout_completed(&self, data: CheckoutCompletedData) -> Result<EventOutcome, DispatchGatewayError> {
        let booking_id = data.booking_id.clone();
        let amount = MoneyCents::from(data.amount);
        let payment = self.db.payment_for_booking(&booking_id).await?;
        let payment_id = match payment {
            Some(p) if p.status == PaymentStatus::Confirmed => {
                debug!("📨 Payment #{} for booking {booking_id} is already confirmed. Replay ignored.", p.id);
                return Ok(EventOutcome::Ignored);
            },
            Some(p) => p.id,
            None => {
                let method = parse_method(data.method.as_deref());
                let mut new_payment = NewPayment::new(booking_id.clone(), amount, method);
                if let Some(reference) = &data.processor_ref {
                    new_payment = new_payment.with_processor_ref(reference.clone());
                }
                match self.db.insert_payment(new_payment).await? {
                    InsertPaymentResult::Inserted(id) => id,
                    InsertPaymentResult::AlreadyExists(id) => id,
                }
            },
        };
        self.db.confirm_payment(payment_id, data.processor_ref.as_deref()).await?;
        self.db.set_booking_final_price(&booking_id, amount).await?;
        info!("📨 Payment #{payment_id} confirmed for booking {booking_id}. Final price set to {amount}.");
        // The payout is attempted eagerly, but eligibility is the payout calculator's call. A
        // booking that has not completed yet will get its payout when the completion flow runs.
        match self.payouts.create_payout_for_booking(&booking_id).await {
            Ok(payout) => info!("📨 Payout #{} recorded for booking {booking_id}", payout.id),
            Err(DispatchGatewayError::InvalidState(msg)) => {
                debug!("📨 No payout yet for booking {booking_id}: {msg}")
            },
            Err(e) => warn!("📨 Payout creation failed for booking {booking_id}: {e}"),
        }
        Ok(EventOutcome::Applied)
    }

    async fn on_checkout_expired(&self, data: CheckoutExpiredData) -> Result<EventOutcome, DispatchGatewayError> {
        let Some(payment) = self.db.payment_for_booking(&data.booking_id).await? else {
            warn!("📨 checkout.expired for booking {} but no payment exists", data.booking_id);
            return Ok(EventOutcome::Ignored);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(EventOutcome::Ignored);
        }
        self.db.update_payment_status(payment.id, PaymentStatus::Failed).await?;
        info!("📨 Payment #{} marked failed after checkout expiry", payment.id);
        Ok(EventOutcome::Applied)
    }

    async fn on_charge_refunded(&self, data: ChargeRefundedData) -> Result<EventOutcome, DispatchGatewayError> {
        let Some(payment) = self.locate_payment(data.processor_ref.as_deref(), data.booking_id.as_ref(), data.method.as_deref()).await?
        else {
            warn!(
                "📨 charge.refunded could not be matched to a payment (ref: {:?}, booking: {:?})",
                data.processor_ref, data.booking_id
            );
            return Ok(EventOutcome::Ignored);
        };
        if payment.is_refunded() {
            debug!("📨 Payment #{} is already refunded. Replay ignored.", payment.id);
            return Ok(EventOutcome::Ignored);
        }
        let amount = data.amount_refunded.map(MoneyCents::from).unwrap_or(payment.amount);
        let res = self
            .db
            .mark_payment_refunded(payment.id, amount, "payment_processor", "Refund reported by processor")
            .await;
        match res {
            Ok(()) => {
                info!("📨 Payment #{} marked refunded for {amount} on processor report", payment.id);
                Ok(EventOutcome::Applied)
            },
            Err(e) => match DispatchGatewayError::from(e) {
                DispatchGatewayError::InvalidState(_) => Ok(EventOutcome::Ignored),
                e => Err(e),
            },
        }
    }

    async fn on_payment_failed(&self, data: PaymentFailedData) -> Result<EventOutcome, DispatchGatewayError> {
        // The failure is always audited, whatever the payment's current state.
        let audit = AuditEvent::new("payment_failed", "payment_processor", "booking", data.booking_id.as_str())
            .with_details(serde_json::json!({ "reason": data.reason, "code": data.code }));
        self.publish_audit(audit).await;
        let Some(payment) = self.db.payment_for_booking(&data.booking_id).await? else {
            return Ok(EventOutcome::Ignored);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(EventOutcome::Ignored);
        }
        self.db.update_payment_status(payment.id, PaymentStatus::Failed).await?;
        info!("📨 Payment #{} marked failed ({:?})", payment.id, data.reason);
        Ok(EventOutcome::Applied)
    }

    async fn on_dispute_opened(&self, data: DisputeData) -> Result<EventOutcome, DispatchGatewayError> {
        let Some(payment) =
            self.locate_payment(data.processor_ref.as_deref(), data.booking_id.as_ref(), None).await?
        else {
            warn!("📨 dispute.opened could not be matched to a payment (dispute {})", data.dispute_id);
            return Ok(EventOutcome::Ignored);
        };
        self.db.update_payment_status(payment.id, PaymentStatus::Disputed).await?;
        let reason = data.reason.clone().unwrap_or_else(|| "unspecified".to_string());
        self.db.annotate_booking_dispute(&payment.booking_id, &reason, Some(&data.dispute_id)).await?;
        info!("📨 Payment #{} disputed ({}). Booking {} flagged for review.", payment.id, data.dispute_id, payment.booking_id);
        Ok(EventOutcome::Applied)
    }

    async fn on_dispute_updated(&self, data: DisputeData) -> Result<EventOutcome, DispatchGatewayError> {
        let Some(payment) =
            self.locate_payment(data.processor_ref.as_deref(), data.booking_id.as_ref(), None).await?
        else {
            warn!("📨 dispute.updated could not be matched to a payment (dispute {})", data.dispute_id);
            return Ok(EventOutcome::Ignored);
        };
        let reason = data.reason.clone().unwrap_or_else(|| "unspecified".to_string());
        match data.status.as_deref() {
            Some("won") => {
                self.db.update_payment_status(payment.id, PaymentStatus::Confirmed).await?;
                self.db
                    .annotate_booking_dispute(&payment.booking_id, &format!("Dispute won: {reason}"), Some(&data.dispute_id))
                    .await?;
                info!("📨 Dispute {} won. Payment #{} restored to confirmed.", data.dispute_id, payment.id);
                Ok(EventOutcome::Applied)
            },
            Some("lost") => {
                if payment.is_refunded() {
                    return Ok(EventOutcome::Ignored);
                }
                let amount = data.amount.map(MoneyCents::from).unwrap_or(payment.amount);
                // Unlike the manual refund path, a lost dispute does not create a provider
                // clawback. The provider's balance is reconciled out of band.
                self.db
                    .mark_payment_refunded(payment.id, amount, "payment_processor", &format!("Dispute lost: {reason}"))
                    .await?;
                info!("📨 Dispute {} lost. Payment #{} refunded for {amount}.", data.dispute_id, payment.id);
                Ok(EventOutcome::Applied)
            },
            other => {
                debug!("📨 Dispute {} update with status {other:?}. No mapped effect.", data.dispute_id);
                Ok(EventOutcome::Ignored)
            },
        }
    }

    async fn on_funds_withdrawn(&self, data: FundsEventData) -> Result<EventOutcome, DispatchGatewayError> {
        let audit = AuditEvent::new("funds_withdrawn", "payment_processor", "payment", ref_or_unknown(&data))
            .with_details(serde_json::json!({ "amount_cents": data.amount }));
        self.publish_audit(audit).await;
        Ok(EventOutcome::Applied)
    }

    async fn on_funds_reinstated(&self, data: FundsEventData) -> Result<EventOutcome, DispatchGatewayError> {
        let audit = AuditEvent::new("funds_reinstated", "payment_processor", "payment", ref_or_unknown(&data))
            .with_details(serde_json::json!({ "amount_cents": data.amount }));
        self.publish_audit(audit).await;
        let Some(payment) =
            self.locate_payment(data.processor_ref.as_deref(), data.booking_id.as_ref(), None).await?
        else {
            return Ok(EventOutcome::Ignored);
        };
        if payment.status != PaymentStatus::Disputed {
            return Ok(EventOutcome::Ignored);
        }
        self.db.update_payment_status(payment.id, PaymentStatus::Confirmed).await?;
        info!("📨 Funds reinstated. Payment #{} restored to confirmed.", payment.id);
        Ok(EventOutcome::Applied)
    }

    /// Looks the payment up by processor reference first, then by booking id (narrowed by method
    /// when the event carries one).
    async fn locate_payment(
        &self,
        processor_ref: Option<&str>,
        booking_id: Option<&BookingId>,
        method: Option<&str>,
    ) -> Result<Option<Payment>, DispatchGatewayError> {
        if let Some(reference) = processor_ref {
            if let Some(payment) = self.db.payment_by_processor_ref(reference).await? {
                return Ok(Some(payment));
            }
        }
        let Some(booking_id) = booking_id else { return Ok(None) };
        match method.and_then(|m| m.parse::<PaymentMethod>().ok()) {
            Some(method) => Ok(self.db.payment_by_booking_and_method(booking_id, method).await?),
            None => Ok(self.db.payment_for_booking(booking_id).await?),
        }
    }

    async fn publish_audit(&self, event: AuditEvent) {
        for producer in &self.producers.audit_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

fn parse_method(method: Option<&str>) -> PaymentMethod {
    method.and_then(|m| m.parse().ok()).unwrap_or(PaymentMethod::Card)
}

fn ref_or_unknown(data: &FundsEventData) -> String {
    data.processor_ref
        .clone()
        .or_else(|| data.booking_id.as_ref().map(|b| b.as_str().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn envelope_parses_known_types() {
        let raw = serde_json::json!({
            "id": "evt_001",
            "type": "checkout.completed",
            "data": { "booking_id": "bk-100", "amount": 12_500, "processor_ref": "ch_abc" }
        });
        let event: PaymentEvent = serde_json::from_value(raw).unwrap();
        let kind = PaymentEventKind::try_from(&event).unwrap();
        match kind {
            PaymentEventKind::CheckoutCompleted(data) => {
                assert_eq!(data.booking_id, BookingId::from("bk-100"));
                assert_eq!(data.amount, 12_500);
                assert_eq!(data.processor_ref.as_deref(), Some("ch_abc"));
            },
            other => panic!("Unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn unknown_types_fall_through_to_unhandled() {
        let raw = serde_json::json!({ "id": "evt_002", "type": "invoice.created", "data": {} });
        let event: PaymentEvent = serde_json::from_value(raw).unwrap();
        let kind = PaymentEventKind::try_from(&event).unwrap();
        assert!(matches!(kind, PaymentEventKind::Unhandled(t) if t == "invoice.created"));
    }

    #[test]
    fn malformed_known_payload_is_a_validation_error() {
        let raw = serde_json::json!({ "id": "evt_003", "type": "checkout.completed", "data": { "amount": "lots" } });
        let event: PaymentEvent = serde_json::from_value(raw).unwrap();
        let err = PaymentEventKind::try_from(&event).unwrap_err();
        assert!(matches!(err, DispatchGatewayError::ValidationError(_)));
    }
}
