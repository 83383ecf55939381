use fdg_common::MoneyCents;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    db::traits::{PaymentManagement, PayoutAdjustment, RefundOutcome, RefundUpdate, SettlementBatch, SettlementManagement},
    db_types::{BookingId, PaymentStatus},
    engine_api::errors::DispatchGatewayError,
    events::{AuditEvent, EventProducers},
    traits::RefundProcessor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundKind {
    Full,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub booking_id: BookingId,
    pub kind: RefundKind,
    /// Required for partial refunds, ignored for full refunds.
    pub amount: Option<MoneyCents>,
    pub reason: String,
    pub requested_by: String,
}

/// Applies refunds and clawbacks, and batch-settles payouts.
pub struct SettlementApi<B, P> {
    db: B,
    processor: P,
    producers: EventProducers,
}

impl<B, P> SettlementApi<B, P>
where
    B: PaymentManagement + SettlementManagement,
    P: RefundProcessor,
    DispatchGatewayError:
        From<<B as PaymentManagement>::Error> + From<<B as SettlementManagement>::Error>,
{
    pub fn new(db: B, processor: P, producers: EventProducers) -> Self {
        Self { db, processor, producers }
    }

    /// Refunds the confirmed payment for a booking and reconciles the provider's payout.
    ///
    /// The external processor call, when one is needed, happens before any row is mutated: a
    /// processor failure aborts the whole operation with the database untouched. The payment and
    /// payout mutations then run inside a single transaction, which re-checks the refunded state so
    /// a payment can never be refunded twice.
    pub async fn refund(&self, request: RefundRequest) -> Result<RefundOutcome, DispatchGatewayError> {
        let booking_id = &request.booking_id;
        let payment = self
            .db
            .payment_for_booking(booking_id)
            .await?
            .ok_or_else(|| DispatchGatewayError::NotFound(format!("No payment found for booking {booking_id}")))?;
        if payment.is_refunded() {
            return Err(DispatchGatewayError::InvalidState(format!(
                "Payment #{} for booking {booking_id} has already been refunded",
                payment.id
            )));
        }
        if payment.status != PaymentStatus::Confirmed {
            return Err(DispatchGatewayError::InvalidState(format!(
                "Payment #{} is {}, so there is nothing to refund",
                payment.id, payment.status
            )));
        }
        let refund_amount = match request.kind {
            RefundKind::Full => payment.amount,
            RefundKind::Partial => {
                let amount = request.amount.ok_or_else(|| {
                    DispatchGatewayError::ValidationError("A partial refund requires an amount".to_string())
                })?;
                if amount.value() <= 0 {
                    return Err(DispatchGatewayError::ValidationError(format!(
                        "Refund amount must be positive, got {amount}"
                    )));
                }
                if amount > payment.amount {
                    return Err(DispatchGatewayError::ValidationError(format!(
                        "Refund amount {amount} exceeds the payment amount {}",
                        payment.amount
                    )));
                }
                amount
            },
        };

        if payment.method.is_card_routed() {
            match &payment.processor_ref {
                Some(reference) => {
                    let refund_ref = self.processor.refund(reference, refund_amount).await?;
                    debug!("🏦 Processor accepted refund of {refund_amount} for charge {reference} (ref {refund_ref})");
                },
                None => {
                    warn!(
                        "🏦 Payment #{} is card-routed but has no processor reference. Applying a database-only \
                         refund.",
                        payment.id
                    );
                },
            }
        }

        let update = RefundUpdate {
            payment_id: payment.id,
            refund_amount,
            refunded_by: request.requested_by.clone(),
            reason: request.reason.clone(),
        };
        let outcome = self.db.apply_refund(update).await?;
        info!("🏦 Refund of {refund_amount} applied to payment #{} for booking {booking_id}", payment.id);

        self.fire_refund_audit(&request, refund_amount, &outcome).await;
        Ok(outcome)
    }

    /// Marks the given pending standard payouts as paid, together with every outstanding clawback
    /// belonging to the same providers. A provider is never paid out while they still owe a
    /// clawback balance.
    pub async fn settle_payouts(&self, payout_ids: &[i64], requested_by: &str) -> Result<SettlementBatch, DispatchGatewayError> {
        let batch = self.db.settle_payout_batch(payout_ids).await?;
        info!(
            "🏦 Settlement run by {requested_by}: {} payouts and {} clawbacks marked paid",
            batch.payouts_settled.len(),
            batch.clawbacks_settled.len()
        );
        let details = serde_json::json!({
            "payouts_settled": batch.payouts_settled,
            "clawbacks_settled": batch.clawbacks_settled,
        });
        let event = AuditEvent::new("settle_payout_batch", requested_by, "provider_payout", "batch")
            .with_details(details);
        for producer in &self.producers.audit_producer {
            producer.publish_event(event.clone()).await;
        }
        Ok(batch)
    }

    /// Best-effort audit records for the refund and, when one was created, the clawback. These run
    /// after the transaction has committed and never fail the refund.
    async fn fire_refund_audit(&self, request: &RefundRequest, refund_amount: MoneyCents, outcome: &RefundOutcome) {
        let refund_event = AuditEvent::new(
            "refund_payment",
            request.requested_by.clone(),
            "payment",
            outcome.payment.id.to_string(),
        )
        .with_details(serde_json::json!({
            "booking_id": request.booking_id.as_str(),
            "amount_cents": refund_amount.value(),
            "reason": request.reason,
        }));
        for producer in &self.producers.audit_producer {
            producer.publish_event(refund_event.clone()).await;
        }
        if let PayoutAdjustment::ClawbackCreated(clawback) = &outcome.adjustment {
            let clawback_event = AuditEvent::new(
                "create_clawback",
                request.requested_by.clone(),
                "provider_payout",
                clawback.id.to_string(),
            )
            .with_details(serde_json::json!({
                "booking_id": request.booking_id.as_str(),
                "provider_id": clawback.provider_id,
                "amount_cents": clawback.amount.value(),
                "original_payout_id": clawback.original_payout_id,
            }));
            for producer in &self.producers.audit_producer {
                producer.publish_event(clawback_event.clone()).await;
            }
        }
    }
}
