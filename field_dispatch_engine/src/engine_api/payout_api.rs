use fdg_common::MoneyCents;
use log::{debug, info, warn};

use crate::{
    db::traits::{DispatchManagement, InsertPayoutResult, PaymentManagement, SettlementManagement},
    db_types::{BookingId, BookingStatus, CommissionType, NewPayout, Provider, ProviderPayout, Service},
    engine_api::errors::DispatchGatewayError,
    events::{EventProducers, InvoiceRequestedEvent},
};

/// Computes and records the single standard payout for an eligible booking.
pub struct PayoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> PayoutApi<B>
where
    B: DispatchManagement + PaymentManagement + SettlementManagement,
    DispatchGatewayError: From<<B as DispatchManagement>::Error>
        + From<<B as PaymentManagement>::Error>
        + From<<B as SettlementManagement>::Error>,
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    /// Creates the standard payout for a completed, paid booking.
    ///
    /// Idempotent: if a standard payout already exists for the booking it is returned unchanged
    /// and no second computation happens.
    pub async fn create_payout_for_booking(&self, booking_id: &BookingId) -> Result<ProviderPayout, DispatchGatewayError> {
        let booking = DispatchManagement::fetch_booking(&self.db, booking_id)
            .await?
            .ok_or_else(|| DispatchGatewayError::NotFound(format!("Booking {booking_id} not found")))?;
        if booking.status != BookingStatus::Completed {
            return Err(DispatchGatewayError::InvalidState(format!(
                "Booking {booking_id} is {}, not Completed. No payout is due.",
                booking.status
            )));
        }
        let provider_id = booking.provider_id.ok_or_else(|| {
            DispatchGatewayError::InvalidState(format!("Booking {booking_id} has no assigned provider"))
        })?;
        if let Some(existing) = self.db.standard_payout_for_booking(booking_id).await? {
            debug!("💰 Payout #{} already exists for booking {booking_id}. Returning it unchanged.", existing.id);
            return Ok(existing);
        }
        let payment = self.db.confirmed_payment_for_booking(booking_id).await?.ok_or_else(|| {
            DispatchGatewayError::InvalidState(format!("Booking {booking_id} has no confirmed payment"))
        })?;
        let provider = DispatchManagement::fetch_provider(&self.db, provider_id)
            .await?
            .ok_or_else(|| DispatchGatewayError::NotFound(format!("Provider #{provider_id} not found")))?;
        let service = DispatchManagement::fetch_service(&self.db, booking.service_id)
            .await?
            .ok_or_else(|| DispatchGatewayError::NotFound(format!("Service #{} not found", booking.service_id)))?;

        let effective_price = booking.price_override.unwrap_or(payment.amount);
        let amount = compute_payout_amount(&provider, &service, effective_price);
        let new_payout = NewPayout::standard(provider_id, booking_id.clone(), amount);
        let payout_id = match self.db.insert_payout(new_payout).await? {
            InsertPayoutResult::Inserted(id) => {
                info!("💰 Payout #{id} of {amount} recorded for booking {booking_id} (provider #{provider_id})");
                id
            },
            InsertPayoutResult::AlreadyExists(id) => {
                debug!("💰 Concurrent payout creation for booking {booking_id}. Using existing payout #{id}.");
                id
            },
        };
        let payout = self
            .db
            .fetch_payout(payout_id)
            .await?
            .ok_or_else(|| DispatchGatewayError::NotFound(format!("Payout #{payout_id} not found")))?;

        // Invoice generation is fire-and-forget. A failure there never rolls the payout back.
        for producer in &self.producers.invoice_requested_producer {
            producer.publish_event(InvoiceRequestedEvent::new(booking.clone(), effective_price)).await;
        }
        if self.producers.invoice_requested_producer.is_empty() {
            warn!("💰 No invoice hook configured. Booking {booking_id} will not be invoiced automatically.");
        }
        Ok(payout)
    }

    /// The standard payout for a booking, if one has been created.
    pub async fn payout_for_booking(&self, booking_id: &BookingId) -> Result<Option<ProviderPayout>, DispatchGatewayError> {
        Ok(self.db.standard_payout_for_booking(booking_id).await?)
    }

    /// A read-only preview of what the provider would be paid at the given price.
    pub fn estimate(&self, provider: &Provider, service: &Service, effective_price: MoneyCents) -> MoneyCents {
        compute_payout_amount(provider, service, effective_price)
    }
}

/// The commission chain. The first matching rule wins:
/// 1. Flat-fee providers are paid their flat fee, independent of the job price.
/// 2. A service-level commission rate is the platform's cut: the provider keeps the remainder.
/// 3. Otherwise the provider's own rate is their share of the price.
///
/// The result is clamped to a minimum of zero.
pub fn compute_payout_amount(provider: &Provider, service: &Service, effective_price: MoneyCents) -> MoneyCents {
    let amount = if provider.commission_type == CommissionType::FlatPerJob {
        provider.flat_fee
    } else if service.commission_rate > 0 {
        effective_price.less_basis_points(service.commission_rate)
    } else {
        effective_price.basis_points(provider.commission_rate)
    };
    amount.max_zero()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::ProviderStatus;

    fn provider(commission_type: CommissionType, commission_rate: i64, flat_fee: i64) -> Provider {
        Provider {
            id: 1,
            name: "Alice".to_string(),
            status: ProviderStatus::Active,
            is_available: true,
            latitude: None,
            longitude: None,
            specialties: vec![],
            commission_type,
            commission_rate,
            flat_fee: MoneyCents::from(flat_fee),
        }
    }

    fn service(commission_rate: i64) -> Service {
        Service { id: 1, name: "Plumbing".to_string(), category: "plumbing".to_string(), commission_rate }
    }

    #[test]
    fn flat_fee_wins_over_everything() {
        let p = provider(CommissionType::FlatPerJob, 9000, 5000);
        let amount = compute_payout_amount(&p, &service(2000), MoneyCents::from(100_000));
        assert_eq!(amount, MoneyCents::from(5000));
    }

    #[test]
    fn service_rate_is_the_platform_cut() {
        // 15% platform cut on $100.00 leaves the provider $85.00
        let p = provider(CommissionType::Standard, 7000, 0);
        let amount = compute_payout_amount(&p, &service(1500), MoneyCents::from(10_000));
        assert_eq!(amount, MoneyCents::from(8500));
    }

    #[test]
    fn provider_rate_is_the_provider_share() {
        // 70% provider share of $100.00 pays $70.00
        let p = provider(CommissionType::Standard, 7000, 0);
        let amount = compute_payout_amount(&p, &service(0), MoneyCents::from(10_000));
        assert_eq!(amount, MoneyCents::from(7000));
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        // 3333 bps of 150 cents = 49.995 -> 50
        let p = provider(CommissionType::Standard, 3333, 0);
        let amount = compute_payout_amount(&p, &service(0), MoneyCents::from(150));
        assert_eq!(amount, MoneyCents::from(50));
    }

    #[test]
    fn result_never_goes_negative() {
        let p = provider(CommissionType::Standard, 7000, 0);
        let amount = compute_payout_amount(&p, &service(0), MoneyCents::from(-500));
        assert_eq!(amount, MoneyCents::from(0));
    }
}
