use log::{debug, info, trace, warn};

use crate::{
    db::traits::DispatchManagement,
    db_types::{Booking, BookingId, BookingStatus, DispatchCandidate, DispatchLogEntry, NewDispatchLogEntry, Provider},
    engine_api::{
        dispatch_objects::{DispatchConfig, DispatchOutcome},
        errors::DispatchGatewayError,
        payout_api::compute_payout_amount,
    },
    events::{BookingStatusChangedEvent, EventProducers, ProviderAssignedEvent},
    helpers::{distance_miles, round_to_tenth},
};

pub const DISPATCH_ALGORITHM: &str = "geo_radius_v1";

/// Matches confirmed bookings to the best available provider.
pub struct DispatchApi<B> {
    db: B,
    config: DispatchConfig,
    producers: EventProducers,
}

impl<B> DispatchApi<B>
where
    B: DispatchManagement,
    DispatchGatewayError: From<B::Error>,
{
    pub fn new(db: B, config: DispatchConfig, producers: EventProducers) -> Self {
        Self { db, config, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Runs the matching algorithm for the booking and commits the best candidate, if any.
    ///
    /// Providers in `exclude` are never considered; callers pass the ids of providers who have
    /// already rejected this booking. "No eligible provider" is reported as an unsuccessful
    /// [`DispatchOutcome`], not an error, and leaves the booking unassigned for manual handling.
    pub async fn dispatch(&self, booking_id: &BookingId, exclude: &[i64]) -> Result<DispatchOutcome, DispatchGatewayError> {
        let booking = self
            .db
            .fetch_booking(booking_id)
            .await?
            .ok_or_else(|| DispatchGatewayError::NotFound(format!("Booking {booking_id} not found")))?;
        let Some(origin) = booking.coordinates() else {
            // Precondition failure rather than a matching failure, so no log entry is written.
            debug!("🚚 Booking {booking_id} has no resolved coordinates. Nothing to dispatch.");
            return Ok(DispatchOutcome::unassigned(false, "no coordinates"));
        };
        let service = self
            .db
            .fetch_service(booking.service_id)
            .await?
            .ok_or_else(|| DispatchGatewayError::NotFound(format!("Service #{} not found", booking.service_id)))?;
        let providers = self.db.available_providers(exclude).await?;
        trace!("🚚 {} available providers for booking {booking_id} ({} excluded)", providers.len(), exclude.len());
        let all_candidates = build_candidates(&providers, origin, &service.category);

        let mut expanded_search = false;
        let mut candidates = within_radius(&all_candidates, self.config.default_radius_miles);
        if candidates.is_empty() {
            expanded_search = true;
            candidates = within_radius(&all_candidates, self.config.expanded_radius_miles);
        }
        if candidates.is_empty() {
            let reason = format!(
                "No providers within {} miles ({} available, {} excluded)",
                self.config.expanded_radius_miles,
                providers.len(),
                exclude.len()
            );
            info!("🚚 Booking {booking_id} could not be dispatched: {reason}");
            let entry = NewDispatchLogEntry {
                booking_id: booking_id.clone(),
                assigned_provider_id: None,
                algorithm: DISPATCH_ALGORITHM.to_string(),
                candidates: Vec::new(),
                expanded_search,
                reason: reason.clone(),
            };
            self.db.insert_dispatch_log(entry).await?;
            return Ok(DispatchOutcome::unassigned(expanded_search, reason));
        }

        rank_candidates(&mut candidates, booking.is_business());
        let winner = candidates[0].clone();
        let provider = providers
            .iter()
            .find(|p| p.id == winner.provider_id)
            .cloned()
            .ok_or_else(|| DispatchGatewayError::NotFound(format!("Provider #{} not found", winner.provider_id)))?;

        let mut reason = format!(
            "Assigned to {} ({:.1} mi, specialty: {})",
            provider.name, winner.distance_miles, winner.specialty_match
        );
        if expanded_search {
            reason.push_str(" (expanded radius)");
        }
        if booking.is_business() {
            reason.push_str(" (B2B priority)");
        }
        if !exclude.is_empty() {
            reason.push_str(&format!(" (cascade: {} excluded)", exclude.len()));
        }

        self.db.assign_provider(booking_id, provider.id).await?;
        let entry = NewDispatchLogEntry {
            booking_id: booking_id.clone(),
            assigned_provider_id: Some(provider.id),
            algorithm: DISPATCH_ALGORITHM.to_string(),
            candidates: candidates.clone(),
            expanded_search,
            reason: reason.clone(),
        };
        self.db.insert_dispatch_log(entry).await?;
        info!("🚚 {reason} for booking {booking_id}");

        self.fire_assignment_events(&booking, &provider, winner.distance_miles).await;
        Ok(DispatchOutcome::assigned(provider.id, winner.distance_miles, expanded_search, reason))
    }

    /// Reverts the current assignment and re-runs the matching algorithm, excluding every provider
    /// that has ever been offered this booking. A provider who rejected the booking is therefore
    /// never offered it again.
    pub async fn redispatch(&self, booking_id: &BookingId) -> Result<DispatchOutcome, DispatchGatewayError> {
        let history = self.db.dispatch_history(booking_id).await?;
        let mut exclude = history.iter().filter_map(|e| e.assigned_provider_id).collect::<Vec<_>>();
        exclude.sort_unstable();
        exclude.dedup();
        debug!("🚚 Re-dispatching booking {booking_id} with {} prior providers excluded", exclude.len());
        self.db.revert_assignment(booking_id).await?;
        self.dispatch(booking_id, &exclude).await
    }

    pub async fn dispatch_history(&self, booking_id: &BookingId) -> Result<Vec<DispatchLogEntry>, DispatchGatewayError> {
        Ok(self.db.dispatch_history(booking_id).await?)
    }

    /// Fire-and-forget notifications. These must never fail or delay the assignment itself.
    async fn fire_assignment_events(&self, booking: &Booking, provider: &Provider, distance_miles: f64) {
        let assigned = match self.db.fetch_booking(&booking.booking_id).await {
            Ok(Some(b)) => b,
            Ok(None) | Err(_) => {
                warn!("🚚 Could not re-read booking {} for event payload", booking.booking_id);
                let mut b = booking.clone();
                b.provider_id = Some(provider.id);
                b.status = BookingStatus::Dispatched;
                b
            },
        };
        let estimated_payout = match self.db.fetch_service(assigned.service_id).await {
            Ok(Some(service)) => {
                let effective = assigned.price_override.unwrap_or(assigned.estimated_price);
                Some(compute_payout_amount(provider, &service, effective))
            },
            Ok(None) | Err(_) => None,
        };
        for producer in &self.producers.provider_assigned_producer {
            let event = ProviderAssignedEvent::new(assigned.clone(), provider.id, distance_miles, estimated_payout);
            producer.publish_event(event).await;
        }
        for producer in &self.producers.booking_status_changed_producer {
            let event = BookingStatusChangedEvent::new(assigned.clone(), booking.status);
            producer.publish_event(event).await;
        }
    }
}

/// Distance and specialty evaluation for every provider that has coordinates.
fn build_candidates(providers: &[Provider], origin: (f64, f64), category: &str) -> Vec<DispatchCandidate> {
    providers
        .iter()
        .filter_map(|p| {
            p.coordinates().map(|coords| DispatchCandidate {
                provider_id: p.id,
                distance_miles: round_to_tenth(distance_miles(origin, coords)),
                specialty_match: p.has_specialty(category),
            })
        })
        .collect()
}

fn within_radius(candidates: &[DispatchCandidate], radius_miles: f64) -> Vec<DispatchCandidate> {
    candidates.iter().filter(|c| c.distance_miles <= radius_miles).cloned().collect()
}

/// Orders candidates best-first. Business bookings put specialty matches ahead of everything else;
/// within a tier (and for ordinary bookings overall), nearest wins. The sort is stable, so ties
/// keep their input order.
fn rank_candidates(candidates: &mut [DispatchCandidate], business: bool) {
    candidates.sort_by(|a, b| {
        let by_distance = a.distance_miles.partial_cmp(&b.distance_miles).unwrap_or(std::cmp::Ordering::Equal);
        if business {
            b.specialty_match.cmp(&a.specialty_match).then(by_distance)
        } else {
            by_distance
        }
    });
}
