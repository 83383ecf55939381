use fdg_common::MoneyCents;

use crate::db_types::{Booking, BookingId, DispatchLogEntry, NewDispatchLogEntry, Provider, Service};

/// Booking, provider and dispatch-log access required by the matching engine.
///
/// Bookings and providers are owned by external collaborators; the engine reads them and only
/// writes the assignment fields, the final price, and dispute annotations. Dispatch log rows are
/// append-only.
#[allow(async_fn_in_trait)]
pub trait DispatchManagement: Clone {
    type Error: std::error::Error;

    async fn fetch_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>, Self::Error>;

    async fn fetch_service(&self, service_id: i64) -> Result<Option<Service>, Self::Error>;

    async fn fetch_provider(&self, provider_id: i64) -> Result<Option<Provider>, Self::Error>;

    /// All providers with Active status and `is_available` set, excluding the given ids.
    /// Returned in ascending id order so that downstream stable sorts have a deterministic input.
    async fn available_providers(&self, exclude: &[i64]) -> Result<Vec<Provider>, Self::Error>;

    /// Sets the booking's provider and moves it to Dispatched status.
    async fn assign_provider(&self, booking_id: &BookingId, provider_id: i64) -> Result<(), Self::Error>;

    /// Clears the booking's provider and reverts it to Confirmed status, ahead of a re-dispatch.
    async fn revert_assignment(&self, booking_id: &BookingId) -> Result<(), Self::Error>;

    async fn set_booking_final_price(&self, booking_id: &BookingId, price: MoneyCents) -> Result<(), Self::Error>;

    async fn annotate_booking_dispute(
        &self,
        booking_id: &BookingId,
        reason: &str,
        external_dispute_id: Option<&str>,
    ) -> Result<(), Self::Error>;

    /// Appends one dispatch log row. Rows are never mutated afterwards.
    async fn insert_dispatch_log(&self, entry: NewDispatchLogEntry) -> Result<i64, Self::Error>;

    /// All dispatch attempts for the booking, oldest first.
    async fn dispatch_history(&self, booking_id: &BookingId) -> Result<Vec<DispatchLogEntry>, Self::Error>;
}
