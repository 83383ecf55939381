use fdg_common::MoneyCents;
use serde::{Deserialize, Serialize};

use crate::db_types::{Booking, BookingStatus};

/// Fired after a provider has been committed to a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAssignedEvent {
    pub booking: Booking,
    pub provider_id: i64,
    pub distance_miles: f64,
    /// The provider's share of the booking price at assignment time, if it could be estimated.
    pub estimated_payout: Option<MoneyCents>,
}

impl ProviderAssignedEvent {
    pub fn new(booking: Booking, provider_id: i64, distance_miles: f64, estimated_payout: Option<MoneyCents>) -> Self {
        Self { booking, provider_id, distance_miles, estimated_payout }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingStatusChangedEvent {
    pub booking: Booking,
    pub old_status: BookingStatus,
    pub new_status: BookingStatus,
}

impl BookingStatusChangedEvent {
    pub fn new(booking: Booking, old_status: BookingStatus) -> Self {
        let new_status = booking.status;
        Self { booking, old_status, new_status }
    }
}

/// Fired when a completed booking has a confirmed payment and the payout has been recorded, so
/// billing can raise an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequestedEvent {
    pub booking: Booking,
    pub amount: MoneyCents,
}

impl InvoiceRequestedEvent {
    pub fn new(booking: Booking, amount: MoneyCents) -> Self {
        Self { booking, amount }
    }
}

/// A structured audit trail record. Settlement actions emit one of these per state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub user_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new<S1, S2, S3, S4>(action: S1, user_id: S2, resource_type: S3, resource_id: S4) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self {
            action: action.into(),
            user_id: user_id.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
