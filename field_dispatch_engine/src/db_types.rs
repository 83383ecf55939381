use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fdg_common::MoneyCents;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------      BookingId       --------------------------------------------------------
/// The booking identifier as assigned by the booking-lifecycle service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct BookingId(pub String);

impl FromStr for BookingId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for BookingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BookingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl BookingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    BookingStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum BookingStatus {
    /// The booking has been created but not yet confirmed by the customer.
    Pending,
    /// The booking is confirmed and waiting for a provider to be assigned.
    Confirmed,
    /// A provider has been assigned and offered the job.
    Dispatched,
    /// The provider is on site and working.
    InProgress,
    /// The job has been completed by the provider.
    Completed,
    /// The booking was cancelled by the customer or an admin.
    Cancelled,
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "Pending"),
            BookingStatus::Confirmed => write!(f, "Confirmed"),
            BookingStatus::Dispatched => write!(f, "Dispatched"),
            BookingStatus::InProgress => write!(f, "InProgress"),
            BookingStatus::Completed => write!(f, "Completed"),
            BookingStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Dispatched" => Ok(Self::Dispatched),
            "InProgress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError("booking status", s.to_string())),
        }
    }
}

impl From<String> for BookingStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid booking status: {value}. But this conversion cannot fail. Defaulting to Pending");
            BookingStatus::Pending
        })
    }
}

//--------------------------------------       Booking        --------------------------------------------------------
/// A single requested service instance. Bookings are owned by the booking-lifecycle service; the
/// engine only mutates the assignment (provider_id + status), the final price, and the dispute
/// annotations.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub status: BookingStatus,
    pub service_id: i64,
    pub provider_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: String,
    /// Non-null marks a business (B2B) booking, which receives specialty-priority matching.
    pub tenant_id: Option<String>,
    pub price_override: Option<MoneyCents>,
    pub estimated_price: MoneyCents,
    pub final_price: Option<MoneyCents>,
    pub dispute_reason: Option<String>,
    pub external_dispute_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn is_business(&self) -> bool {
        self.tenant_id.is_some()
    }
}

//--------------------------------------       Service        --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    /// The specialty tag that providers must carry for a specialty match.
    pub category: String,
    /// The platform's cut in basis points. Zero means the provider's own commission rate applies.
    pub commission_rate: i64,
}

//--------------------------------------   ProviderStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ProviderStatus {
    Active,
    Inactive,
    Pending,
}

impl Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStatus::Active => write!(f, "Active"),
            ProviderStatus::Inactive => write!(f, "Inactive"),
            ProviderStatus::Pending => write!(f, "Pending"),
        }
    }
}

impl From<String> for ProviderStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Active" => Self::Active,
            "Inactive" => Self::Inactive,
            "Pending" => Self::Pending,
            _ => {
                error!("Invalid provider status: {value}. Defaulting to Inactive");
                Self::Inactive
            },
        }
    }
}

//--------------------------------------   CommissionType     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CommissionType {
    /// The provider is paid a share of the job price.
    Standard,
    /// The provider is paid a fixed fee per completed job, independent of price.
    FlatPerJob,
}

impl Display for CommissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommissionType::Standard => write!(f, "Standard"),
            CommissionType::FlatPerJob => write!(f, "FlatPerJob"),
        }
    }
}

//--------------------------------------       Provider       --------------------------------------------------------
/// A field worker eligible to be matched to bookings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub status: ProviderStatus,
    pub is_available: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Service category tags this provider is qualified for.
    pub specialties: Vec<String>,
    pub commission_type: CommissionType,
    /// The provider's share in basis points. Only consulted when neither a flat fee nor a service
    /// rate applies.
    pub commission_rate: i64,
    pub flat_fee: MoneyCents,
}

impl Provider {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn has_specialty(&self, category: &str) -> bool {
        self.specialties.iter().any(|s| s == category)
    }
}

//--------------------------------------    PaymentStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
    Refunded,
    Disputed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Confirmed => write!(f, "Confirmed"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
            PaymentStatus::Disputed => write!(f, "Disputed"),
        }
    }
}

//--------------------------------------    PaymentMethod     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    Cash,
    BankTransfer,
}

impl PaymentMethod {
    /// Whether refunds for this method route through the external card processor.
    pub fn is_card_routed(&self) -> bool {
        matches!(self, PaymentMethod::Card)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::BankTransfer => write!(f, "BankTransfer"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Card" | "card" => Ok(Self::Card),
            "Cash" | "cash" => Ok(Self::Cash),
            "BankTransfer" | "bank_transfer" => Ok(Self::BankTransfer),
            s => Err(ConversionError("payment method", s.to_string())),
        }
    }
}

//--------------------------------------       Payment        --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub booking_id: BookingId,
    pub amount: MoneyCents,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Charge reference assigned by the external card processor, if any.
    pub processor_ref: Option<String>,
    /// Set exactly once. Its presence marks the payment as already refunded.
    pub refund_amount: Option<MoneyCents>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refunded_by: Option<String>,
    pub refund_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_refunded(&self) -> bool {
        self.refund_amount.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub booking_id: BookingId,
    pub amount: MoneyCents,
    pub method: PaymentMethod,
    pub processor_ref: Option<String>,
}

impl NewPayment {
    pub fn new(booking_id: BookingId, amount: MoneyCents, method: PaymentMethod) -> Self {
        Self { booking_id, amount, method, processor_ref: None }
    }

    pub fn with_processor_ref(mut self, processor_ref: String) -> Self {
        self.processor_ref = Some(processor_ref);
        self
    }
}

//--------------------------------------    PayoutStatus      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Paid,
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::Pending => write!(f, "Pending"),
            PayoutStatus::Paid => write!(f, "Paid"),
        }
    }
}

//--------------------------------------     PayoutType       --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PayoutType {
    /// The amount owed to a provider for one completed, paid booking. At most one per booking.
    Standard,
    /// A negative-amount record representing money to be recovered from a provider after a refund
    /// on a booking whose payout was already disbursed.
    Clawback,
}

impl Display for PayoutType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutType::Standard => write!(f, "Standard"),
            PayoutType::Clawback => write!(f, "Clawback"),
        }
    }
}

//--------------------------------------    ProviderPayout    --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ProviderPayout {
    pub id: i64,
    pub provider_id: i64,
    pub booking_id: BookingId,
    /// Non-negative for Standard payouts; negative for Clawbacks.
    pub amount: MoneyCents,
    pub status: PayoutStatus,
    pub payout_type: PayoutType,
    /// Links a clawback back to the standard payout it reverses.
    pub original_payout_id: Option<i64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayout {
    pub provider_id: i64,
    pub booking_id: BookingId,
    pub amount: MoneyCents,
    pub payout_type: PayoutType,
    pub original_payout_id: Option<i64>,
    pub note: Option<String>,
}

impl NewPayout {
    pub fn standard(provider_id: i64, booking_id: BookingId, amount: MoneyCents) -> Self {
        Self { provider_id, booking_id, amount, payout_type: PayoutType::Standard, original_payout_id: None, note: None }
    }

    pub fn clawback(original: &ProviderPayout, amount: MoneyCents, note: String) -> Self {
        Self {
            provider_id: original.provider_id,
            booking_id: original.booking_id.clone(),
            amount,
            payout_type: PayoutType::Clawback,
            original_payout_id: Some(original.id),
            note: Some(note),
        }
    }
}

//--------------------------------------  DispatchLogEntry    --------------------------------------------------------
/// One candidate considered during a dispatch attempt, as persisted in the dispatch log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchCandidate {
    pub provider_id: i64,
    pub distance_miles: f64,
    pub specialty_match: bool,
}

/// Append-only audit record of a dispatch attempt. Also the source of the exclusion list for
/// cascading re-dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchLogEntry {
    pub id: i64,
    pub booking_id: BookingId,
    pub assigned_provider_id: Option<i64>,
    pub algorithm: String,
    pub candidates: Vec<DispatchCandidate>,
    pub expanded_search: bool,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDispatchLogEntry {
    pub booking_id: BookingId,
    pub assigned_provider_id: Option<i64>,
    pub algorithm: String,
    pub candidates: Vec<DispatchCandidate>,
    pub expanded_search: bool,
    pub reason: String,
}
