//! The public APIs of the dispatch and settlement engine.
//!
//! Each API struct is generic over a storage backend implementing the relevant
//! [`crate::db::traits`] traits, so the business rules live here and the SQL lives in the backend.

pub mod dispatch_api;
pub mod dispatch_objects;
pub mod errors;
pub mod payment_event_api;
pub mod payout_api;
pub mod settlement_api;

pub use dispatch_api::DispatchApi;
pub use dispatch_objects::{DispatchConfig, DispatchOutcome};
pub use errors::DispatchGatewayError;
pub use payment_event_api::{EventOutcome, PaymentEvent, PaymentEventApi, PaymentEventKind};
pub use payout_api::PayoutApi;
pub use settlement_api::{RefundKind, RefundRequest, SettlementApi};
