//! Field Dispatch Engine
//!
//! The engine behind the field dispatch gateway. It matches confirmed bookings to the best
//! available provider, computes what each provider is owed once a job is completed and paid, and
//! reconciles money when a payment is later refunded or disputed, all while tolerating duplicate
//! and out-of-order delivery of external payment events.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). Sqlite is the supported backend. You should
//!    never need to access the database directly. Instead, use the public API of the engine. The
//!    exception is the data types used in the database, which are defined in the `db_types` module
//!    and are public.
//! 2. The engine public API ([`mod@engine_api`]). This provides dispatch, payout, settlement and
//!    payment-event reconciliation. Specific backends need to implement the traits in
//!    [`mod@traits`] in order to act as a backend for the dispatch server.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted
//! when certain actions occur, for example when a provider is assigned to a booking. A simple
//! actor framework is used so that you can easily hook into these events and perform custom
//! actions.
mod db;

pub mod db_types;
mod engine_api;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod test_utils;
pub mod traits;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{db_url, SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    DispatchManagement,
    InsertPaymentResult,
    InsertPayoutResult,
    PaymentManagement,
    PayoutAdjustment,
    RefundOutcome,
    RefundUpdate,
    SettlementBatch,
    SettlementManagement,
};
pub use engine_api::{
    dispatch_objects,
    DispatchApi,
    DispatchConfig,
    DispatchGatewayError,
    DispatchOutcome,
    EventOutcome,
    PaymentEvent,
    PaymentEventApi,
    PaymentEventKind,
    PayoutApi,
    RefundKind,
    RefundRequest,
    SettlementApi,
};
