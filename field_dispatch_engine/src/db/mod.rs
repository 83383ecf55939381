//! Database management and control.
//!
//! This module provides the interface contracts that database *backends* must implement to drive
//! the dispatch gateway, together with the SQLite implementation.
//!
//! * [`traits::DispatchManagement`] covers booking, provider and dispatch-log access for the
//!   matching engine.
//! * [`traits::PaymentManagement`] covers payment row lifecycle (ingestion and guarded status
//!   transitions).
//! * [`traits::SettlementManagement`] covers payouts, the atomic refund application and atomic
//!   batch settlement.
//!
//! You should never need to access the database directly; use the engine APIs instead. The
//! exception is the data types, defined in [`crate::db_types`], which are public.
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;
