//! A thin client for the external card processor.
//!
//! The dispatch gateway only needs one capability from the processor: issuing refunds against a
//! previously stored charge reference. Everything else (charging, checkout sessions) is driven by
//! the processor's own hosted flow and arrives back at the gateway as signed webhook events.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::ProcessorApi;
pub use config::ProcessorConfig;
pub use data_objects::{RefundCall, RefundReceipt};
pub use error::ProcessorApiError;
