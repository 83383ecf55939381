//! # Field dispatch gateway server
//! This module hosts the HTTP surface of the field dispatch gateway. It is responsible for:
//! Listening for incoming webhook deliveries from the payment processor.
//! Verifying their HMAC signatures before any parsing happens.
//! Exposing the dispatch, payout and settlement operations of the engine as REST endpoints.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/dispatch/{booking_id}`: Runs provider matching for a booking.
//! * `/dispatch/{booking_id}/reassign`: Re-runs matching after a provider cancellation.
//! * `/dispatch/{booking_id}/log`: The append-only dispatch history for a booking.
//! * `/payouts/{booking_id}`: Creates or fetches the standard payout for a booking.
//! * `/settlement/refund` and `/settlement/settle`: Refund and batch-settlement operations.
//! * `/webhook/payment_event`: The signed webhook route for payment processor events.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
