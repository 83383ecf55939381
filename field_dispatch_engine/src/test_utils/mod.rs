//! Helpers for standing up throwaway databases and seed data.
//!
//! These are used by the integration tests, but are also handy for local tooling, so they ship
//! unconditionally.

mod prepare_env;
mod seed_data;

pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations};
pub use seed_data::{seed_booking, seed_payment, seed_provider, seed_service, SeedBooking};
