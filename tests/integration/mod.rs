//! Integration tests for pgscratch.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

pub mod connection_test;
pub mod session_test;
