//! Utilities for testing the engine against a real Postgres server.
//!
//! - [`database`] creates an isolated database per test and drops it afterwards.

pub mod database;
