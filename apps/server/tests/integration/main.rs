//! HTTP-level tests for the service operations app.
//!
//! The database is a SeaORM mock connection, so no PostgreSQL is needed.
//!
//! Run with: cargo test --test integration

mod helpers;

mod access_tests;
mod api_tests;
mod db_tests;
mod pages_tests;
