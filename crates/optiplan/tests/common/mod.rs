//! Shared helpers for the optiplan integration tests.
//!
//! - `TestHarness`: temp export directory plus an in-memory database
//! - builders for orders and supplier spreadsheets

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
