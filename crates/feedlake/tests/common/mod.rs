//! Shared test utilities for feedlake integration tests.
//!
//! - `TestHarness` owns a temp-dir database and wires up pipelines
//! - builders for payloads, scripted sources and faulty stores

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
