//! Integration test suite.
//!
//! 1. End-to-end annotation pipeline with XMI exchange
//! 2. Type-system schema and XMI file persistence
//! 3. System smoke tests: heap reset at scale, randomized graph round-trips

pub mod end_to_end_tests;
pub mod helpers;
pub mod persistence_tests;
pub mod system_smoke_tests;
