//! SWAPDESK: custodial cross-venue token swap service.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod api;
pub mod config;
pub mod engine;
pub mod storage;
pub mod types;
pub mod venue;
