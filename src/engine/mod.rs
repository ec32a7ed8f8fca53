//! Core engine: price → sell → reprice → buy, wrapped in deposit and payout.

pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod precision;
pub mod settlement;
pub mod snapshot;
