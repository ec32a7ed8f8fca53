//! Integration tests: full swap and settlement flows against an
//! in-memory venue.

mod mock_venue;
mod swap_flow;
