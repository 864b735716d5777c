//! Integration test binary -- all integration tests consolidated into a single
//! binary.

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod helpers;

mod command_store_persistence;
mod listening_cycle;
mod reminder_scheduler;
mod resolver_scenarios;
