//! Core business logic - the reservation engine.
//!
//! Framework-agnostic raffle, ticket and customer operations. Every function takes the
//! database handle explicitly; nothing here holds global state.

/// Reservation expiry sweep
pub mod expiry;
/// Raffle creation and lifecycle
pub mod raffle;
/// Dashboard and ticket detail reports
pub mod report;
/// Reservation, payment and release of tickets
pub mod ticket;
/// Customer records
pub mod user;
