//! Ledger store operations.
//!
//! Typed read/write surface over the database tables. All mutating
//! functions journal their writes through [`events`]; engines never touch
//! SQL directly.

pub mod addresses;
pub mod assets;
pub mod balances;
pub mod bets;
pub mod broadcasts;
pub mod dispensers;
pub mod events;
