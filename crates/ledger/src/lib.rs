//! Native currency ledger
//!
//! Holds account balances and provides the value-transfer primitive the
//! voucher escrow uses to take custody of and release locked value.

pub mod errors;
pub mod ledger;

pub use errors::*;
pub use ledger::*;
