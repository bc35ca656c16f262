//! Voucher escrow
//!
//! A creator locks native value under a 32-byte identifier. Whoever presents
//! the identifier first receives the full amount; every later attempt fails.
//! The escrow's custody account on the native ledger holds exactly the sum of
//! unredeemed voucher amounts.

pub mod errors;
pub mod escrow;
pub mod types;

pub use errors::*;
pub use escrow::VoucherEscrow;
pub use types::*;
