//! Execution host for the Somnia registries
//!
//! Applies state-changing calls one at a time in submission order, stamps
//! them with block time, collects the emitted events into receipts and
//! broadcasts them to subscribers. Read queries go straight to the
//! registries.

pub mod clock;
pub mod config;
pub mod errors;
pub mod receipt;
pub mod runtime;
pub mod transaction;

pub use clock::*;
pub use config::*;
pub use errors::*;
pub use receipt::*;
pub use runtime::*;
pub use transaction::*;
