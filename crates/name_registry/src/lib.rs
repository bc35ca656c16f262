//! Name registry for human-readable `.somnia` names
//!
//! Maps names such as `alice.somnia` to the address that registered them.
//! Names are never released; ownership only moves through transfers by the
//! current owner. A per-owner reverse index is kept in lock-step with the
//! primary map.

pub mod errors;
pub mod registry;
pub mod types;

pub use errors::*;
pub use registry::{NameBook, NameRegistry};
pub use types::*;
