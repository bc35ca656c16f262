pub mod address;
pub mod amount;
pub mod context;
pub mod event;
pub mod voucher_id;

pub use address::*;
pub use amount::*;
pub use context::*;
pub use event::*;
pub use voucher_id::*;
