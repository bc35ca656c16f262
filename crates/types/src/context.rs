use crate::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Per-call environment supplied by the host.
///
/// `caller` is the authenticated signer, `value` the native currency attached
/// to the call and `timestamp` the block time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub caller: Address,
    pub value: Amount,
    pub timestamp: u64,
}

impl CallContext {
    /// A call that carries no value.
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self {
            caller,
            value: Amount::ZERO,
            timestamp,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}
