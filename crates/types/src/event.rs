use crate::{Address, Amount, VoucherId};
use serde::{Deserialize, Serialize};

/// Events emitted by the registries on successful state changes.
///
/// Clients subscribe to these to drive UI state; the variant names match the
/// on-chain event names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RegistryEvent {
    NameRegistered {
        name: String,
        owner: Address,
    },
    NameTransferred {
        name: String,
        from: Address,
        to: Address,
    },
    VoucherCreated {
        voucher_id: VoucherId,
        amount: Amount,
        creator: Address,
    },
    VoucherRedeemed {
        voucher_id: VoucherId,
        amount: Amount,
        redeemer: Address,
    },
}

impl RegistryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::NameRegistered { .. } => "NameRegistered",
            RegistryEvent::NameTransferred { .. } => "NameTransferred",
            RegistryEvent::VoucherCreated { .. } => "VoucherCreated",
            RegistryEvent::VoucherRedeemed { .. } => "VoucherRedeemed",
        }
    }
}
