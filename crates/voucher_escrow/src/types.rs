//! Types for the voucher escrow

use serde::{Deserialize, Serialize};
use somnia_types::{Address, Amount, VoucherId};

/// Stored voucher entry. Kept after redemption so status queries still work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherRecord {
    pub creator: Address,
    pub amount: Amount,
    pub redeemed: bool,
}

/// Non-failing composite view for client display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherStatus {
    pub exists: bool,
    pub redeemed: bool,
    pub creator: Address,
    pub amount: Amount,
}

impl VoucherStatus {
    pub fn absent() -> Self {
        Self {
            exists: false,
            redeemed: false,
            creator: Address::ZERO,
            amount: Amount::ZERO,
        }
    }
}

impl From<&VoucherRecord> for VoucherStatus {
    fn from(record: &VoucherRecord) -> Self {
        Self {
            exists: true,
            redeemed: record.redeemed,
            creator: record.creator,
            amount: record.amount,
        }
    }
}

/// One persisted voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherEntry {
    pub voucher_id: VoucherId,
    #[serde(flatten)]
    pub record: VoucherRecord,
}

/// Serialisable escrow state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSnapshot {
    pub custody: Address,
    pub vouchers: Vec<VoucherEntry>,
}
