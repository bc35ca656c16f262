//! Error types for the voucher escrow

use somnia_ledger::LedgerError;
use somnia_types::VoucherId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoucherError {
    #[error("Voucher already exists: {voucher_id}")]
    VoucherAlreadyExists { voucher_id: VoucherId },

    #[error("Insufficient funds: a voucher must lock a positive amount")]
    InsufficientFunds,

    #[error("Voucher not found: {voucher_id}")]
    VoucherNotFound { voucher_id: VoucherId },

    #[error("Voucher already redeemed: {voucher_id}")]
    VoucherAlreadyRedeemed { voucher_id: VoucherId },

    #[error("The escrow custody account cannot call the escrow")]
    CustodyCaller,

    #[error("Value transfer failed: {0}")]
    TransferFailed(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, VoucherError>;
