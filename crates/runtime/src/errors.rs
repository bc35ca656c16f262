//! Error types for the runtime host

use somnia_ledger::LedgerError;
use somnia_name_registry::NameRegistryError;
use somnia_types::Address;
use somnia_voucher_escrow::VoucherError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Name(#[from] NameRegistryError),

    #[error(transparent)]
    Voucher(#[from] VoucherError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{method} does not accept value")]
    NonPayable { method: &'static str },

    #[error("Invalid transaction signature")]
    InvalidSignature,

    #[error("Signer {derived} does not match sender {declared}")]
    SenderMismatch { declared: Address, derived: Address },

    #[error("Invalid nonce for {account}: expected {expected}, got {got}")]
    InvalidNonce {
        account: Address,
        expected: u64,
        got: u64,
    },

    #[error("Chain id mismatch: expected {expected}, found {found}")]
    ChainMismatch { expected: u64, found: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
