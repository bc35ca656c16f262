//! Error types for the native ledger

use somnia_types::{Address, Amount};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance for {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        account: Address,
        needed: Amount,
        available: Amount,
    },

    #[error("Recipient {account} does not accept native value")]
    RecipientRejected { account: Address },

    #[error("Balance overflow for {account}")]
    Overflow { account: Address },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
