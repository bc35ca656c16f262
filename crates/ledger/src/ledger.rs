//! Account ledger interface and in-memory implementation
//!
//! Every mutation either fully applies or returns an error without touching
//! any balance, so callers can rely on a failed transfer leaving the ledger
//! exactly as it was.

use crate::errors::*;
use serde::{Deserialize, Serialize};
use somnia_types::{Address, Amount};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Interface for native value movements.
pub trait NativeLedger: Send + Sync {
    /// Current balance of an account (zero if unknown).
    fn balance_of(&self, account: &Address) -> Amount;

    /// Mint value into an account (genesis allocations, faucets).
    fn credit(&mut self, account: &Address, amount: Amount) -> Result<()>;

    /// Burn value from an account.
    fn debit(&mut self, account: &Address, amount: Amount) -> Result<()>;

    /// Move value between two accounts atomically.
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()>;

    /// Sum of all balances.
    fn total_supply(&self) -> Amount;
}

// -----------------------------------------------------------------------------
// In-memory implementation (devnet runtime and tests)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryLedger {
    balances: BTreeMap<Address, Amount>,
    /// Accounts that refuse incoming transfers, like contracts without a
    /// payable receive hook.
    #[serde(default)]
    refusing: BTreeSet<Address>,
    total_supply: Amount,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from genesis allocations.
    pub fn with_allocations<I>(allocations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Address, Amount)>,
    {
        let mut ledger = Self::new();
        for (account, amount) in allocations {
            ledger.credit(&account, amount)?;
        }
        Ok(ledger)
    }

    /// Mark whether an account accepts incoming transfers.
    pub fn set_accepts_value(&mut self, account: Address, accepts: bool) {
        if accepts {
            self.refusing.remove(&account);
        } else {
            self.refusing.insert(account);
        }
    }

    pub fn accepts_value(&self, account: &Address) -> bool {
        !self.refusing.contains(account)
    }

    /// Snapshot of every non-zero balance.
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    fn set_balance(&mut self, account: &Address, amount: Amount) {
        if amount.is_zero() {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, amount);
        }
    }
}

impl NativeLedger for InMemoryLedger {
    fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn credit(&mut self, account: &Address, amount: Amount) -> Result<()> {
        let new_balance = self
            .balance_of(account)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account: *account })?;
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account: *account })?;
        self.set_balance(account, new_balance);
        self.total_supply = new_supply;
        trace!(%account, %amount, "ledger credit");
        Ok(())
    }

    fn debit(&mut self, account: &Address, amount: Amount) -> Result<()> {
        let available = self.balance_of(account);
        let new_balance =
            available
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientBalance {
                    account: *account,
                    needed: amount,
                    available,
                })?;
        self.set_balance(account, new_balance);
        self.total_supply = self.total_supply.checked_sub(amount).unwrap_or_default();
        trace!(%account, %amount, "ledger debit");
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        if !self.accepts_value(to) {
            return Err(LedgerError::RecipientRejected { account: *to });
        }

        let available = self.balance_of(from);
        let from_after =
            available
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientBalance {
                    account: *from,
                    needed: amount,
                    available,
                })?;

        if from == to {
            return Ok(());
        }

        let to_after = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account: *to })?;

        self.set_balance(from, from_after);
        self.set_balance(to, to_after);
        trace!(%from, %to, %amount, "ledger transfer");
        Ok(())
    }

    fn total_supply(&self) -> Amount {
        self.total_supply
    }
}
