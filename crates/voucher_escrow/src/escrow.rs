//! Voucher escrow implementation
//!
//! Value moves through a [`NativeLedger`] supplied per call. The escrow's
//! custody account is only ever debited by a successful redemption.

use crate::errors::*;
use crate::types::*;
use parking_lot::RwLock;
use somnia_ledger::NativeLedger;
use somnia_types::{Address, Amount, CallContext, RegistryEvent, VoucherId};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Voucher escrow
#[derive(Debug)]
pub struct VoucherEscrow {
    /// Ledger account holding locked value
    custody: Address,
    vouchers: RwLock<BTreeMap<VoucherId, VoucherRecord>>,
}

impl VoucherEscrow {
    /// Create an empty escrow holding value in `custody`
    pub fn new(custody: Address) -> Self {
        Self {
            custody,
            vouchers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Rebuild an escrow from persisted state
    pub fn from_snapshot(snapshot: EscrowSnapshot) -> Self {
        let vouchers = snapshot
            .vouchers
            .into_iter()
            .map(|entry| (entry.voucher_id, entry.record))
            .collect();
        Self {
            custody: snapshot.custody,
            vouchers: RwLock::new(vouchers),
        }
    }

    /// Custody account address
    pub fn custody(&self) -> Address {
        self.custody
    }

    /// Lock `ctx.value` under `voucher_id`.
    ///
    /// The record is reserved before value moves and withdrawn again if the
    /// caller cannot fund it, so a failed create leaves no trace. The voucher
    /// lock is not held while the ledger runs.
    pub fn create<L>(
        &self,
        ctx: &CallContext,
        voucher_id: VoucherId,
        ledger: &mut L,
    ) -> Result<RegistryEvent>
    where
        L: NativeLedger + ?Sized,
    {
        if ctx.value.is_zero() {
            return Err(VoucherError::InsufficientFunds);
        }
        if ctx.caller == self.custody {
            return Err(VoucherError::CustodyCaller);
        }

        {
            let mut vouchers = self.vouchers.write();
            if vouchers.contains_key(&voucher_id) {
                return Err(VoucherError::VoucherAlreadyExists { voucher_id });
            }
            vouchers.insert(
                voucher_id,
                VoucherRecord {
                    creator: ctx.caller,
                    amount: ctx.value,
                    redeemed: false,
                },
            );
        }

        if let Err(err) = ledger.transfer(&ctx.caller, &self.custody, ctx.value) {
            self.vouchers.write().remove(&voucher_id);
            return Err(err.into());
        }

        info!(%voucher_id, amount = %ctx.value, creator = %ctx.caller, "voucher created");
        Ok(RegistryEvent::VoucherCreated {
            voucher_id,
            amount: ctx.value,
            creator: ctx.caller,
        })
    }

    /// Pay the voucher's amount to the caller. Any caller may redeem.
    ///
    /// The record is marked redeemed and the lock released before the payout
    /// is attempted, so a ledger that calls back into the escrow sees the
    /// voucher as spent. If the payout fails the mark is cleared again and
    /// the call fails, leaving the voucher redeemable.
    pub fn redeem<L>(
        &self,
        ctx: &CallContext,
        voucher_id: VoucherId,
        ledger: &mut L,
    ) -> Result<RegistryEvent>
    where
        L: NativeLedger + ?Sized,
    {
        if ctx.caller == self.custody {
            return Err(VoucherError::CustodyCaller);
        }

        let amount = {
            let mut vouchers = self.vouchers.write();
            let record = vouchers
                .get_mut(&voucher_id)
                .ok_or(VoucherError::VoucherNotFound { voucher_id })?;
            if record.redeemed {
                return Err(VoucherError::VoucherAlreadyRedeemed { voucher_id });
            }
            record.redeemed = true;
            record.amount
        };

        if let Err(err) = ledger.transfer(&self.custody, &ctx.caller, amount) {
            if let Some(record) = self.vouchers.write().get_mut(&voucher_id) {
                record.redeemed = false;
            }
            warn!(%voucher_id, redeemer = %ctx.caller, error = %err, "voucher payout failed");
            return Err(err.into());
        }

        info!(%voucher_id, %amount, redeemer = %ctx.caller, "voucher redeemed");
        Ok(RegistryEvent::VoucherRedeemed {
            voucher_id,
            amount,
            redeemer: ctx.caller,
        })
    }

    /// Locked amount of a voucher; zero when it does not exist.
    ///
    /// Redeemed vouchers keep reporting their original amount.
    pub fn amount(&self, voucher_id: &VoucherId) -> Amount {
        self.vouchers
            .read()
            .get(voucher_id)
            .map(|record| record.amount)
            .unwrap_or_default()
    }

    /// Composite status; absence is reported through `exists`.
    pub fn status(&self, voucher_id: &VoucherId) -> VoucherStatus {
        self.vouchers
            .read()
            .get(voucher_id)
            .map(VoucherStatus::from)
            .unwrap_or_else(VoucherStatus::absent)
    }

    /// Sum of all unredeemed amounts. Equals the custody balance.
    pub fn total_locked(&self) -> Amount {
        self.vouchers
            .read()
            .values()
            .filter(|record| !record.redeemed)
            .map(|record| record.amount)
            .sum()
    }

    /// Number of vouchers ever created
    pub fn voucher_count(&self) -> usize {
        self.vouchers.read().len()
    }

    /// Copy of the current state for persistence
    pub fn snapshot(&self) -> EscrowSnapshot {
        EscrowSnapshot {
            custody: self.custody,
            vouchers: self
                .vouchers
                .read()
                .iter()
                .map(|(voucher_id, record)| VoucherEntry {
                    voucher_id: *voucher_id,
                    record: record.clone(),
                })
                .collect(),
        }
    }
}
