//! Serialized execution host
//!
//! One mutex guards the ledger, nonces and height, and every state-changing
//! call runs while holding it. Calls therefore execute one at a time in the
//! order they acquire the lock, and each sees all effects of the previous one.

use crate::clock::Clock;
use crate::config::RuntimeConfig;
use crate::errors::*;
use crate::receipt::{EventRecord, Receipt};
use crate::transaction::{Call, SignedTransaction, Transaction};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use somnia_ledger::{InMemoryLedger, NativeLedger};
use somnia_name_registry::{NameBook, NameInfo, NameRegistry};
use somnia_types::{Address, Amount, CallContext, RegistryEvent, VoucherId};
use somnia_voucher_escrow::{EscrowSnapshot, VoucherEscrow, VoucherStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Complete persisted state of a runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub chain_id: u64,
    pub height: u64,
    pub names: NameBook,
    pub escrow: EscrowSnapshot,
    pub ledger: InMemoryLedger,
    #[serde(default)]
    pub nonces: BTreeMap<Address, u64>,
}

#[derive(Debug)]
struct ExecState {
    ledger: InMemoryLedger,
    nonces: BTreeMap<Address, u64>,
    height: u64,
}

pub struct Runtime {
    config: RuntimeConfig,
    names: NameRegistry,
    escrow: VoucherEscrow,
    exec: Mutex<ExecState>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<EventRecord>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("chain_id", &self.config.chain_id)
            .field("height", &self.height())
            .field("names", &self.names.name_count())
            .field("vouchers", &self.escrow.voucher_count())
            .finish()
    }
}

impl Runtime {
    /// Start a fresh chain from the configured genesis allocations.
    pub fn genesis(config: RuntimeConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let allocations = config
            .genesis
            .iter()
            .map(|alloc| (alloc.address, alloc.balance));
        let ledger = InMemoryLedger::with_allocations(allocations)?;
        info!(
            chain_id = config.chain_id,
            accounts = config.genesis.len(),
            supply = %ledger.total_supply(),
            "genesis initialised"
        );

        let escrow = VoucherEscrow::new(config.escrow_address);
        Ok(Self::assemble(
            config,
            NameRegistry::new(),
            escrow,
            ExecState {
                ledger,
                nonces: BTreeMap::new(),
                height: 0,
            },
            clock,
        ))
    }

    /// Resume from persisted state. The snapshot must belong to the
    /// configured chain and escrow.
    pub fn from_snapshot(
        config: RuntimeConfig,
        snapshot: WorldSnapshot,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        if snapshot.chain_id != config.chain_id {
            return Err(RuntimeError::ChainMismatch {
                expected: config.chain_id,
                found: snapshot.chain_id,
            });
        }
        if snapshot.escrow.custody != config.escrow_address {
            return Err(RuntimeError::Config(format!(
                "snapshot escrow custody {} differs from configured {}",
                snapshot.escrow.custody, config.escrow_address
            )));
        }
        if !snapshot.names.is_consistent() {
            return Err(RuntimeError::Config(
                "snapshot name index is inconsistent".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(entry) = snapshot
            .escrow
            .vouchers
            .iter()
            .find(|entry| !seen.insert(entry.voucher_id))
        {
            return Err(RuntimeError::Config(format!(
                "snapshot lists voucher {} more than once",
                entry.voucher_id
            )));
        }
        let locked: Amount = snapshot
            .escrow
            .vouchers
            .iter()
            .filter(|entry| !entry.record.redeemed)
            .map(|entry| entry.record.amount)
            .sum();
        let custody_balance = snapshot.ledger.balance_of(&snapshot.escrow.custody);
        if custody_balance != locked {
            return Err(RuntimeError::Config(format!(
                "snapshot custody balance {custody_balance} does not match {locked} locked in vouchers"
            )));
        }

        debug!(
            chain_id = snapshot.chain_id,
            height = snapshot.height,
            names = snapshot.names.len(),
            vouchers = snapshot.escrow.vouchers.len(),
            "restoring runtime from snapshot"
        );
        Ok(Self::assemble(
            config,
            NameRegistry::from_book(snapshot.names),
            VoucherEscrow::from_snapshot(snapshot.escrow),
            ExecState {
                ledger: snapshot.ledger,
                nonces: snapshot.nonces,
                height: snapshot.height,
            },
            clock,
        ))
    }

    fn assemble(
        config: RuntimeConfig,
        names: NameRegistry,
        escrow: VoucherEscrow,
        exec: ExecState,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            config,
            names,
            escrow,
            exec: Mutex::new(exec),
            clock,
            events,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Number of calls committed so far
    pub fn height(&self) -> u64 {
        self.exec.lock().height
    }

    /// Receive events from every call committed after this point.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    // -------------------------------------------------------------------------
    // State-changing calls
    // -------------------------------------------------------------------------

    /// Run a call on behalf of `tx.from` without signature or nonce checks.
    ///
    /// For hosts that authenticate callers themselves. A failed call changes
    /// no state.
    pub fn execute(&self, tx: &Transaction) -> Result<Receipt> {
        let mut state = self.exec.lock();
        self.apply(&mut state, tx)
    }

    /// Verify and run a signed transaction.
    ///
    /// The nonce must equal the sender's next nonce. Once the signature and
    /// nonce check out the nonce is consumed, even if the call itself fails.
    pub fn submit(&self, signed: &SignedTransaction) -> Result<Receipt> {
        let sender = signed.verify(self.config.chain_id)?;

        let mut state = self.exec.lock();
        let expected = state.nonces.get(&sender).copied().unwrap_or_default();
        if signed.tx.nonce != expected {
            return Err(RuntimeError::InvalidNonce {
                account: sender,
                expected,
                got: signed.tx.nonce,
            });
        }
        state.nonces.insert(sender, expected + 1);

        self.apply(&mut state, &signed.tx)
    }

    fn apply(&self, state: &mut ExecState, tx: &Transaction) -> Result<Receipt> {
        let method = tx.call.method();
        if !tx.value.is_zero() && !tx.call.is_payable() {
            return Err(RuntimeError::NonPayable { method });
        }

        let timestamp = self.clock.now_secs();
        let ctx = CallContext::new(tx.from, timestamp).with_value(tx.value);
        let outcome: Result<RegistryEvent> = match &tx.call {
            Call::RegisterName { name } => self.names.register(&ctx, name).map_err(Into::into),
            Call::TransferName { name, new_owner } => self
                .names
                .transfer(&ctx, name, *new_owner)
                .map_err(Into::into),
            Call::CreateVoucher { voucher_id } => self
                .escrow
                .create(&ctx, *voucher_id, &mut state.ledger)
                .map_err(Into::into),
            Call::RedeemVoucher { voucher_id } => self
                .escrow
                .redeem(&ctx, *voucher_id, &mut state.ledger)
                .map_err(Into::into),
        };
        let event = match outcome {
            Ok(event) => event,
            Err(err) => {
                warn!(method, caller = %tx.from, error = %err, "call reverted");
                return Err(err);
            }
        };

        state.height += 1;
        let receipt = Receipt {
            tx_hash: tx.hash(self.config.chain_id),
            height: state.height,
            timestamp,
            events: vec![event],
        };

        for event in &receipt.events {
            info!(
                height = receipt.height,
                tx = %receipt.tx_hash,
                event = event.name(),
                "event emitted"
            );
            // No subscribers is not an error.
            let _ = self.events.send(EventRecord {
                height: receipt.height,
                tx_hash: receipt.tx_hash.clone(),
                event: event.clone(),
            });
        }

        Ok(receipt)
    }

    /// Flag whether an account accepts incoming value. Devnet knob for
    /// modelling recipients that reject transfers.
    pub fn set_accepts_value(&self, account: Address, accepts: bool) {
        self.exec.lock().ledger.set_accepts_value(account, accepts);
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn resolve_name(&self, name: &str) -> Result<Address> {
        Ok(self.names.resolve(name)?)
    }

    pub fn get_name_info(&self, name: &str) -> NameInfo {
        self.names.name_info(name)
    }

    pub fn get_owner_names(&self, owner: &Address) -> Vec<String> {
        self.names.owner_names(owner)
    }

    pub fn get_voucher_amount(&self, voucher_id: &VoucherId) -> Amount {
        self.escrow.amount(voucher_id)
    }

    pub fn get_voucher_status(&self, voucher_id: &VoucherId) -> VoucherStatus {
        self.escrow.status(voucher_id)
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.exec.lock().ledger.balance_of(account)
    }

    /// Next nonce `account` must use
    pub fn nonce_of(&self, account: &Address) -> u64 {
        self.exec
            .lock()
            .nonces
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// Native balance held by the escrow's custody account
    pub fn escrow_balance(&self) -> Amount {
        self.balance_of(&self.escrow.custody())
    }

    pub fn total_supply(&self) -> Amount {
        self.exec.lock().ledger.total_supply()
    }

    /// Consistent copy of all state.
    pub fn snapshot(&self) -> WorldSnapshot {
        // Holding the exec lock keeps calls out while the registries are read.
        let state = self.exec.lock();
        WorldSnapshot {
            chain_id: self.config.chain_id,
            height: state.height,
            names: self.names.snapshot(),
            escrow: self.escrow.snapshot(),
            ledger: state.ledger.clone(),
            nonces: state.nonces.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::GenesisAllocation;
    use crate::transaction::address_of;
    use ed25519_dalek::SigningKey;

    const START: u64 = 1_700_000_000;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    fn runtime_with(funded: &[Address]) -> (Runtime, Arc<ManualClock>) {
        let config = RuntimeConfig {
            genesis: funded
                .iter()
                .map(|address| GenesisAllocation {
                    address: *address,
                    balance: Amount::from_tokens(10),
                })
                .collect(),
            ..RuntimeConfig::default()
        };
        let clock = Arc::new(ManualClock::new(START));
        let runtime = Runtime::genesis(config, clock.clone()).unwrap();
        (runtime, clock)
    }

    fn register(from: Address, name: &str) -> Transaction {
        Transaction::new(from, Call::RegisterName { name: name.into() })
    }

    #[test]
    fn test_execute_stamps_clock_and_height() {
        let (runtime, clock) = runtime_with(&[]);

        let first = runtime.execute(&register(addr(1), "alice.somnia")).unwrap();
        clock.advance(12);
        let second = runtime.execute(&register(addr(1), "bob-1.somnia")).unwrap();

        assert_eq!((first.height, first.timestamp), (1, START));
        assert_eq!((second.height, second.timestamp), (2, START + 12));
        assert_eq!(runtime.get_name_info("bob-1.somnia").registered_at, START + 12);
        assert_eq!(runtime.height(), 2);
    }

    #[test]
    fn test_failed_call_does_not_advance_height() {
        let (runtime, _) = runtime_with(&[]);
        runtime.execute(&register(addr(1), "alice.somnia")).unwrap();

        let err = runtime
            .execute(&register(addr(2), "alice.somnia"))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Name(_)));
        assert_eq!(runtime.height(), 1);
    }

    #[test]
    fn test_value_on_non_payable_call_rejected() {
        let (runtime, _) = runtime_with(&[addr(1)]);
        let tx = register(addr(1), "alice.somnia").with_value(Amount::from_tokens(1));

        let err = runtime.execute(&tx).unwrap_err();
        assert!(matches!(err, RuntimeError::NonPayable { method: "registerName" }));
        assert!(!runtime.get_name_info("alice.somnia").exists);
        assert_eq!(runtime.balance_of(&addr(1)), Amount::from_tokens(10));
    }

    #[test]
    fn test_submit_consumes_nonce_on_reverted_call() {
        let (runtime, _) = runtime_with(&[]);
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let sender = address_of(&key);
        let chain = runtime.chain_id();

        let bad = register(sender, "invalid").sign(&key, chain);
        assert!(runtime.submit(&bad).is_err());
        assert_eq!(runtime.nonce_of(&sender), 1);

        let replay = register(sender, "alice.somnia").sign(&key, chain);
        assert!(matches!(
            runtime.submit(&replay).unwrap_err(),
            RuntimeError::InvalidNonce { expected: 1, got: 0, .. }
        ));

        let good = register(sender, "alice.somnia")
            .with_nonce(1)
            .sign(&key, chain);
        runtime.submit(&good).unwrap();
        assert_eq!(runtime.resolve_name("alice.somnia").unwrap(), sender);
        assert_eq!(runtime.nonce_of(&sender), 2);
    }

    #[test]
    fn test_bad_signature_leaves_nonce_untouched() {
        let (runtime, _) = runtime_with(&[]);
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let sender = address_of(&key);

        let mut signed = register(sender, "alice.somnia").sign(&key, runtime.chain_id());
        signed.signature[0] ^= 0xff;
        assert!(matches!(
            runtime.submit(&signed).unwrap_err(),
            RuntimeError::InvalidSignature
        ));
        assert_eq!(runtime.nonce_of(&sender), 0);
        assert_eq!(runtime.height(), 0);
    }

    #[test]
    fn test_events_follow_commits() {
        let (runtime, _) = runtime_with(&[addr(1)]);
        let mut events = runtime.subscribe();
        let id = VoucherId::derive(b"evt");

        runtime.execute(&register(addr(1), "events.somnia")).unwrap();
        let tx = Transaction::new(addr(1), Call::CreateVoucher { voucher_id: id })
            .with_value(Amount::from_tokens(1));
        let receipt = runtime.execute(&tx).unwrap();

        tokio_test::block_on(async {
            let first = events.recv().await.unwrap();
            assert_eq!(first.height, 1);
            let second = events.recv().await.unwrap();
            assert_eq!(second.tx_hash, receipt.tx_hash);
            assert_eq!(second.event, receipt.events[0]);
        });
    }

    #[test]
    fn test_snapshot_rejects_other_chain() {
        let (runtime, _) = runtime_with(&[addr(1)]);
        let snapshot = runtime.snapshot();

        let other = RuntimeConfig {
            chain_id: 1337,
            ..RuntimeConfig::default()
        };
        let err = Runtime::from_snapshot(other, snapshot, Arc::new(ManualClock::new(0)))
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::ChainMismatch {
                expected: 1337,
                found: 50312
            }
        ));
    }
    fn runtime_with_voucher(id: VoucherId) -> Runtime {
        let (runtime, _) = runtime_with(&[addr(1)]);
        let tx = Transaction::new(addr(1), Call::CreateVoucher { voucher_id: id })
            .with_value(Amount::from_tokens(2));
        runtime.execute(&tx).unwrap();
        runtime
    }

    #[test]
    fn test_snapshot_rejects_unbacked_custody() {
        let runtime = runtime_with_voucher(VoucherId::derive(b"backed"));
        let mut snapshot = runtime.snapshot();
        let custody = snapshot.escrow.custody;
        snapshot
            .ledger
            .debit(&custody, Amount::from_tokens(1))
            .unwrap();

        let err = Runtime::from_snapshot(
            RuntimeConfig::default(),
            snapshot,
            Arc::new(ManualClock::new(0)),
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_snapshot_rejects_repeated_voucher() {
        let runtime = runtime_with_voucher(VoucherId::derive(b"twice"));
        let mut snapshot = runtime.snapshot();
        let mut copy = snapshot.escrow.vouchers[0].clone();
        copy.record.redeemed = true;
        snapshot.escrow.vouchers.push(copy);

        let err = Runtime::from_snapshot(
            RuntimeConfig::default(),
            snapshot,
            Arc::new(ManualClock::new(0)),
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_snapshot_with_locked_voucher_restores() {
        let id = VoucherId::derive(b"kept");
        let runtime = runtime_with_voucher(id);
        let restored = Runtime::from_snapshot(
            RuntimeConfig::default(),
            runtime.snapshot(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        assert_eq!(restored.get_voucher_amount(&id), Amount::from_tokens(2));
        assert_eq!(restored.escrow_balance(), Amount::from_tokens(2));
    }
}
