//! Name registry implementation
//!
//! The primary map and the owner reverse index live in one [`NameBook`]
//! behind a single lock, so readers never observe one updated without the
//! other.

use crate::errors::*;
use crate::types::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use somnia_types::{Address, CallContext, RegistryEvent};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Registry state: name → record, plus owner → names in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameBook {
    records: BTreeMap<String, NameRecord>,
    owner_to_names: BTreeMap<Address, Vec<String>>,
}

impl NameBook {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check that the reverse index agrees with the primary map: every name
    /// is listed exactly once, under its current owner.
    pub fn is_consistent(&self) -> bool {
        let indexed: usize = self.owner_to_names.values().map(Vec::len).sum();
        indexed == self.records.len()
            && self.owner_to_names.iter().all(|(owner, names)| {
                names
                    .iter()
                    .all(|name| self.records.get(name).map(|r| &r.owner) == Some(owner))
            })
    }

    fn insert(&mut self, name: String, record: NameRecord) {
        self.owner_to_names
            .entry(record.owner)
            .or_default()
            .push(name.clone());
        self.records.insert(name, record);
    }

    fn reassign(&mut self, name: &str, from: &Address, to: Address) {
        if let Some(record) = self.records.get_mut(name) {
            record.owner = to;
        }
        if let Some(list) = self.owner_to_names.get_mut(from) {
            list.retain(|n| n != name);
            if list.is_empty() {
                self.owner_to_names.remove(from);
            }
        }
        self.owner_to_names
            .entry(to)
            .or_default()
            .push(name.to_string());
    }
}

/// Name registry
///
/// State-changing calls take a [`CallContext`] whose `caller` is the
/// authenticated signer. Every precondition is checked before any mutation,
/// so a failed call leaves the registry untouched.
#[derive(Debug, Default)]
pub struct NameRegistry {
    book: RwLock<NameBook>,
}

impl NameRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a persisted book
    pub fn from_book(book: NameBook) -> Self {
        Self {
            book: RwLock::new(book),
        }
    }

    /// Register `name` to the caller.
    pub fn register(&self, ctx: &CallContext, name: &str) -> Result<RegistryEvent> {
        if !is_valid_name(name) {
            debug!(name, "rejected malformed name");
            return Err(NameRegistryError::InvalidName {
                name: name.to_string(),
            });
        }

        let mut book = self.book.write();
        if book.records.contains_key(name) {
            return Err(NameRegistryError::NameAlreadyExists {
                name: name.to_string(),
            });
        }

        book.insert(
            name.to_string(),
            NameRecord {
                owner: ctx.caller,
                registered_at: ctx.timestamp,
            },
        );

        info!(name, owner = %ctx.caller, "name registered");
        Ok(RegistryEvent::NameRegistered {
            name: name.to_string(),
            owner: ctx.caller,
        })
    }

    /// Resolve name → owner
    pub fn resolve(&self, name: &str) -> Result<Address> {
        self.book
            .read()
            .records
            .get(name)
            .map(|record| record.owner)
            .ok_or_else(|| NameRegistryError::NameNotFound {
                name: name.to_string(),
            })
    }

    /// Non-failing lookup; absence is reported through `exists`.
    pub fn name_info(&self, name: &str) -> NameInfo {
        self.book
            .read()
            .records
            .get(name)
            .map(NameInfo::from)
            .unwrap_or_else(NameInfo::absent)
    }

    /// Transfer ownership of `name` from the caller to `new_owner`.
    ///
    /// The name moves to the end of the new owner's list, including when the
    /// caller transfers to itself.
    pub fn transfer(
        &self,
        ctx: &CallContext,
        name: &str,
        new_owner: Address,
    ) -> Result<RegistryEvent> {
        let mut book = self.book.write();
        let current = match book.records.get(name) {
            Some(record) => record.owner,
            None => {
                return Err(NameRegistryError::NameNotFound {
                    name: name.to_string(),
                })
            }
        };
        if current != ctx.caller {
            return Err(NameRegistryError::NotOwner {
                name: name.to_string(),
                caller: ctx.caller,
            });
        }

        book.reassign(name, &current, new_owner);

        info!(name, from = %current, to = %new_owner, "name transferred");
        Ok(RegistryEvent::NameTransferred {
            name: name.to_string(),
            from: current,
            to: new_owner,
        })
    }

    /// Names currently owned by `owner`, oldest first
    pub fn owner_names(&self, owner: &Address) -> Vec<String> {
        self.book
            .read()
            .owner_to_names
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of registered names
    pub fn name_count(&self) -> usize {
        self.book.read().len()
    }

    /// Copy of the current state for persistence
    pub fn snapshot(&self) -> NameBook {
        self.book.read().clone()
    }

    /// Replace the current state wholesale
    pub fn restore(&self, book: NameBook) {
        *self.book.write() = book;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    fn ctx(caller: Address) -> CallContext {
        CallContext::new(caller, 1_700_000_000)
    }

    #[test]
    fn test_name_registration_and_resolution() {
        let registry = NameRegistry::new();
        let alice = addr(1);

        let event = registry.register(&ctx(alice), "test.somnia").unwrap();
        assert_eq!(
            event,
            RegistryEvent::NameRegistered {
                name: "test.somnia".into(),
                owner: alice,
            }
        );
        assert_eq!(registry.resolve("test.somnia").unwrap(), alice);

        let info = registry.name_info("test.somnia");
        assert!(info.exists);
        assert_eq!(info.owner, alice);
        assert_eq!(info.registered_at, 1_700_000_000);
    }

    #[test]
    fn test_duplicate_registration_rejected_for_any_caller() {
        let registry = NameRegistry::new();
        registry.register(&ctx(addr(1)), "alice.somnia").unwrap();

        for caller in [addr(1), addr(2)] {
            let err = registry.register(&ctx(caller), "alice.somnia").unwrap_err();
            assert!(matches!(err, NameRegistryError::NameAlreadyExists { .. }));
        }
        assert_eq!(registry.resolve("alice.somnia").unwrap(), addr(1));
        assert_eq!(registry.owner_names(&addr(2)), Vec::<String>::new());
    }

    #[test]
    fn test_invalid_name_rejected_without_effect() {
        let registry = NameRegistry::new();
        for name in ["invalid", "abc", "ab.somnia", "bad_name.somnia"] {
            let err = registry.register(&ctx(addr(1)), name).unwrap_err();
            assert!(matches!(err, NameRegistryError::InvalidName { .. }));
        }
        assert_eq!(registry.name_count(), 0);
        assert!(registry.owner_names(&addr(1)).is_empty());
    }

    #[test]
    fn test_long_name_registers() {
        let registry = NameRegistry::new();
        let name = format!("{}.somnia", "a".repeat(60));
        registry.register(&ctx(addr(1)), &name).unwrap();
        assert_eq!(registry.resolve(&name).unwrap(), addr(1));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let registry = NameRegistry::new();
        registry.register(&ctx(addr(1)), "alice.somnia").unwrap();
        registry.register(&ctx(addr(2)), "Alice.somnia").unwrap();

        assert_eq!(registry.resolve("alice.somnia").unwrap(), addr(1));
        assert_eq!(registry.resolve("Alice.somnia").unwrap(), addr(2));
    }

    #[test]
    fn test_name_not_found() {
        let registry = NameRegistry::new();
        let err = registry.resolve("nonexistent.somnia").unwrap_err();
        assert!(matches!(err, NameRegistryError::NameNotFound { .. }));
        assert_eq!(registry.name_info("nonexistent.somnia"), NameInfo::absent());
    }

    #[test]
    fn test_transfer_updates_owner_and_reverse_index() {
        let registry = NameRegistry::new();
        let (a, b) = (addr(1), addr(2));
        registry.register(&ctx(a), "one.somnia").unwrap();
        registry.register(&ctx(a), "two.somnia").unwrap();
        registry.register(&ctx(b), "three.somnia").unwrap();

        let event = registry.transfer(&ctx(a), "one.somnia", b).unwrap();
        assert_eq!(
            event,
            RegistryEvent::NameTransferred {
                name: "one.somnia".into(),
                from: a,
                to: b,
            }
        );

        assert_eq!(registry.resolve("one.somnia").unwrap(), b);
        assert_eq!(registry.owner_names(&a), vec!["two.somnia".to_string()]);
        assert_eq!(
            registry.owner_names(&b),
            vec!["three.somnia".to_string(), "one.somnia".to_string()]
        );
        assert!(registry.snapshot().is_consistent());
    }

    #[test]
    fn test_transfer_keeps_registration_time() {
        let registry = NameRegistry::new();
        registry.register(&ctx(addr(1)), "keep.somnia").unwrap();
        let later = CallContext::new(addr(1), 1_800_000_000);
        registry.transfer(&later, "keep.somnia", addr(2)).unwrap();
        assert_eq!(registry.name_info("keep.somnia").registered_at, 1_700_000_000);
    }

    #[test]
    fn test_transfer_by_non_owner_rejected() {
        let registry = NameRegistry::new();
        registry.register(&ctx(addr(1)), "test.somnia").unwrap();

        let err = registry
            .transfer(&ctx(addr(2)), "test.somnia", addr(2))
            .unwrap_err();
        assert!(matches!(err, NameRegistryError::NotOwner { .. }));
        assert_eq!(registry.resolve("test.somnia").unwrap(), addr(1));
        assert_eq!(registry.owner_names(&addr(1)), vec!["test.somnia".to_string()]);
    }

    #[test]
    fn test_transfer_of_missing_name_rejected() {
        let registry = NameRegistry::new();
        let err = registry
            .transfer(&ctx(addr(1)), "ghost.somnia", addr(2))
            .unwrap_err();
        assert!(matches!(err, NameRegistryError::NameNotFound { .. }));
    }

    #[test]
    fn test_transfer_to_self_moves_name_to_end() {
        let registry = NameRegistry::new();
        let a = addr(1);
        registry.register(&ctx(a), "first.somnia").unwrap();
        registry.register(&ctx(a), "second.somnia").unwrap();

        registry.transfer(&ctx(a), "first.somnia", a).unwrap();
        assert_eq!(
            registry.owner_names(&a),
            vec!["second.somnia".to_string(), "first.somnia".to_string()]
        );
        assert!(registry.snapshot().is_consistent());
    }

    #[test]
    fn test_owner_names_preserve_insertion_order() {
        let registry = NameRegistry::new();
        let owner = addr(5);
        for label in ["multi-one", "multi-two", "multi-three"] {
            registry
                .register(&ctx(owner), &format!("{label}.somnia"))
                .unwrap();
        }
        assert_eq!(
            registry.owner_names(&owner),
            vec![
                "multi-one.somnia".to_string(),
                "multi-two.somnia".to_string(),
                "multi-three.somnia".to_string(),
            ]
        );
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let registry = NameRegistry::new();
        registry.register(&ctx(addr(1)), "persist.somnia").unwrap();
        registry
            .transfer(&ctx(addr(1)), "persist.somnia", addr(2))
            .unwrap();

        let json = serde_json::to_string(&registry.snapshot()).unwrap();
        let restored = NameRegistry::from_book(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.resolve("persist.somnia").unwrap(), addr(2));
        assert_eq!(restored.owner_names(&addr(2)), vec!["persist.somnia".to_string()]);
        assert!(restored.owner_names(&addr(1)).is_empty());
    }
}
